//! Azure Blob Storage adapter
//!
//! Talks to the Blob service REST API with a container-scoped SAS token.
//! Small images go up in one Put Blob request. Larger ones are staged as
//! blocks and committed with Put Block List, reporting progress after each
//! block.

use crate::http;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use gallery_core::{BlobName, BlobStore, SasToken, TransportError};
use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// Blob service API version sent with every request
pub const API_VERSION: &str = "2023-11-03";

/// Default block size for staged uploads (4 MiB)
pub const DEFAULT_BLOCK_SIZE: usize = 4 * 1024 * 1024;

/// `Encoded="true"` marks a percent-encoded name holding characters XML cannot carry
static NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<Name(?:\s+Encoded="(true|false)")?\s*>([^<]*)</Name>"#).expect("valid regex")
});
static NEXT_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<NextMarker>([^<]*)</NextMarker>").expect("valid regex"));

/// Storage account and container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureBlobConfig {
    /// Storage account name
    pub account: String,
    /// Container holding the images
    pub container: String,
    /// Service endpoint override; only scheme, host and port are used
    #[serde(default)]
    pub endpoint: Option<Url>,
    /// Largest upload sent as a single request; also the staged block size
    #[serde(default = "default_block_size")]
    pub block_size: usize,
}

fn default_block_size() -> usize {
    DEFAULT_BLOCK_SIZE
}

impl AzureBlobConfig {
    /// Create config for an account and container
    #[inline]
    #[must_use]
    pub fn new(account: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            container: container.into(),
            endpoint: None,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }

    /// With endpoint override
    #[inline]
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// With block size
    #[inline]
    #[must_use]
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    /// Service endpoint, `https://{account}.blob.core.windows.net` by default
    ///
    /// # Errors
    /// - `TransportError::Malformed` if the account name does not form a URL
    pub fn endpoint(&self) -> Result<Url, TransportError> {
        match &self.endpoint {
            Some(endpoint) => Ok(endpoint.clone()),
            None => Url::parse(&format!("https://{}.blob.core.windows.net", self.account))
                .map_err(|error| TransportError::Malformed(format!("account {}: {error}", self.account))),
        }
    }
}

/// [`BlobStore`] backed by one Azure container
#[derive(Debug, Clone)]
pub struct AzureBlobStore {
    client: reqwest::Client,
    endpoint: Url,
    container: String,
    block_size: usize,
}

impl AzureBlobStore {
    /// Create store with its own HTTP client
    ///
    /// # Errors
    /// - `TransportError::Malformed` if the endpoint is invalid
    /// - `TransportError::Request` if the client cannot be built
    pub fn new(config: &AzureBlobConfig) -> Result<Self, TransportError> {
        Self::with_client(config, http::client()?)
    }

    /// Create store sharing an HTTP client
    ///
    /// # Errors
    /// - `TransportError::Malformed` if the endpoint is invalid
    pub fn with_client(config: &AzureBlobConfig, client: reqwest::Client) -> Result<Self, TransportError> {
        Ok(Self {
            client,
            endpoint: config.endpoint()?,
            container: config.container.clone(),
            block_size: config.block_size.max(1),
        })
    }

    /// Container name
    #[inline]
    #[must_use]
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Blob URL carrying the SAS token and extra query pairs
    fn signed_blob_url(
        &self,
        name: &BlobName,
        credential: &SasToken,
        extra: &[(&str, &str)],
    ) -> Result<Url, TransportError> {
        let url = self.url_for(name)?;
        Ok(sign(url, credential, extra))
    }

    /// Container URL carrying the SAS token and extra query pairs
    fn signed_container_url(&self, credential: &SasToken, extra: &[(&str, &str)]) -> Result<Url, TransportError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| TransportError::Malformed(format!("endpoint {} cannot hold a path", self.endpoint)))?
            .clear()
            .push(&self.container);
        Ok(sign(url, credential, extra))
    }

    async fn put_blob(
        &self,
        credential: &SasToken,
        name: &BlobName,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), TransportError> {
        let url = self.signed_blob_url(name, credential, &[])?;
        let response = self
            .client
            .put(url)
            .header("x-ms-version", API_VERSION)
            .header("x-ms-blob-type", "BlockBlob")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|error| http::send_error(&error))?;
        http::check(response).await?;
        Ok(())
    }

    async fn put_blocks(
        &self,
        credential: &SasToken,
        name: &BlobName,
        bytes: &[u8],
        content_type: &str,
        on_progress: &(dyn Fn(u64) + Send + Sync),
    ) -> Result<(), TransportError> {
        let mut block_ids = Vec::with_capacity(bytes.len().div_ceil(self.block_size));
        let mut sent = 0u64;

        for (index, chunk) in bytes.chunks(self.block_size).enumerate() {
            let block_id = block_id(index);
            let url = self.signed_blob_url(name, credential, &[("comp", "block"), ("blockid", block_id.as_str())])?;
            let response = self
                .client
                .put(url)
                .header("x-ms-version", API_VERSION)
                .body(chunk.to_vec())
                .send()
                .await
                .map_err(|error| http::send_error(&error))?;
            http::check(response).await?;

            sent += chunk.len() as u64;
            on_progress(sent);
            tracing::trace!(blob = %name, block = index, sent, "block staged");
            block_ids.push(block_id);
        }

        let url = self.signed_blob_url(name, credential, &[("comp", "blocklist")])?;
        let response = self
            .client
            .put(url)
            .header("x-ms-version", API_VERSION)
            .header("x-ms-blob-content-type", content_type)
            .header(reqwest::header::CONTENT_TYPE, "application/xml")
            .body(block_list_xml(&block_ids))
            .send()
            .await
            .map_err(|error| http::send_error(&error))?;
        http::check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn upload(
        &self,
        credential: &SasToken,
        name: &BlobName,
        bytes: &[u8],
        content_type: &str,
        on_progress: &(dyn Fn(u64) + Send + Sync),
    ) -> Result<Url, TransportError> {
        if bytes.len() <= self.block_size {
            self.put_blob(credential, name, bytes, content_type).await?;
            on_progress(bytes.len() as u64);
        } else {
            self.put_blocks(credential, name, bytes, content_type, on_progress)
                .await?;
        }
        tracing::debug!(blob = %name, size = bytes.len(), "blob uploaded");
        self.url_for(name)
    }

    async fn delete(&self, credential: &SasToken, name: &BlobName) -> Result<(), TransportError> {
        let url = self.signed_blob_url(name, credential, &[])?;
        let response = self
            .client
            .delete(url)
            .header("x-ms-version", API_VERSION)
            .send()
            .await
            .map_err(|error| http::send_error(&error))?;
        http::check(response).await?;
        Ok(())
    }

    async fn list(&self, credential: &SasToken, prefix: &str) -> Result<Vec<BlobName>, TransportError> {
        let mut names = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut query = vec![("restype", "container"), ("comp", "list"), ("prefix", prefix)];
            if let Some(marker) = marker.as_deref() {
                query.push(("marker", marker));
            }
            let url = self.signed_container_url(credential, &query)?;
            let response = self
                .client
                .get(url)
                .header("x-ms-version", API_VERSION)
                .send()
                .await
                .map_err(|error| http::send_error(&error))?;
            let body = http::text(response).await?;

            let page = parse_listing(&body);
            for name in page.names {
                names.push(BlobName::new(name).map_err(|error| TransportError::Malformed(error.to_string()))?);
            }
            match page.next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        tracing::debug!(prefix, count = names.len(), "blobs listed");
        Ok(names)
    }

    fn url_for(&self, name: &BlobName) -> Result<Url, TransportError> {
        name.url_in(&self.endpoint, &self.container)
            .map_err(|error| TransportError::Malformed(error.to_string()))
    }
}

/// Append the SAS token and extra pairs to a URL's query
fn sign(mut url: Url, credential: &SasToken, extra: &[(&str, &str)]) -> Url {
    if credential.is_empty() {
        url.set_query(None);
    } else {
        url.set_query(Some(credential.as_query()));
    }
    if !extra.is_empty() {
        url.query_pairs_mut().extend_pairs(extra);
    }
    url
}

/// Block id for the `index`th block; all ids of one blob have equal length
fn block_id(index: usize) -> String {
    STANDARD.encode(format!("block-{index:06}"))
}

fn block_list_xml(block_ids: &[String]) -> String {
    let mut xml = String::from(r#"<?xml version="1.0" encoding="utf-8"?><BlockList>"#);
    for id in block_ids {
        xml.push_str("<Latest>");
        xml.push_str(id);
        xml.push_str("</Latest>");
    }
    xml.push_str("</BlockList>");
    xml
}

/// One page of a List Blobs response
#[derive(Debug, Default, PartialEq, Eq)]
struct ListingPage {
    names: Vec<String>,
    next_marker: Option<String>,
}

fn parse_listing(body: &str) -> ListingPage {
    let names = NAME
        .captures_iter(body)
        .map(|caps| {
            let name = unescape_xml(&caps[2]);
            if caps.get(1).is_some_and(|encoded| encoded.as_str() == "true") {
                percent_decode_str(&name).decode_utf8_lossy().into_owned()
            } else {
                name
            }
        })
        .collect();
    let next_marker = NEXT_MARKER
        .captures(body)
        .map(|caps| unescape_xml(&caps[1]))
        .filter(|marker| !marker.is_empty());
    ListingPage { names, next_marker }
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn store() -> AzureBlobStore {
        AzureBlobStore::new(&AzureBlobConfig::new("acct", "images")).unwrap()
    }

    #[test]
    fn test_default_endpoint_from_account() {
        let config = AzureBlobConfig::new("acct", "images");
        assert_eq!(
            config.endpoint().unwrap().as_str(),
            "https://acct.blob.core.windows.net/"
        );
    }

    #[test]
    fn test_endpoint_override() {
        let config = AzureBlobConfig::new("acct", "images")
            .with_endpoint(Url::parse("http://127.0.0.1:10000/ignored").unwrap());
        let store = AzureBlobStore::new(&config).unwrap();
        let name = BlobName::new("p-1/1_a.jpg").unwrap();
        assert_eq!(
            store.url_for(&name).unwrap().as_str(),
            "http://127.0.0.1:10000/images/p-1/1_a.jpg"
        );
    }

    #[test]
    fn test_signed_url_appends_token_and_pairs() {
        let name = BlobName::new("p-1/1_a b.jpg").unwrap();
        let url = store()
            .signed_blob_url(&name, &SasToken::new("?sv=2022&sig=abc%3D"), &[("comp", "block")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://acct.blob.core.windows.net/images/p-1/1_a%20b.jpg?sv=2022&sig=abc%3D&comp=block"
        );
    }

    #[test]
    fn test_unsigned_url_has_no_query() {
        let name = BlobName::new("p-1/1_a.jpg").unwrap();
        let url = store().signed_blob_url(&name, &SasToken::default(), &[]).unwrap();
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_container_url_for_listing() {
        let url = store()
            .signed_container_url(
                &SasToken::new("sig=x"),
                &[("restype", "container"), ("comp", "list"), ("prefix", "p-1/")],
            )
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://acct.blob.core.windows.net/images?sig=x&restype=container&comp=list&prefix=p-1%2F"
        );
    }

    #[test]
    fn test_block_ids_share_length() {
        let first = block_id(0);
        let later = block_id(123_456);
        assert_eq!(first.len(), later.len());
        assert_eq!(STANDARD.decode(&first).unwrap(), b"block-000000");
    }

    #[test]
    fn test_block_list_body() {
        let xml = block_list_xml(&["YQ==".to_string(), "Yg==".to_string()]);
        assert_eq!(
            xml,
            r#"<?xml version="1.0" encoding="utf-8"?><BlockList><Latest>YQ==</Latest><Latest>Yg==</Latest></BlockList>"#
        );
    }

    #[test]
    fn test_parse_listing_with_marker() {
        let body = r#"<?xml version="1.0" encoding="utf-8"?>
<EnumerationResults ServiceEndpoint="https://acct.blob.core.windows.net/" ContainerName="images">
  <Prefix>p-1/</Prefix>
  <Blobs>
    <Blob><Name>p-1/1_kitchen.jpg</Name><Properties><Content-Length>10</Content-Length></Properties></Blob>
    <Blob><Name>p-1/2_R&amp;D.jpg</Name><Properties /></Blob>
  </Blobs>
  <NextMarker>2!72!MDAwMDA=</NextMarker>
</EnumerationResults>"#;

        let page = parse_listing(body);
        assert_eq!(
            page.names,
            vec!["p-1/1_kitchen.jpg".to_string(), "p-1/2_R&D.jpg".to_string()]
        );
        assert_eq!(page.next_marker.as_deref(), Some("2!72!MDAwMDA="));
    }

    #[test]
    fn test_parse_listing_decodes_encoded_names() {
        let body = r#"<EnumerationResults><Blobs>
    <Blob><Name Encoded="true">p-1%2F3_bad%EF%BF%BEname.jpg</Name><Properties /></Blob>
    <Blob><Name Encoded="false">p-1/4_plain%20kept.jpg</Name><Properties /></Blob>
</Blobs><NextMarker /></EnumerationResults>"#;

        let page = parse_listing(body);
        assert_eq!(
            page.names,
            vec![
                "p-1/3_bad\u{fffe}name.jpg".to_string(),
                "p-1/4_plain%20kept.jpg".to_string(),
            ]
        );
        assert_eq!(page.next_marker, None);
    }

    #[test]
    fn test_parse_last_page() {
        let body = "<EnumerationResults><Blobs /><NextMarker /></EnumerationResults>";
        assert_eq!(parse_listing(body), ListingPage::default());

        let body = "<EnumerationResults><Blobs /><NextMarker></NextMarker></EnumerationResults>";
        assert_eq!(parse_listing(body), ListingPage::default());
    }

    #[test]
    fn test_unescape_does_not_double_decode() {
        assert_eq!(unescape_xml("a&amp;lt;b"), "a&lt;b");
    }

    #[tokio::test]
    async fn test_unreachable_service_is_request_error() {
        let config = AzureBlobConfig::new("acct", "images")
            .with_endpoint(Url::parse("http://127.0.0.1:9").unwrap());
        let store = AzureBlobStore::new(&config).unwrap();

        let err = store.list(&SasToken::new("sig=x"), "p-1/").await.unwrap_err();

        assert!(matches!(err, TransportError::Request(_)));
    }

    proptest! {
        #[test]
        fn prop_block_ids_have_fixed_length(index in 0usize..1_000_000) {
            prop_assert_eq!(block_id(index).len(), block_id(0).len());
        }

        #[test]
        fn prop_unescape_leaves_plain_names(name in "[A-Za-z0-9 ./_-]{0,40}") {
            prop_assert_eq!(unescape_xml(&name), name);
        }
    }

    #[test]
    fn test_block_size_is_at_least_one() {
        assert_eq!(AzureBlobConfig::new("a", "c").with_block_size(0).block_size, 1);
    }
}
