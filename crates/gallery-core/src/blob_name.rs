//! Blob names and their URLs
//!
//! Provides [`BlobName`], the link between a slot's URL and the blob behind
//! it. New uploads derive `{owner}/{timestamp}_{filename}`; delete and
//! replace recover the name from the URL path, so no separate index is kept.

use crate::error::GalleryError;
use crate::types::OwnerId;
use percent_encoding::percent_decode_str;
use std::fmt::{self, Display, Formatter};
use url::Url;

/// Name of a blob inside its container
///
/// # Examples
/// - `p-42/1718000000000_kitchen.jpg` for an upload of `kitchen.jpg`
/// - recovered from `https://acct.blob.core.windows.net/images/p-42/1718000000000_kitchen.jpg`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlobName(String);

impl BlobName {
    /// Wrap an existing name, e.g. one returned by a listing
    ///
    /// # Errors
    /// - `GalleryError::InvalidBlobUrl` if the name is empty
    pub fn new(name: impl Into<String>) -> Result<Self, GalleryError> {
        let name = name.into();
        let trimmed = name.trim_start_matches('/');
        if trimmed.is_empty() {
            return Err(GalleryError::InvalidBlobUrl(name));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Derive the name for a new upload
    ///
    /// Two uploads of the same file name within one millisecond collide.
    #[inline]
    #[must_use]
    pub fn derive(owner: &OwnerId, filename: &str, timestamp_millis: i64) -> Self {
        Self(format!("{owner}/{timestamp_millis}_{filename}"))
    }

    /// Recover the name from a blob URL
    ///
    /// The first path segment is the container; everything after it is the
    /// blob name.
    ///
    /// # Errors
    /// - `GalleryError::InvalidBlobUrl` if the URL has no container segment
    ///   followed by a name
    pub fn recover(url: &Url) -> Result<Self, GalleryError> {
        let invalid = || GalleryError::InvalidBlobUrl(url.to_string());
        let mut segments = url.path_segments().ok_or_else(invalid)?;

        let container = segments.next().ok_or_else(invalid)?;
        if container.is_empty() {
            return Err(invalid());
        }

        let decoded = segments
            .map(|segment| percent_decode_str(segment).decode_utf8().map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;
        let name = decoded.join("/");
        if name.is_empty() {
            return Err(invalid());
        }
        Ok(Self(name))
    }

    /// Build the URL of this blob
    ///
    /// # Errors
    /// - `GalleryError::InvalidBlobUrl` if `endpoint` cannot carry a path
    pub fn url_in(&self, endpoint: &Url, container: &str) -> Result<Url, GalleryError> {
        let mut url = endpoint.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|()| GalleryError::InvalidBlobUrl(endpoint.to_string()))?
            .clear()
            .push(container)
            .extend(self.0.split('/'));
        Ok(url)
    }

    /// Get the name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if the name lives under the owner's prefix
    #[inline]
    #[must_use]
    pub fn is_owned_by(&self, owner: &OwnerId) -> bool {
        self.0.starts_with(&owner.blob_prefix())
    }
}

impl Display for BlobName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placeholder::PLACEHOLDER_SRC;
    use proptest::prelude::*;

    fn endpoint() -> Url {
        Url::parse("https://1stiqaridev.blob.core.windows.net").unwrap()
    }

    #[test]
    fn derive_formats_owner_timestamp_filename() {
        let owner = OwnerId::new("p-42").unwrap();
        let name = BlobName::derive(&owner, "kitchen.jpg", 1_718_000_000_000);
        assert_eq!(name.as_str(), "p-42/1718000000000_kitchen.jpg");
        assert!(name.is_owned_by(&owner));
        assert!(!name.is_owned_by(&OwnerId::new("p-4").unwrap()));
    }

    #[test]
    fn recover_drops_container_segment() {
        let url = Url::parse(
            "https://1stiqaridev.blob.core.windows.net/1stiqariimages/p-42/1_kitchen.jpg?sv=x",
        )
        .unwrap();
        assert_eq!(BlobName::recover(&url).unwrap().as_str(), "p-42/1_kitchen.jpg");
    }

    #[test]
    fn recover_decodes_escaped_segments() {
        let url = Url::parse("https://a.example/images/p-42/1_my%20room%231.jpg").unwrap();
        assert_eq!(BlobName::recover(&url).unwrap().as_str(), "p-42/1_my room#1.jpg");
    }

    #[test]
    fn recover_requires_a_name_after_container() {
        for src in [
            "https://a.example/",
            "https://a.example/images",
            "https://a.example/images/",
        ] {
            let err = BlobName::recover(&Url::parse(src).unwrap()).unwrap_err();
            assert!(matches!(err, GalleryError::InvalidBlobUrl(_)), "{src}");
        }
    }

    #[test]
    fn recover_rejects_urls_without_path() {
        for src in [PLACEHOLDER_SRC, "data:text/plain,hello", "mailto:a@example.com"] {
            assert!(BlobName::recover(&Url::parse(src).unwrap()).is_err(), "{src}");
        }
    }

    #[test]
    fn url_in_places_blob_under_container() {
        let name = BlobName::new("p-42/1_a b.jpg").unwrap();
        let url = name.url_in(&endpoint(), "images").unwrap();
        assert_eq!(
            url.as_str(),
            "https://1stiqaridev.blob.core.windows.net/images/p-42/1_a%20b.jpg"
        );
    }

    #[test]
    fn new_rejects_empty() {
        assert!(BlobName::new("").is_err());
        assert!(BlobName::new("/").is_err());
        assert_eq!(BlobName::new("/p/x").unwrap().as_str(), "p/x");
    }

    proptest! {
        #[test]
        fn recover_inverts_derive_and_url(
            owner in "[A-Za-z0-9-]{1,36}",
            filename in "[A-Za-z0-9 ._%#?&+()=-]{1,40}",
            timestamp in 0i64..4_102_444_800_000,
        ) {
            let owner = OwnerId::new(&owner).unwrap();
            let name = BlobName::derive(&owner, &filename, timestamp);
            let url = name.url_in(&endpoint(), "1stiqariimages").unwrap();
            let reparsed = Url::parse(url.as_str()).unwrap();
            prop_assert_eq!(BlobName::recover(&reparsed).unwrap(), name);
        }
    }
}
