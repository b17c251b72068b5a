//! Dataverse Web API adapter for image metadata records

use crate::http;
use async_trait::async_trait;
use gallery_core::{ImageRecordFields, MetadataStore, OwnerId, RecordId, StoredRecord, TransportError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

/// Dataverse environment and image table layout
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataverseConfig {
    /// Environment URL, e.g. `https://org.crm.dynamics.com`
    pub base_url: Url,
    /// Web API version
    #[serde(default = "defaults::api_version")]
    pub api_version: String,
    /// Logical name of the image table
    #[serde(default = "defaults::entity")]
    pub entity: String,
    /// Entity set of the image table
    #[serde(default = "defaults::entity_set")]
    pub entity_set: String,
    /// Entity set of the owner table
    #[serde(default = "defaults::owner_entity_set")]
    pub owner_entity_set: String,
    /// Lookup column pointing at the owner
    #[serde(default = "defaults::owner_field")]
    pub owner_field: String,
    /// Column holding the blob URL
    #[serde(default = "defaults::url_field")]
    pub url_field: String,
    /// Column holding the thumbnail payload
    #[serde(default = "defaults::thumbnail_field")]
    pub thumbnail_field: String,
    /// Bearer token for the Web API
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
}

mod defaults {
    pub(super) fn api_version() -> String {
        "v9.2".to_string()
    }
    pub(super) fn entity() -> String {
        "iqa_propertyimage".to_string()
    }
    pub(super) fn entity_set() -> String {
        "iqa_propertyimages".to_string()
    }
    pub(super) fn owner_entity_set() -> String {
        "iqa_properties".to_string()
    }
    pub(super) fn owner_field() -> String {
        "iqa_property".to_string()
    }
    pub(super) fn url_field() -> String {
        "iqa_imageurl".to_string()
    }
    pub(super) fn thumbnail_field() -> String {
        "iqa_imagethumbnail".to_string()
    }
}

impl std::fmt::Debug for DataverseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataverseConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_version", &self.api_version)
            .field("entity", &self.entity)
            .field("entity_set", &self.entity_set)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl DataverseConfig {
    /// Create config with the default image table layout
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            api_version: defaults::api_version(),
            entity: defaults::entity(),
            entity_set: defaults::entity_set(),
            owner_entity_set: defaults::owner_entity_set(),
            owner_field: defaults::owner_field(),
            url_field: defaults::url_field(),
            thumbnail_field: defaults::thumbnail_field(),
            token: None,
        }
    }

    /// With bearer token
    #[inline]
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

/// [`MetadataStore`] backed by the Dataverse Web API
#[derive(Debug, Clone)]
pub struct DataverseMetadataStore {
    client: reqwest::Client,
    config: DataverseConfig,
}

impl DataverseMetadataStore {
    /// Create store with its own HTTP client
    ///
    /// # Errors
    /// - `TransportError::Request` if the client cannot be built
    pub fn new(config: DataverseConfig) -> Result<Self, TransportError> {
        Ok(Self::with_client(config, http::client()?))
    }

    /// Create store sharing an HTTP client
    #[must_use]
    pub fn with_client(config: DataverseConfig, client: reqwest::Client) -> Self {
        Self { client, config }
    }

    /// Entity set for a logical table name
    ///
    /// The configured image table maps to its configured set; any other
    /// table uses the default plural.
    fn entity_set(&self, entity: &str) -> String {
        if entity == self.config.entity {
            self.config.entity_set.clone()
        } else {
            format!("{entity}s")
        }
    }

    fn api_url(&self, last: &str) -> Result<Url, TransportError> {
        let mut url = self.config.base_url.clone();
        url.set_query(None);
        url.path_segments_mut()
            .map_err(|()| TransportError::Malformed(format!("base url {} cannot hold a path", self.config.base_url)))?
            .pop_if_empty()
            .extend(["api", "data", self.config.api_version.as_str(), last]);
        Ok(url)
    }

    fn record_url(&self, entity: &str, id: &RecordId) -> Result<Url, TransportError> {
        self.api_url(&format!("{}({id})", self.entity_set(entity)))
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header("OData-MaxVersion", "4.0")
            .header("OData-Version", "4.0")
            .header(reqwest::header::ACCEPT, "application/json");
        match &self.config.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Body of a create request, binding the owner lookup
    fn create_body(&self, fields: &ImageRecordFields) -> Value {
        let mut body = self.update_body(fields);
        if let Value::Object(map) = &mut body {
            map.insert(
                format!("{}@odata.bind", self.config.owner_field),
                Value::String(format!("/{}({})", self.config.owner_entity_set, fields.owner)),
            );
        }
        body
    }

    fn update_body(&self, fields: &ImageRecordFields) -> Value {
        let mut map = Map::new();
        map.insert(self.config.url_field.clone(), Value::String(fields.image_url.clone()));
        map.insert(
            self.config.thumbnail_field.clone(),
            Value::String(fields.thumbnail.clone()),
        );
        Value::Object(map)
    }

    fn owner_query(&self, entity: &str, owner: &OwnerId) -> Result<Url, TransportError> {
        let mut url = self.api_url(&self.entity_set(entity))?;
        url.query_pairs_mut()
            .append_pair("$select", &format!("{entity}id,{}", self.config.url_field))
            .append_pair(
                "$filter",
                &format!("_{}_value eq {owner}", self.config.owner_field),
            );
        Ok(url)
    }
}

/// One page of a collection response
#[derive(Debug, Deserialize)]
struct Page {
    value: Vec<Map<String, Value>>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

/// Record id from an `OData-EntityId` header value
fn entity_id(header: &str) -> Option<RecordId> {
    let start = header.rfind('(')? + 1;
    let end = header[start..].find(')')? + start;
    let id = header[start..end].trim_matches('\'');
    (!id.is_empty()).then(|| RecordId::new(id))
}

fn stored_records(rows: Vec<Map<String, Value>>, id_field: &str, url_field: &str) -> Vec<StoredRecord> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.get(id_field)?.as_str()?;
            let image_url = row.get(url_field)?.as_str()?;
            Some(StoredRecord {
                id: RecordId::new(id),
                image_url: image_url.to_string(),
            })
        })
        .collect()
}

#[async_trait]
impl MetadataStore for DataverseMetadataStore {
    async fn create(&self, entity: &str, fields: &ImageRecordFields) -> Result<RecordId, TransportError> {
        let url = self.api_url(&self.entity_set(entity))?;
        let response = self
            .request(reqwest::Method::POST, url)
            .json(&self.create_body(fields))
            .send()
            .await
            .map_err(|error| http::send_error(&error))?;
        let response = http::check(response).await?;

        let header = response
            .headers()
            .get("OData-EntityId")
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| TransportError::Malformed("create response has no OData-EntityId".to_string()))?;
        let id = entity_id(header)
            .ok_or_else(|| TransportError::Malformed(format!("unrecognized OData-EntityId {header}")))?;
        tracing::debug!(entity, record = %id, "record created");
        Ok(id)
    }

    async fn update(&self, entity: &str, id: &RecordId, fields: &ImageRecordFields) -> Result<(), TransportError> {
        let url = self.record_url(entity, id)?;
        // If-Match stops PATCH from creating a record under a stale id
        let response = self
            .request(reqwest::Method::PATCH, url)
            .header(reqwest::header::IF_MATCH, "*")
            .json(&self.update_body(fields))
            .send()
            .await
            .map_err(|error| http::send_error(&error))?;
        http::check(response).await?;
        Ok(())
    }

    async fn delete(&self, entity: &str, id: &RecordId) -> Result<(), TransportError> {
        let url = self.record_url(entity, id)?;
        let response = self
            .request(reqwest::Method::DELETE, url)
            .send()
            .await
            .map_err(|error| http::send_error(&error))?;
        http::check(response).await?;
        Ok(())
    }

    async fn find_by_owner(&self, entity: &str, owner: &OwnerId) -> Result<Vec<StoredRecord>, TransportError> {
        let id_field = format!("{entity}id");
        let mut next = Some(self.owner_query(entity, owner)?);
        let mut records = Vec::new();

        while let Some(url) = next.take() {
            let response = self
                .request(reqwest::Method::GET, url)
                .send()
                .await
                .map_err(|error| http::send_error(&error))?;
            let body = http::text(response).await?;
            let page: Page =
                serde_json::from_str(&body).map_err(|error| TransportError::Malformed(error.to_string()))?;

            records.extend(stored_records(page.value, &id_field, &self.config.url_field));
            next = page
                .next_link
                .map(|link| Url::parse(&link).map_err(|error| TransportError::Malformed(error.to_string())))
                .transpose()?;
        }

        tracing::debug!(entity, owner = %owner, count = records.len(), "records queried");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn store() -> DataverseMetadataStore {
        let config = DataverseConfig::new(Url::parse("https://org.crm.dynamics.com").unwrap());
        DataverseMetadataStore::new(config).unwrap()
    }

    fn fields() -> ImageRecordFields {
        ImageRecordFields {
            owner: OwnerId::new("6f1c2a4e-0000-4000-8000-000000000001").unwrap(),
            image_url: "https://acct.blob.core.windows.net/images/p/1_a.jpg".to_string(),
            thumbnail: "VEhVTUI=".to_string(),
        }
    }

    #[test]
    fn test_create_body_binds_owner() {
        assert_eq!(
            store().create_body(&fields()),
            json!({
                "iqa_property@odata.bind": "/iqa_properties(6f1c2a4e-0000-4000-8000-000000000001)",
                "iqa_imageurl": "https://acct.blob.core.windows.net/images/p/1_a.jpg",
                "iqa_imagethumbnail": "VEhVTUI=",
            })
        );
    }

    #[test]
    fn test_update_body_leaves_owner_alone() {
        let body = store().update_body(&fields());
        assert!(body.get("iqa_property@odata.bind").is_none());
        assert_eq!(body["iqa_imagethumbnail"], "VEhVTUI=");
    }

    #[test]
    fn test_record_url() {
        let url = store()
            .record_url("iqa_propertyimage", &RecordId::new("1234"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://org.crm.dynamics.com/api/data/v9.2/iqa_propertyimages(1234)"
        );
    }

    #[test]
    fn test_other_tables_use_default_plural() {
        assert_eq!(store().entity_set("contact"), "contacts");
    }

    #[test]
    fn test_owner_query_filters_on_lookup_value() {
        let owner = OwnerId::new("abc").unwrap();
        let url = store().owner_query("iqa_propertyimage", &owner).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("$select".to_string(), "iqa_propertyimageid,iqa_imageurl".to_string()),
                ("$filter".to_string(), "_iqa_property_value eq abc".to_string()),
            ]
        );
        assert_eq!(url.path(), "/api/data/v9.2/iqa_propertyimages");
    }

    #[test]
    fn test_entity_id_from_header() {
        assert_eq!(
            entity_id("https://org.crm.dynamics.com/api/data/v9.2/iqa_propertyimages(00000000-0000-0000-0000-000000000002)"),
            Some(RecordId::new("00000000-0000-0000-0000-000000000002"))
        );
        assert_eq!(entity_id("https://org/api/data/v9.2/iqa_propertyimages()"), None);
        assert_eq!(entity_id("no id here"), None);
    }

    #[test]
    fn test_page_parsing_skips_incomplete_rows() {
        let body = r#"{
            "@odata.context": "ctx",
            "value": [
                {"iqa_propertyimageid": "r1", "iqa_imageurl": "https://a/images/p/1.jpg"},
                {"iqa_propertyimageid": "r2", "iqa_imageurl": null},
                {"iqa_imageurl": "https://a/images/p/3.jpg"}
            ],
            "@odata.nextLink": "https://org.crm.dynamics.com/api/data/v9.2/iqa_propertyimages?$skiptoken=x"
        }"#;
        let page: Page = serde_json::from_str(body).unwrap();
        assert!(page.next_link.is_some());

        let records = stored_records(page.value, "iqa_propertyimageid", "iqa_imageurl");
        assert_eq!(
            records,
            vec![StoredRecord {
                id: RecordId::new("r1"),
                image_url: "https://a/images/p/1.jpg".to_string(),
            }]
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = DataverseConfig::new(Url::parse("https://org.crm.dynamics.com").unwrap()).with_token("secret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_config_defaults() {
        let config: DataverseConfig = serde_json::from_value(json!({
            "base_url": "https://org.crm.dynamics.com",
        }))
        .unwrap();
        assert_eq!(config, DataverseConfig::new(Url::parse("https://org.crm.dynamics.com").unwrap()));
    }
}
