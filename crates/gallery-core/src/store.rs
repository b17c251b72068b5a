//! Storage collaborators
//!
//! The core orchestrates two systems of record it does not own:
//! - [`BlobStore`]: image bytes, addressed by [`BlobName`]
//! - [`MetadataStore`]: one structured record per image, linked to the owner

use crate::blob_name::BlobName;
use crate::error::TransportError;
use crate::types::{OwnerId, RecordId, SasToken};
use async_trait::async_trait;
use serde::Serialize;
use url::Url;

/// Blob storage bound to one account and container
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload `bytes` under `name`, returning the blob URL
    ///
    /// `on_progress` receives the cumulative number of bytes sent.
    async fn upload(
        &self,
        credential: &SasToken,
        name: &BlobName,
        bytes: &[u8],
        content_type: &str,
        on_progress: &(dyn Fn(u64) + Send + Sync),
    ) -> Result<Url, TransportError>;

    /// Delete a blob
    ///
    /// Deleting a missing blob is not guaranteed to succeed.
    async fn delete(&self, credential: &SasToken, name: &BlobName) -> Result<(), TransportError>;

    /// Names of the blobs under `prefix`, in a stable order
    async fn list(&self, credential: &SasToken, prefix: &str)
        -> Result<Vec<BlobName>, TransportError>;

    /// URL of a blob, without credentials
    fn url_for(&self, name: &BlobName) -> Result<Url, TransportError>;
}

/// Fields of an image metadata record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRecordFields {
    /// Owner the image belongs to
    pub owner: OwnerId,
    /// Blob URL
    pub image_url: String,
    /// Base64 thumbnail payload, without the data URI header
    pub thumbnail: String,
}

/// Record returned by an owner query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    /// Record identifier
    pub id: RecordId,
    /// Blob URL stored in the record
    pub image_url: String,
}

/// Structured record store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Create a record, returning its identifier
    async fn create(
        &self,
        entity: &str,
        fields: &ImageRecordFields,
    ) -> Result<RecordId, TransportError>;

    /// Overwrite the fields of an existing record
    async fn update(
        &self,
        entity: &str,
        id: &RecordId,
        fields: &ImageRecordFields,
    ) -> Result<(), TransportError>;

    /// Delete a record
    async fn delete(&self, entity: &str, id: &RecordId) -> Result<(), TransportError>;

    /// Records linked to `owner`
    async fn find_by_owner(
        &self,
        entity: &str,
        owner: &OwnerId,
    ) -> Result<Vec<StoredRecord>, TransportError>;
}
