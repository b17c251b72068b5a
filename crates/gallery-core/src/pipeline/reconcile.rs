//! Reconciliation: repopulate slots from storage on (re)binding

use crate::blob_name::BlobName;
use crate::error::{GalleryError, Operation};
use crate::gallery::Gallery;
use crate::registry::Slot;
use crate::store::StoredRecord;
use crate::types::{OwnerId, RecordId, SLOT_COUNT};
use url::Url;

impl Gallery {
    /// Repopulate every slot from the owner's blobs
    ///
    /// Blobs under `{owner}/` fill slots in listing order, capped at
    /// [`SLOT_COUNT`]; the rest become placeholders. Record links are
    /// recovered by matching each blob URL against the owner's records. When
    /// that query fails the slots load without links.
    ///
    /// Returns the number of populated slots. Without an owner this is a
    /// no-op.
    ///
    /// # Errors
    /// - transport failure of the blob listing (shown to the user; slots
    ///   are left as they were)
    /// - `GalleryError::OwnerChanged` if the owner was rebound meanwhile
    pub async fn reconcile(&self) -> Result<usize, GalleryError> {
        let Some(owner) = self.owner() else {
            tracing::debug!("reconcile skipped: no owner bound");
            return Ok(0);
        };
        let epoch = self.registry.epoch();

        let names = match self.list_owned(&owner).await {
            Ok(names) => names,
            Err(err) => {
                tracing::error!(error = %err, "error loading existing images");
                self.notices.error("Error loading images.");
                return Err(err);
            }
        };

        let records = match self
            .records
            .find_by_owner(&self.config.image_entity, &owner)
            .await
        {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!(owner = %owner, error = %err, "record query failed; slots load without record links");
                Vec::new()
            }
        };

        let images = names
            .into_iter()
            .map(|(name, url)| {
                let record_id = linked_record(&records, url.as_str());
                tracing::trace!(blob = %name, linked = record_id.is_some(), "slot image");
                Slot::with_image(url, record_id)
            })
            .collect();

        let loaded = self.registry.load(epoch, images)?;
        tracing::info!(
            owner = %owner,
            loaded,
            linked = self.registry.snapshot().iter().filter(|s| s.record_id.is_some()).count(),
            "slots reconciled"
        );
        Ok(loaded)
    }

    /// First [`SLOT_COUNT`] blob names under the owner's prefix with their URLs
    async fn list_owned(&self, owner: &OwnerId) -> Result<Vec<(BlobName, Url)>, GalleryError> {
        let prefix = owner.blob_prefix();
        let names = self
            .blobs
            .list(&self.credential(), &prefix)
            .await
            .map_err(|source| GalleryError::transport(Operation::ListBlobs, prefix, source))?;
        names
            .into_iter()
            .filter(|name| {
                let owned = name.is_owned_by(owner);
                if !owned {
                    tracing::warn!(blob = %name, "listing returned a blob outside the owner prefix");
                }
                owned
            })
            .take(SLOT_COUNT)
            .map(|name| {
                let url = self
                    .blobs
                    .url_for(&name)
                    .map_err(|source| GalleryError::transport(Operation::ListBlobs, name.as_str(), source))?;
                Ok((name, url))
            })
            .collect()
    }
}

fn linked_record(records: &[StoredRecord], url: &str) -> Option<RecordId> {
    records
        .iter()
        .find(|record| record.image_url == url)
        .map(|record| record.id.clone())
}
