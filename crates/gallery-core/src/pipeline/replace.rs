//! Replace pipeline: swap the image behind one slot

use crate::blob_name::BlobName;
use crate::error::{GalleryError, Operation};
use crate::gallery::Gallery;
use crate::store::ImageRecordFields;
use crate::types::{ImageFile, RecordId};

impl Gallery {
    /// Replace the image in slot `ordinal` with `file`
    ///
    /// The old blob is deleted best-effort and its name is reused for the new
    /// bytes. The slot's linked record is updated in place, or a new one is
    /// created, and the resulting id is stored back into the slot.
    ///
    /// Returns the linked record id. The outcome has already been shown to
    /// the user.
    ///
    /// # Errors
    /// - `GalleryError::InvalidOwnerId` if no owner is bound
    /// - `GalleryError::InvalidSlot` / `GalleryError::SlotBusy` if the slot
    ///   cannot be taken
    /// - transport and thumbnail failures of the upload or record write
    pub async fn replace_image(&self, ordinal: usize, file: ImageFile) -> Result<RecordId, GalleryError> {
        let result = self.replace_inner(ordinal, &file).await;
        match &result {
            Ok(record_id) => {
                tracing::info!(file = %file.name, slot = ordinal, record = %record_id, "image replaced");
                self.announce_success(format!("Replaced {} successfully.", file.name));
            }
            Err(GalleryError::InvalidOwnerId) => {
                tracing::error!("replace requested without an owner");
                self.notices
                    .error("No owner is bound; cannot replace images.");
            }
            Err(err) => {
                tracing::error!(file = %file.name, slot = ordinal, error = %err, "error replacing file");
                self.notices.error(format!("Error replacing {}.", file.name));
            }
        }
        result
    }

    async fn replace_inner(&self, ordinal: usize, file: &ImageFile) -> Result<RecordId, GalleryError> {
        let owner = self.require_owner()?;
        let guard = self.registry.try_acquire(ordinal)?;

        let message = format!("Replacing {}...", file.name);
        self.notices.progress(message.as_str(), 0);

        let previous = guard.slot();
        let recovered = previous.display.blob_url().and_then(|url| {
            BlobName::recover(url)
                .map_err(|err| tracing::warn!(error = %err, "could not parse existing url"))
                .ok()
        });

        if let Some(name) = &recovered {
            match self.blobs.delete(&self.credential(), name).await {
                Ok(()) => tracing::debug!(blob = %name, "deleted existing blob"),
                Err(err) => tracing::warn!(
                    blob = %name,
                    error = %err,
                    "could not delete existing blob, proceeding with upload"
                ),
            }
        }

        let name = recovered
            .unwrap_or_else(|| BlobName::derive(&owner, &file.name, self.clock.now_millis()));
        let url = self.put_blob(&name, file, &message).await?;

        let fields = self.record_fields(&owner, &url, file).await?;
        let record_id = self
            .upsert_record(previous.record_id.as_ref(), &fields, &file.name)
            .await?;

        guard.set_image(url, Some(record_id.clone()))?;
        Ok(record_id)
    }

    /// Update the linked record, or create one when there is none or the
    /// update fails
    async fn upsert_record(
        &self,
        existing: Option<&RecordId>,
        fields: &ImageRecordFields,
        file_name: &str,
    ) -> Result<RecordId, GalleryError> {
        let entity = self.config.image_entity.as_str();

        if let Some(id) = existing {
            match self.records.update(entity, id, fields).await {
                Ok(()) => {
                    tracing::debug!(record = %id, "metadata record updated");
                    return Ok(id.clone());
                }
                Err(err) => tracing::warn!(
                    record = %id,
                    error = %err,
                    "could not update linked record, creating a new one"
                ),
            }
        }

        self.records
            .create(entity, fields)
            .await
            .map_err(|source| GalleryError::transport(Operation::CreateRecord, file_name, source))
    }
}
