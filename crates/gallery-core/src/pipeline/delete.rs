//! Delete pipeline: remove the image behind one slot

use crate::blob_name::BlobName;
use crate::error::{GalleryError, Operation};
use crate::gallery::Gallery;
use crate::placeholder::DisplayRef;

const CONFIRM_PROMPT: &str = "Are you sure you want to delete this image?";

impl Gallery {
    /// Delete the image in slot `ordinal` after user confirmation
    ///
    /// A blob delete failure aborts the operation with the slot untouched. A
    /// record delete failure is reported, but the slot is still reset since
    /// its blob is already gone.
    ///
    /// # Errors
    /// - `GalleryError::InvalidOwnerId` if no owner is bound
    /// - `GalleryError::NoImage` if the slot shows the placeholder
    /// - `GalleryError::UserDeclined` if the confirmation was rejected (no
    ///   notice is shown)
    /// - `GalleryError::InvalidSlot` / `GalleryError::SlotBusy` if the slot
    ///   cannot be taken
    /// - transport failures of the blob or record delete
    pub async fn delete_image(&self, ordinal: usize) -> Result<(), GalleryError> {
        let result = self.delete_inner(ordinal).await;
        match &result {
            Ok(()) => {
                tracing::info!(slot = ordinal, "image deleted");
                self.announce_success("Image deleted successfully.".to_string());
            }
            Err(err) if err.is_silent() => {
                tracing::debug!(slot = ordinal, error = %err, "delete declined");
            }
            Err(GalleryError::InvalidOwnerId) => {
                tracing::error!("delete requested without an owner");
                self.notices
                    .error("No owner is bound; cannot delete images.");
            }
            Err(GalleryError::NoImage(_)) => {
                self.notices
                    .error("No image found in this slot to delete.");
            }
            Err(err) => {
                tracing::error!(slot = ordinal, error = %err, "error deleting image");
                self.notices.error("Failed to delete image.");
            }
        }
        result
    }

    async fn delete_inner(&self, ordinal: usize) -> Result<(), GalleryError> {
        self.require_owner()?;
        if self.registry.get(ordinal)?.is_empty() {
            return Err(GalleryError::NoImage(ordinal));
        }
        let guard = self.registry.try_acquire(ordinal)?;

        let slot = guard.slot();
        let DisplayRef::Blob(url) = &slot.display else {
            return Err(GalleryError::NoImage(ordinal));
        };

        if !self.confirm.confirm(CONFIRM_PROMPT).await {
            return Err(GalleryError::UserDeclined);
        }

        self.notices.progress("Deleting image...", 0);

        let name = BlobName::recover(url)?;
        self.blobs
            .delete(&self.credential(), &name)
            .await
            .map_err(|source| GalleryError::transport(Operation::DeleteBlob, name.as_str(), source))?;
        tracing::debug!(blob = %name, "blob deleted");

        let record_result = match &slot.record_id {
            Some(id) => self
                .records
                .delete(&self.config.image_entity, id)
                .await
                .map_err(|source| {
                    tracing::error!(record = %id, "metadata record left orphaned");
                    GalleryError::transport(Operation::DeleteRecord, id.as_str(), source)
                }),
            None => {
                tracing::debug!(slot = ordinal, "no linked record; blob-only delete");
                Ok(())
            }
        };

        guard.reset()?;
        record_result
    }
}
