//! Upload pipeline: pick files, upload, thumbnail, record, bind

use super::{FileOutcome, UploadReport};
use crate::blob_name::BlobName;
use crate::error::{GalleryError, Operation};
use crate::gallery::Gallery;
use crate::types::{ImageFile, OwnerId, SLOT_COUNT};

impl Gallery {
    /// Upload a batch of files into empty slots
    ///
    /// Only the first [`SLOT_COUNT`] files are processed, strictly one after
    /// another so the single notice surface stays readable. A failing file is
    /// reported and the batch moves on; nothing is rolled back.
    ///
    /// # Errors
    /// - `GalleryError::InvalidOwnerId` if no owner is bound (nothing is
    ///   uploaded)
    pub async fn upload_images(&self, files: Vec<ImageFile>) -> Result<UploadReport, GalleryError> {
        let Ok(owner) = self.require_owner() else {
            tracing::error!("upload requested without an owner");
            self.notices
                .error("No owner is bound; cannot upload images.");
            return Err(GalleryError::InvalidOwnerId);
        };

        let mut report = UploadReport {
            outcomes: Vec::with_capacity(files.len().min(SLOT_COUNT)),
            ignored: files.len().saturating_sub(SLOT_COUNT),
        };
        if report.ignored > 0 {
            tracing::info!(ignored = report.ignored, "batch exceeds slot count");
        }

        tracing::info!(owner = %owner, files = files.len().min(SLOT_COUNT), "upload batch started");
        for file in files.into_iter().take(SLOT_COUNT) {
            let result = self.upload_one(&owner, &file).await;
            match &result {
                Ok(ordinal) => {
                    tracing::info!(file = %file.name, slot = ordinal, "image uploaded");
                    self.announce_success(format!("Uploaded {} successfully.", file.name));
                }
                Err(err) => {
                    tracing::error!(file = %file.name, error = %err, "error uploading file");
                    self.notices.error(format!("Error uploading {}.", file.name));
                }
            }
            report.outcomes.push(FileOutcome {
                file: file.name,
                result,
            });
        }

        tracing::info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "upload batch finished"
        );
        Ok(report)
    }

    async fn upload_one(&self, owner: &OwnerId, file: &ImageFile) -> Result<usize, GalleryError> {
        let message = format!("Uploading {}...", file.name);
        self.notices.progress(message.as_str(), 0);

        let guard = self.registry.claim_first_empty()?;

        let name = BlobName::derive(owner, &file.name, self.clock.now_millis());
        let url = self.put_blob(&name, file, &message).await?;

        let fields = self.record_fields(owner, &url, file).await?;
        let record_id = self
            .records
            .create(&self.config.image_entity, &fields)
            .await
            .map_err(|source| GalleryError::transport(Operation::CreateRecord, &file.name, source))?;
        tracing::debug!(record = %record_id, blob = %name, "metadata record created");

        guard.set_image(url, Some(record_id))?;
        Ok(guard.ordinal())
    }
}
