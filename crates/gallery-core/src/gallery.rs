//! Gallery orchestrator
//!
//! [`Gallery`] owns the slot registry and the notification surface for one
//! owner binding, and drives the upload, replace, delete and reconciliation
//! pipelines against the external collaborators.

use crate::blob_name::BlobName;
use crate::error::{GalleryError, Operation};
use crate::host::{thumbnail_payload, Clock, Confirm, ThumbnailGenerator};
use crate::notification::{percent, Notification, NotificationChannel, NotificationSink};
use crate::registry::{Slot, SlotRegistry};
use crate::store::{BlobStore, ImageRecordFields, MetadataStore};
use crate::types::{GalleryConfig, ImageFile, OwnerId, SasToken};
use parking_lot::RwLock;
use std::sync::Arc;
use url::Url;

/// External collaborators a gallery orchestrates
#[derive(Clone)]
pub struct Collaborators {
    /// Image bytes
    pub blobs: Arc<dyn BlobStore>,
    /// Image metadata records
    pub records: Arc<dyn MetadataStore>,
    /// Thumbnail derivation
    pub thumbnails: Arc<dyn ThumbnailGenerator>,
    /// Delete confirmation gate
    pub confirm: Arc<dyn Confirm>,
    /// Time source for blob names
    pub clock: Arc<dyn Clock>,
    /// Notification renderer
    pub notices: Arc<dyn NotificationSink>,
}

/// Inputs supplied by the host
#[derive(Debug, Default)]
struct Binding {
    owner: Option<OwnerId>,
    credential: SasToken,
}

/// Eight-slot image gallery bound to one owner
///
/// Pipelines take `&self` and may run concurrently on one runtime; two
/// pipelines touching the same slot are rejected with `SlotBusy`.
pub struct Gallery {
    /// Configuration
    pub(crate) config: GalleryConfig,
    pub(crate) blobs: Arc<dyn BlobStore>,
    pub(crate) records: Arc<dyn MetadataStore>,
    pub(crate) thumbnails: Arc<dyn ThumbnailGenerator>,
    pub(crate) confirm: Arc<dyn Confirm>,
    pub(crate) clock: Arc<dyn Clock>,
    /// Slot state
    pub(crate) registry: SlotRegistry,
    /// Shared status surface
    pub(crate) notices: Arc<NotificationChannel>,
    binding: RwLock<Binding>,
}

impl std::fmt::Debug for Gallery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gallery")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("binding", &*self.binding.read())
            .finish_non_exhaustive()
    }
}

impl Gallery {
    /// Create an unbound gallery with every slot empty
    #[must_use]
    pub fn new(config: GalleryConfig, collaborators: Collaborators) -> Self {
        Self {
            config,
            blobs: collaborators.blobs,
            records: collaborators.records,
            thumbnails: collaborators.thumbnails,
            confirm: collaborators.confirm,
            clock: collaborators.clock,
            registry: SlotRegistry::new(),
            notices: Arc::new(NotificationChannel::new(collaborators.notices)),
            binding: RwLock::new(Binding::default()),
        }
    }

    /// Bind to an owner with a credential and reconcile
    ///
    /// Returns the number of slots populated from storage.
    ///
    /// # Errors
    /// - `GalleryError::InvalidOwnerId` if `owner` is empty or malformed; the
    ///   gallery is left unbound and empty
    /// - any reconciliation error (already shown to the user)
    pub async fn bind(&self, owner: &str, credential: SasToken) -> Result<usize, GalleryError> {
        self.set_credential(credential);
        self.set_owner(owner).await
    }

    /// Replace the blob credential without touching slot state
    pub fn set_credential(&self, credential: SasToken) {
        self.binding.write().credential = credential;
    }

    /// Rebind to `owner` and reconcile
    ///
    /// A different owner clears every slot before reconciliation runs. The
    /// same owner only re-runs reconciliation.
    ///
    /// # Errors
    /// See [`Self::bind`].
    pub async fn set_owner(&self, owner: &str) -> Result<usize, GalleryError> {
        let parsed = OwnerId::new(owner);
        let next = parsed.as_ref().ok().cloned();

        let changed = {
            let mut binding = self.binding.write();
            let changed = binding.owner != next;
            binding.owner = next;
            changed
        };

        if changed {
            tracing::info!(owner = %owner.trim(), "owner binding changed");
            self.registry.reset_all();
        }

        match parsed {
            Ok(_) => self.reconcile().await,
            Err(err) => {
                tracing::warn!("no usable owner bound; gallery left empty");
                Err(err)
            }
        }
    }

    /// Bound owner
    #[must_use]
    pub fn owner(&self) -> Option<OwnerId> {
        self.binding.read().owner.clone()
    }

    /// Copy of all slots, in ordinal order
    #[must_use]
    pub fn slots(&self) -> Vec<Slot> {
        self.registry.snapshot()
    }

    /// Slot registry
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &SlotRegistry {
        &self.registry
    }

    /// Currently visible notice
    #[must_use]
    pub fn notification(&self) -> Option<Notification> {
        self.notices.current()
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &GalleryConfig {
        &self.config
    }

    pub(crate) fn credential(&self) -> SasToken {
        self.binding.read().credential.clone()
    }

    pub(crate) fn require_owner(&self) -> Result<OwnerId, GalleryError> {
        self.owner().ok_or(GalleryError::InvalidOwnerId)
    }

    /// Upload a file under `name`, mirroring progress on the notice surface
    pub(crate) async fn put_blob(
        &self,
        name: &BlobName,
        file: &ImageFile,
        message: &str,
    ) -> Result<Url, GalleryError> {
        let size = file.size();
        let channel = Arc::clone(&self.notices);
        let label = message.to_string();
        let on_progress = move |loaded: u64| {
            channel.progress(label.as_str(), percent(loaded, size));
        };

        tracing::debug!(blob = %name, size, "uploading blob");
        self.blobs
            .upload(
                &self.credential(),
                name,
                &file.bytes,
                &file.content_type,
                &on_progress,
            )
            .await
            .map_err(|source| GalleryError::transport(Operation::Upload, &file.name, source))
    }

    /// Derive the record fields for a freshly uploaded file
    pub(crate) async fn record_fields(
        &self,
        owner: &OwnerId,
        url: &Url,
        file: &ImageFile,
    ) -> Result<ImageRecordFields, GalleryError> {
        let data_uri = self.thumbnails.derive(file).await?;
        let thumbnail = thumbnail_payload(&data_uri)?.to_string();
        Ok(ImageRecordFields {
            owner: owner.clone(),
            image_url: url.to_string(),
            thumbnail,
        })
    }

    /// Show a success notice that hides itself after the configured delay
    pub(crate) fn announce_success(&self, message: String) {
        self.notices
            .success_transient(message, self.config.notice_hide_after());
    }
}
