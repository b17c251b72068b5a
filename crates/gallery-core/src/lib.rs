//! Gallery Core - eight-slot image attachments
//!
//! Keeps a fixed grid of image slots in sync with two external systems of
//! record:
//! - Blob storage, holding the image bytes
//! - A metadata store, holding one record per image linked to the owner
//!
//! The [`Gallery`] drives four pipelines over those collaborators: upload,
//! replace, delete and reconciliation on (re)binding.
//!
//! # Example
//!
//! ```rust,ignore
//! use gallery_core::{Gallery, GalleryConfig, ImageFile, SasToken};
//!
//! # async fn example(collaborators: gallery_core::Collaborators) -> Result<(), gallery_core::GalleryError> {
//! let gallery = Gallery::new(GalleryConfig::new(), collaborators);
//! gallery.bind("6f1c2a4e-0000-4000-8000-000000000001", SasToken::new("sv=...")).await?;
//!
//! let file = ImageFile::new("kitchen.jpg", "image/jpeg", std::fs::read("kitchen.jpg").unwrap());
//! let report = gallery.upload_images(vec![file]).await?;
//! println!("{} uploaded", report.succeeded());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod blob_name;
pub mod error;
pub mod gallery;
pub mod host;
pub mod notification;
pub mod pipeline;
pub mod placeholder;
pub mod registry;
pub mod store;
pub mod types;

// Re-exports for convenience
pub use blob_name::BlobName;
pub use error::{GalleryError, GalleryResult, Operation, ThumbnailError, TransportError};
pub use gallery::{Collaborators, Gallery};
pub use host::{thumbnail_payload, Clock, Confirm, SystemClock, ThumbnailGenerator};
pub use notification::{percent, NoticeKind, Notification, NotificationChannel, NotificationSink};
pub use pipeline::{FileOutcome, UploadReport};
pub use placeholder::{DisplayRef, PLACEHOLDER_SRC};
pub use registry::{Slot, SlotGuard, SlotRegistry};
pub use store::{BlobStore, ImageRecordFields, MetadataStore, StoredRecord};
pub use types::{GalleryConfig, ImageFile, OwnerId, RecordId, SasToken, SLOT_COUNT};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the gallery
    pub use crate::{
        BlobName, BlobStore, Collaborators, Confirm, DisplayRef, Gallery, GalleryConfig,
        GalleryError, ImageFile, MetadataStore, NotificationSink, OwnerId, RecordId, SasToken,
        Slot, ThumbnailGenerator, SLOT_COUNT,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
