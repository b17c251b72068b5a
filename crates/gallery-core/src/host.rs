//! Host-provided collaborators
//!
//! Thumbnail derivation, the delete confirmation gate and the clock used for
//! blob names all come from the host.

use crate::error::{GalleryError, ThumbnailError};
use crate::types::ImageFile;
use async_trait::async_trait;

/// Derives a thumbnail for an image
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ThumbnailGenerator: Send + Sync {
    /// Thumbnail as a data URI, `data:<mime>;base64,<payload>`
    async fn derive(&self, file: &ImageFile) -> Result<String, ThumbnailError>;
}

/// Blocking yes/no gate shown before destructive actions
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Confirm: Send + Sync {
    /// Ask the user; `true` means proceed
    async fn confirm(&self, prompt: &str) -> bool;
}

/// Time source for blob names
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch
    fn now_millis(&self) -> i64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Payload of a data URI: everything after the first comma
///
/// # Errors
/// - `GalleryError::Thumbnail` if there is no comma or the payload is empty
pub fn thumbnail_payload(data_uri: &str) -> Result<&str, GalleryError> {
    match data_uri.split_once(',') {
        Some((_, payload)) if !payload.is_empty() => Ok(payload),
        _ => Err(GalleryError::Thumbnail("data URI has no payload".to_string())),
    }
}
