//! Core types for the gallery
//!
//! Defines the fundamental types shared by the pipelines:
//! - Gallery configuration
//! - Owner, record and credential identifiers
//! - Image files selected by the user

use crate::error::GalleryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Number of slots in every gallery
pub const SLOT_COUNT: usize = 8;

/// Identifier of the business record that owns the images
///
/// Every blob name created for the owner starts with `{owner}/`, so the
/// identifier must be a single non-empty path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(String);

impl OwnerId {
    /// Create a new owner identifier
    ///
    /// Surrounding whitespace is trimmed. A GUID may be given with braces,
    /// as hosts commonly render it that way.
    ///
    /// # Errors
    /// - `GalleryError::InvalidOwnerId` if the identifier is empty or not a
    ///   usable path segment
    pub fn new(id: impl AsRef<str>) -> Result<Self, GalleryError> {
        let id = id
            .as_ref()
            .trim()
            .trim_start_matches('{')
            .trim_end_matches('}')
            .trim();
        if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\', '?', '#']) {
            return Err(GalleryError::InvalidOwnerId);
        }
        Ok(Self(id.to_string()))
    }

    /// Get the identifier
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Blob listing prefix for this owner
    #[inline]
    #[must_use]
    pub fn blob_prefix(&self) -> String {
        format!("{}/", self.0)
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a metadata record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(String);

impl RecordId {
    /// Create new record identifier
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Short-lived blob storage credential (shared access signature)
///
/// Opaque to the core. Supplied by the host and handed to every blob
/// operation as-is.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SasToken(String);

impl SasToken {
    /// Wrap a token string
    #[inline]
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Token as a query string, without a leading `?`
    #[inline]
    #[must_use]
    pub fn as_query(&self) -> &str {
        self.0.trim().trim_start_matches('?')
    }

    /// Check if no token was supplied
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_query().is_empty()
    }
}

impl fmt::Debug for SasToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("SasToken(<empty>)")
        } else {
            f.write_str("SasToken(<redacted>)")
        }
    }
}

/// Image file picked by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    /// Original file name
    pub name: String,
    /// MIME type
    pub content_type: String,
    /// Raw bytes
    pub bytes: Vec<u8>,
}

impl ImageFile {
    /// Create new image file
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Size in bytes
    #[inline]
    #[must_use]
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Gallery configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryConfig {
    /// Delay before a success notice is hidden, in milliseconds
    pub notice_hide_after_ms: u64,
    /// Metadata entity holding one record per image
    pub image_entity: String,
}

impl GalleryConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With success notice delay
    #[inline]
    #[must_use]
    pub fn with_notice_hide_after(mut self, delay: Duration) -> Self {
        self.notice_hide_after_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With metadata entity name
    #[inline]
    #[must_use]
    pub fn with_image_entity(mut self, entity: impl Into<String>) -> Self {
        self.image_entity = entity.into();
        self
    }

    /// Success notice delay
    #[inline]
    #[must_use]
    pub fn notice_hide_after(&self) -> Duration {
        Duration::from_millis(self.notice_hide_after_ms)
    }
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            notice_hide_after_ms: 3_000,
            image_entity: "iqa_propertyimage".to_string(),
        }
    }
}
