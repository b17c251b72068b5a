//! Error types for the gallery core
//!
//! Provides error handling for:
//! - Owner binding and slot addressing
//! - Blob URL parsing
//! - Collaborator (blob store, metadata store, thumbnail) failures
//! - Slot capacity and per-slot exclusion

use std::fmt;

/// Failure reported by an external collaborator (blob store or metadata store)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Request could not be sent or the connection dropped
    #[error("request failed: {0}")]
    Request(String),

    /// Credential missing, expired or rejected
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Target does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Service answered with a non-success status
    #[error("service returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Response could not be understood
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl TransportError {
    /// Create request error
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request(message.into())
    }

    /// Create status error
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }
}

/// Failure reported by a thumbnail generator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ThumbnailError(pub String);

/// Collaborator call that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Blob upload
    Upload,
    /// Blob deletion
    DeleteBlob,
    /// Blob listing
    ListBlobs,
    /// Metadata record creation
    CreateRecord,
    /// Metadata record update
    UpdateRecord,
    /// Metadata record deletion
    DeleteRecord,
    /// Metadata record query
    QueryRecords,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Upload => "upload",
            Self::DeleteBlob => "blob delete",
            Self::ListBlobs => "blob listing",
            Self::CreateRecord => "record create",
            Self::UpdateRecord => "record update",
            Self::DeleteRecord => "record delete",
            Self::QueryRecords => "record query",
        };
        f.write_str(name)
    }
}

/// Main gallery error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GalleryError {
    /// No owner bound, or the owner identifier is malformed
    #[error("no valid owner is bound")]
    InvalidOwnerId,

    /// URL could not be mapped back to a blob name
    #[error("invalid blob url: {0}")]
    InvalidBlobUrl(String),

    /// Collaborator call failed
    #[error("{op} failed for {target}: {source}")]
    Transport {
        /// Failed operation
        op: Operation,
        /// Affected file, blob or record
        target: String,
        /// Underlying failure
        #[source]
        source: TransportError,
    },

    /// Delete confirmation rejected
    #[error("operation declined by user")]
    UserDeclined,

    /// No placeholder slot left
    #[error("all {0} slots are occupied")]
    SlotsFull(usize),

    /// Another pipeline holds the slot
    #[error("slot {0} is busy")]
    SlotBusy(usize),

    /// Ordinal outside the registry
    #[error("slot {0} does not exist")]
    InvalidSlot(usize),

    /// Slot shows the placeholder
    #[error("slot {0} has no image")]
    NoImage(usize),

    /// Thumbnail derivation failed or returned an unusable data URI
    #[error("thumbnail failed: {0}")]
    Thumbnail(String),

    /// Registry was rebound while the operation was in flight
    #[error("owner changed while the operation was in flight")]
    OwnerChanged,
}

impl GalleryError {
    /// Create transport error for a target
    pub fn transport(op: Operation, target: impl Into<String>, source: TransportError) -> Self {
        Self::Transport {
            op,
            target: target.into(),
            source,
        }
    }

    /// Check if error came from a collaborator call
    #[inline]
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Check if error should stay invisible to the user
    #[inline]
    #[must_use]
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::UserDeclined)
    }
}

impl From<ThumbnailError> for GalleryError {
    fn from(value: ThumbnailError) -> Self {
        Self::Thumbnail(value.0)
    }
}

/// Result type alias for gallery operations
pub type GalleryResult<T> = Result<T, GalleryError>;
