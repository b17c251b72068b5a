//! Upload, replace, delete and reconciliation pipelines
//!
//! Each pipeline is an `impl Gallery` block. Every public entry point catches
//! its own failures: it logs them, shows a notice and hands the host a typed
//! outcome. Nothing is retried automatically.

mod delete;
mod reconcile;
mod replace;
mod upload;

use crate::error::GalleryError;

/// Outcome of one file in an upload batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    /// Original file name
    pub file: String,
    /// Slot the file was bound to, or why it was not
    pub result: Result<usize, GalleryError>,
}

/// Outcome of an upload batch, in file order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    /// Per-file outcomes
    pub outcomes: Vec<FileOutcome>,
    /// Files beyond the slot count that were not processed
    pub ignored: usize,
}

impl UploadReport {
    /// Number of files bound to a slot
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    /// Number of files that failed
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Slots filled by the batch
    pub fn filled_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok().copied())
    }
}
