//! Report persistence.

mod fs_sink;
mod types;

pub use fs_sink::FsReportSink;
pub use types::{missing_sections, TriageReport, REPORT_TITLE};

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while persisting a report.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Failed to create the report directory.
    #[error("Failed to create report directory: {path}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write the temporary report file.
    #[error("Failed to write report file: {path}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to hard-link the finished report to its final name.
    #[error("Failed to link report into place (filesystem must support hard links): {path}")]
    LinkFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Every candidate name for this timestamp is already taken.
    #[error("No free report name for {stem} after {attempts} candidates")]
    NameExhausted { stem: String, attempts: u32 },
}

/// Coarse classification of a [`PersistError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistErrorKind {
    Io,
}

impl PersistError {
    pub fn kind(&self) -> PersistErrorKind {
        PersistErrorKind::Io
    }
}

/// Destination for finished reports.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Sink name for logging (e.g., "filesystem").
    fn name(&self) -> &str;

    /// Persist the report, returning where it was written.
    ///
    /// Never overwrites an earlier report and leaves nothing behind on failure.
    async fn persist(&self, report: &TriageReport) -> Result<PathBuf, PersistError>;
}
