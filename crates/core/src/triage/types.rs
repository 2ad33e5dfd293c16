//! Types for the triage orchestrator.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::completion::CompletionError;
use crate::incident::FetchError;
use crate::report::{PersistError, TriageReport};

/// Stage of a triage run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Fetching,
    /// Source returned no incidents; nothing else runs.
    Skipped,
    Building,
    Completing,
    Persisting,
    Done,
    Failed(FailedStage),
}

impl RunStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Skipped | Self::Done | Self::Failed(_))
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetching => write!(f, "fetching"),
            Self::Skipped => write!(f, "skipped"),
            Self::Building => write!(f, "building"),
            Self::Completing => write!(f, "completing"),
            Self::Persisting => write!(f, "persisting"),
            Self::Done => write!(f, "done"),
            Self::Failed(stage) => write!(f, "failed during {}", stage),
        }
    }
}

/// The stage a run failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedStage {
    Fetch,
    Completion,
    Persist,
}

impl fmt::Display for FailedStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch => write!(f, "fetch"),
            Self::Completion => write!(f, "completion"),
            Self::Persist => write!(f, "persist"),
        }
    }
}

/// Successful end of a run.
#[derive(Debug, Clone)]
pub enum TriageOutcome {
    /// A report was written.
    Reported {
        report: TriageReport,
        location: PathBuf,
    },
    /// The source had nothing to triage.
    NoIncidents,
}

impl TriageOutcome {
    /// Process exit status for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Reported { .. } => 0,
            Self::NoIncidents => 2,
        }
    }
}

/// Stage-tagged failure of a run.
#[derive(Debug, Error)]
pub enum TriageError {
    #[error("Failed to fetch incidents: {0}")]
    Fetch(#[from] FetchError),

    #[error("Failed to generate summary: {0}")]
    Completion(#[from] CompletionError),

    #[error("Failed to save report: {0}")]
    Persist(#[from] PersistError),
}

impl TriageError {
    pub fn stage(&self) -> FailedStage {
        match self {
            Self::Fetch(_) => FailedStage::Fetch,
            Self::Completion(_) => FailedStage::Completion,
            Self::Persist(_) => FailedStage::Persist,
        }
    }

    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self.stage() {
            FailedStage::Fetch => 3,
            FailedStage::Completion => 4,
            FailedStage::Persist => 5,
        }
    }
}
