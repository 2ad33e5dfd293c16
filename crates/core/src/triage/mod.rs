//! Triage run orchestration.
//!
//! The [`TriageOrchestrator`] drives one run through
//! `Fetching -> (Skipped | Building -> Completing -> Persisting -> Done)`,
//! with `Failed(stage)` reachable from any stage.

mod context;
mod runner;
mod types;

pub use context::{Clock, RunContext, SystemClock};
pub use runner::{StageCallback, TriageOrchestrator};
pub use types::{FailedStage, RunStage, TriageError, TriageOutcome};
