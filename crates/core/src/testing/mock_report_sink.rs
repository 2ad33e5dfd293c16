//! Mock report sink for testing.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::report::{PersistError, ReportSink, TriageReport};

/// Mock implementation of the ReportSink trait.
///
/// Keeps persisted reports in memory and returns a path under
/// `mock-reports/` without touching the filesystem.
#[derive(Debug, Default)]
pub struct MockReportSink {
    reports: Arc<RwLock<Vec<TriageReport>>>,
    next_error: Arc<RwLock<Option<PersistError>>>,
}

impl MockReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the next persist to fail with the given error.
    pub async fn set_next_error(&self, error: PersistError) {
        *self.next_error.write().await = Some(error);
    }

    /// Reports persisted so far.
    pub async fn recorded_reports(&self) -> Vec<TriageReport> {
        self.reports.read().await.clone()
    }

    /// Number of successful persists.
    pub async fn persist_count(&self) -> usize {
        self.reports.read().await.len()
    }
}

#[async_trait]
impl ReportSink for MockReportSink {
    fn name(&self) -> &str {
        "mock"
    }

    async fn persist(&self, report: &TriageReport) -> Result<PathBuf, PersistError> {
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        self.reports.write().await.push(report.clone());
        Ok(PathBuf::from("mock-reports").join(format!("{}.md", report.file_stem())))
    }
}
