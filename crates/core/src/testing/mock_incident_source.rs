//! Mock incident source for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::incident::{FetchError, IncidentBatch, IncidentSource};

/// Mock implementation of the IncidentSource trait.
///
/// Returns the configured batch (empty by default) on every fetch, unless an
/// error is queued with [`set_next_error`](Self::set_next_error).
#[derive(Debug, Default)]
pub struct MockIncidentSource {
    incidents: Arc<RwLock<IncidentBatch>>,
    next_error: Arc<RwLock<Option<FetchError>>>,
    fetch_count: Arc<RwLock<usize>>,
}

impl MockIncidentSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the batch returned by subsequent fetches.
    pub async fn set_incidents(&self, batch: IncidentBatch) {
        *self.incidents.write().await = batch;
    }

    /// Configure the next fetch to fail with the given error.
    pub async fn set_next_error(&self, error: FetchError) {
        *self.next_error.write().await = Some(error);
    }

    /// Number of fetches performed.
    pub async fn fetch_count(&self) -> usize {
        *self.fetch_count.read().await
    }
}

#[async_trait]
impl IncidentSource for MockIncidentSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(&self) -> Result<IncidentBatch, FetchError> {
        *self.fetch_count.write().await += 1;

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        Ok(self.incidents.read().await.clone())
    }
}
