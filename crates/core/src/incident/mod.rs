//! Incident sources.
//!
//! An [`IncidentSource`] produces one bounded [`IncidentBatch`] per run. The
//! ServiceNow implementation talks to a scripted REST endpoint; tests use
//! `testing::MockIncidentSource`.

mod categorize;
mod servicenow;
mod types;

pub use categorize::{categorize, CategoryBreakdown, IncidentCategory};
pub use servicenow::{parse_incident_response, IncidentResponse, ServiceNowSource};
pub use types::{IncidentBatch, IncidentRecord, MAX_BATCH_SIZE};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while fetching incidents.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Credentials rejected (401/403).
    #[error("Authentication failed with status {status}: check the ServiceNow credentials")]
    Auth { status: u16 },

    /// Request timed out.
    #[error("Request to ServiceNow timed out after {0:?}")]
    Timeout(Duration),

    /// Connection or transport failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success status other than an auth failure.
    #[error("HTTP error from ServiceNow: {status} - {message}")]
    Http { status: u16, message: String },

    /// Response body does not have the expected structure.
    #[error("Malformed response from ServiceNow: {0}")]
    Malformed(String),
}

/// Coarse classification of a [`FetchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Auth,
    Network,
    MalformedResponse,
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            Self::Auth { .. } => FetchErrorKind::Auth,
            Self::Timeout(_) | Self::Network(_) | Self::Http { .. } => FetchErrorKind::Network,
            Self::Malformed(_) => FetchErrorKind::MalformedResponse,
        }
    }
}

/// A source of incident records.
#[async_trait]
pub trait IncidentSource: Send + Sync {
    /// Source name for logging (e.g., "servicenow").
    fn name(&self) -> &str;

    /// Fetch the current batch of incidents.
    ///
    /// A response that does not match the expected structure is an error,
    /// never a partially built batch.
    async fn fetch(&self) -> Result<IncidentBatch, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_kinds() {
        assert_eq!(FetchError::Auth { status: 401 }.kind(), FetchErrorKind::Auth);
        assert_eq!(
            FetchError::Timeout(Duration::from_secs(30)).kind(),
            FetchErrorKind::Network
        );
        assert_eq!(
            FetchError::Network("connection refused".to_string()).kind(),
            FetchErrorKind::Network
        );
        assert_eq!(
            FetchError::Http {
                status: 404,
                message: "not found".to_string()
            }
            .kind(),
            FetchErrorKind::Network
        );
        assert_eq!(
            FetchError::Malformed("missing result".to_string()).kind(),
            FetchErrorKind::MalformedResponse
        );
    }
}
