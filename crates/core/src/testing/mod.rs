//! Testing utilities and mock implementations.
//!
//! Every seam of the triage pipeline has a mock here, so a full run can be
//! exercised without ServiceNow, Gemini, a real clock or the filesystem.
//!
//! # Example
//!
//! ```rust,ignore
//! use snowtriage_core::testing::{fixtures, MockIncidentSource, MockLlmClient};
//!
//! let source = MockIncidentSource::new();
//! source.set_incidents(fixtures::incident_batch(3)).await;
//!
//! let llm = MockLlmClient::new();
//! llm.push_error(LlmError::Api { status: 503, message: "UNAVAILABLE".into() }).await;
//! llm.push_text("## CRITICAL ISSUES REQUIRING IMMEDIATE ATTENTION").await;
//! ```

mod mock_incident_source;
mod mock_llm_client;
mod mock_report_sink;
mod mock_time;

pub use mock_incident_source::MockIncidentSource;
pub use mock_llm_client::MockLlmClient;
pub use mock_report_sink::MockReportSink;
pub use mock_time::{FixedClock, FixedJitter, RecordingSleeper};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::incident::{IncidentBatch, IncidentRecord};

    const DESCRIPTIONS: [&str; 6] = [
        "VPN tunnel down for remote office",
        "SAP payroll batch job failing",
        "Outlook cannot connect to Exchange",
        "Database server out of memory",
        "Expense application returns 500",
        "Badge reader offline at loading dock",
    ];

    /// Create an incident with reasonable defaults.
    pub fn incident(identifier: &str, short_description: &str) -> IncidentRecord {
        IncidentRecord {
            identifier: identifier.to_string(),
            short_description: short_description.to_string(),
            full_description: format!("{} reported by service desk.", short_description),
            state: "In Progress".to_string(),
            created_on: "2024-05-01 08:15:00".to_string(),
            assignment_group: "Service Desk".to_string(),
            configuration_item: String::new(),
            priority: "1 - Critical".to_string(),
            urgency: "1 - High".to_string(),
            impact: "1 - High".to_string(),
        }
    }

    /// Create `count` incidents numbered `INC001`, `INC002`, ...
    pub fn incidents(count: usize) -> Vec<IncidentRecord> {
        (0..count)
            .map(|i| {
                incident(
                    &format!("INC{:03}", i + 1),
                    DESCRIPTIONS[i % DESCRIPTIONS.len()],
                )
            })
            .collect()
    }

    /// A batch of [`incidents`].
    pub fn incident_batch(count: usize) -> IncidentBatch {
        IncidentBatch::new(incidents(count))
    }

    /// A ServiceNow response body for the given incidents.
    pub fn servicenow_body(records: &[IncidentRecord]) -> serde_json::Value {
        let result: Vec<serde_json::Value> = records
            .iter()
            .map(|record| {
                serde_json::json!({
                    "number": record.identifier,
                    "short_description": record.short_description,
                    "description": record.full_description,
                    "state": record.state,
                    "sys_created_on": record.created_on,
                    "assignment_group": record.assignment_group,
                    "cmdb_ci": record.configuration_item,
                    "priority": record.priority,
                    "urgency": record.urgency,
                    "impact": record.impact,
                })
            })
            .collect();
        serde_json::json!({
            "result": result,
            "count": records.len(),
            "timestamp": "2024-05-01 09:00:00",
        })
    }
}
