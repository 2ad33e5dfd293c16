//! Triage report value and its Markdown rendering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::prompt::REPORT_SECTIONS;

/// Title line of every rendered report.
pub const REPORT_TITLE: &str = "# ServiceNow Incident Triage Report";

/// The persisted result of one successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageReport {
    /// Raw model output.
    pub body: String,
    /// When the report was persisted.
    pub generated_at: DateTime<Utc>,
    /// Number of incidents the prompt was built from.
    pub source_incident_count: usize,
    /// Model that produced the body.
    pub model: String,
}

impl TriageReport {
    pub fn new(
        body: impl Into<String>,
        generated_at: DateTime<Utc>,
        source_incident_count: usize,
        model: impl Into<String>,
    ) -> Self {
        Self {
            body: body.into(),
            generated_at,
            source_incident_count,
            model: model.into(),
        }
    }

    /// Render the report as a Markdown document.
    pub fn to_markdown(&self) -> String {
        let mut doc = String::new();
        doc.push_str(REPORT_TITLE);
        doc.push('\n');
        doc.push_str(&format!(
            "**Generated:** {}\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        doc.push_str(&format!(
            "**Total High-Priority Incidents:** {}\n",
            self.source_incident_count
        ));
        doc.push_str(&format!("**Model:** {}\n\n", self.model));
        doc.push_str("---\n\n");
        doc.push_str(self.body.trim_end());
        doc.push('\n');
        doc
    }

    /// Base file name, without collision suffix or extension.
    pub fn file_stem(&self) -> String {
        format!("triage_report_{}", self.generated_at.format("%Y%m%d_%H%M%S"))
    }

    /// Expected section headings that do not appear in the body.
    pub fn missing_sections(&self) -> Vec<&'static str> {
        missing_sections(&self.body)
    }
}

/// Expected section headings that do not appear in `body`.
///
/// Matching ignores case and leading `#` depth, so `### Critical issues
/// requiring immediate attention` counts as present.
pub fn missing_sections(body: &str) -> Vec<&'static str> {
    let headings: Vec<String> = body
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('#'))
        .map(|line| line.trim_start_matches('#').trim().to_lowercase())
        .collect();

    REPORT_SECTIONS
        .iter()
        .copied()
        .filter(|section| {
            let wanted = section.trim_start_matches('#').trim().to_lowercase();
            !headings.iter().any(|heading| heading.starts_with(&wanted))
        })
        .collect()
}
