//! Console output for interactive runs.

use std::path::Path;

use snowtriage_core::TriageReport;

const BANNER_WIDTH: usize = 80;

/// Summary block printed after a report is written.
pub fn report_summary(report: &TriageReport, location: &Path, include_body: bool) -> String {
    let rule = "=".repeat(BANNER_WIDTH);
    let mut out = String::new();
    out.push_str(&format!("\n{}\n", rule));
    out.push_str("SERVICENOW INCIDENT TRIAGE SUMMARY\n");
    out.push_str(&format!(
        "{} high-priority incidents analyzed by {}\n",
        report.source_incident_count, report.model
    ));
    out.push_str(&format!("{}\n", rule));
    if include_body {
        out.push_str(report.body.trim_end());
        out.push_str(&format!("\n{}\n", rule));
    }
    out.push_str(&format!("Report saved to: {}\n", location.display()));
    out
}

pub fn no_incidents() -> &'static str {
    "No high-priority incidents found. Nothing to triage."
}
