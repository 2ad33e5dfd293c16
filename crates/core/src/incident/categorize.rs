//! Keyword pre-classification of incidents.
//!
//! A cheap first pass over short descriptions, used as a hint in the prompt
//! and for run logging. First matching category wins; matching is plain
//! case-insensitive substring search.

use super::types::{IncidentBatch, IncidentRecord};

/// Keyword category of an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IncidentCategory {
    Sap,
    Network,
    Email,
    Hardware,
    Software,
    Other,
}

impl IncidentCategory {
    /// All categories in matching order.
    pub const ALL: [IncidentCategory; 6] = [
        Self::Sap,
        Self::Network,
        Self::Email,
        Self::Hardware,
        Self::Software,
        Self::Other,
    ];

    fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::Sap => &["sap"],
            Self::Network => &["network", "wireless", "vpn", "dns"],
            Self::Email => &["email", "exchange", "outlook"],
            Self::Hardware => &["server", "hardware", "memory", "laptop"],
            Self::Software => &["software", "application", "app"],
            Self::Other => &[],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Sap => "SAP issues",
            Self::Network => "network issues",
            Self::Email => "email issues",
            Self::Hardware => "hardware issues",
            Self::Software => "software issues",
            Self::Other => "other issues",
        }
    }

    /// Classify a single incident by its short description.
    pub fn of(record: &IncidentRecord) -> Self {
        let description = record.short_description.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|category| {
                category
                    .keywords()
                    .iter()
                    .any(|keyword| description.contains(keyword))
            })
            .unwrap_or(Self::Other)
    }
}

/// Incident identifiers grouped by category, in [`IncidentCategory::ALL`]
/// order. Empty categories are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryBreakdown {
    groups: Vec<(IncidentCategory, Vec<String>)>,
}

impl CategoryBreakdown {
    pub fn groups(&self) -> &[(IncidentCategory, Vec<String>)] {
        &self.groups
    }

    pub fn count(&self, category: IncidentCategory) -> usize {
        self.groups
            .iter()
            .find(|(c, _)| *c == category)
            .map_or(0, |(_, ids)| ids.len())
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Group a batch by keyword category.
pub fn categorize(batch: &IncidentBatch) -> CategoryBreakdown {
    let groups = IncidentCategory::ALL
        .into_iter()
        .filter_map(|category| {
            let ids: Vec<String> = batch
                .iter()
                .filter(|record| IncidentCategory::of(record) == category)
                .map(|record| record.identifier.clone())
                .collect();
            (!ids.is_empty()).then_some((category, ids))
        })
        .collect();

    CategoryBreakdown { groups }
}
