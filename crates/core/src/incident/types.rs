//! Incident record and batch types.

use serde::{Deserialize, Serialize};

/// Hard upper bound on the number of incidents in a batch.
pub const MAX_BATCH_SIZE: usize = 200;

/// A single incident as returned by the ticketing system.
///
/// Optional fields (`full_description`, `assignment_group`,
/// `configuration_item`) are empty strings when unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentRecord {
    /// Ticket number (e.g., "INC0010023").
    pub identifier: String,
    pub short_description: String,
    pub full_description: String,
    /// Display label of the incident state (e.g., "In Progress").
    pub state: String,
    /// Creation timestamp as reported by the source.
    pub created_on: String,
    pub assignment_group: String,
    pub configuration_item: String,
    pub priority: String,
    pub urgency: String,
    pub impact: String,
}

/// Ordered, bounded collection of incidents from one fetch.
///
/// Order is the source order and is preserved all the way into the prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncidentBatch {
    records: Vec<IncidentRecord>,
}

impl IncidentBatch {
    /// Create a batch, truncating to [`MAX_BATCH_SIZE`].
    pub fn new(records: Vec<IncidentRecord>) -> Self {
        Self::bounded(records, MAX_BATCH_SIZE).0
    }

    /// Create a batch holding at most `limit` records (never more than
    /// [`MAX_BATCH_SIZE`]).
    ///
    /// Returns the batch and the number of records dropped from the tail.
    pub fn bounded(mut records: Vec<IncidentRecord>, limit: usize) -> (Self, usize) {
        let limit = limit.min(MAX_BATCH_SIZE);
        let dropped = records.len().saturating_sub(limit);
        records.truncate(limit);
        (Self { records }, dropped)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[IncidentRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, IncidentRecord> {
        self.records.iter()
    }
}

impl<'a> IntoIterator for &'a IncidentBatch {
    type Item = &'a IncidentRecord;
    type IntoIter = std::slice::Iter<'a, IncidentRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
