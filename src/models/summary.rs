//! Per-record results and per-run aggregates.

use serde::Serialize;

use super::user::UserRecord;

/// Outcome of resolving one record.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    pub record: UserRecord,
    pub success: bool,
}

impl BatchResult {
    pub fn ok(record: UserRecord) -> Self {
        Self {
            record,
            success: true,
        }
    }

    pub fn failed(record: UserRecord) -> Self {
        Self {
            record,
            success: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpsertSummary {
    pub success_count: usize,
    pub failed_records: Vec<UserRecord>,
    /// Chunks dispatched, each awaited in full
    pub chunks: usize,
    /// Set when the run stopped before its last chunk
    pub cancelled: bool,
}

impl UpsertSummary {
    pub fn failure_count(&self) -> usize {
        self.failed_records.len()
    }
}

/// Result of one deletion. `Unknown` only exists between a DELETE timeout
/// and the compensating read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    Failed(String),
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteSummary {
    pub deleted: usize,
    pub failed: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum PasswordOutcome {
    Updated,
    NotFound,
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PasswordSummary {
    pub updated: usize,
    pub not_found: usize,
    pub failed: usize,
    pub cancelled: bool,
}

impl PasswordSummary {
    pub fn record(&mut self, outcome: &PasswordOutcome) {
        match outcome {
            PasswordOutcome::Updated => self.updated += 1,
            PasswordOutcome::NotFound => self.not_found += 1,
            PasswordOutcome::Failed(_) => self.failed += 1,
        }
    }
}
