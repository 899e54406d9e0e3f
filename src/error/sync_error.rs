//! Run-level error type.

use thiserror::Error;

use super::category::ErrorCategory;
use super::network::NetworkError;
use crate::events::Pipeline;

/// Errors that stop a run or a single API call.
///
/// Per-record failures inside a run never surface as `SyncError`; they are
/// counted in the run summary and reported on the event stream. Only the
/// pre-flight variants (`Validation`, `InvalidBatchSize`, `Precondition`,
/// `Busy`) and export page failures abort a run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Pre-flight validation found records that cannot be submitted.
    #[error("{invalid} record(s) failed validation; nothing was sent")]
    Validation { invalid: usize },

    /// Batch sizes are restricted to 1, 2, 5 or 10.
    #[error("unsupported batch size {0} (expected 1, 2, 5 or 10)")]
    InvalidBatchSize(usize),

    /// A run was refused before it started.
    #[error("cannot start: {0}")]
    Precondition(String),

    /// Another run of the same pipeline is still active.
    #[error("{0} pipeline is already running")]
    Busy(Pipeline),

    /// A request failed after the transport exhausted its attempts.
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// A create collided with an existing username and could not be resolved.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A delete timed out and the compensating read could not confirm it.
    #[error("delete outcome unknown: {0}")]
    TimeoutAmbiguity(String),

    /// A response body did not have the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// Settings are missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Classify the error for handling decisions.
    pub fn category(&self) -> ErrorCategory {
        match self {
            SyncError::Validation { .. } | SyncError::InvalidBatchSize(_) => ErrorCategory::User,
            SyncError::Precondition(_) | SyncError::Busy(_) => ErrorCategory::User,
            SyncError::Network(err) => err.category(),
            SyncError::Conflict(_) => ErrorCategory::Client,
            SyncError::TimeoutAmbiguity(_) => ErrorCategory::Network,
            SyncError::Decode(_) => ErrorCategory::Server,
            SyncError::Config(_) => ErrorCategory::Configuration,
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Decode(err.to_string())
    }
}
