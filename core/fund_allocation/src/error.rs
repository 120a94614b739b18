//! Error types for the allocation engine.

use thiserror::Error;

use crate::types::RecordId;

/// Result type for allocation operations.
pub type Result<T> = std::result::Result<T, AllocationError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AllocationError {
    /// A loaded record already breaks a funding invariant.
    #[error("Record {kind} {id} is inconsistent: {reason}")]
    InvalidRecord {
        kind: &'static str,
        id: RecordId,
        reason: String,
    },

    /// A closed record was handed to a pass that only accepts open ones.
    #[error("Record {kind} {id} is closed and cannot take part in allocation")]
    ClosedRecord { kind: &'static str, id: RecordId },

    /// Summing outstanding amounts left the `i64` range.
    #[error("Amount overflow while totalling open {0}")]
    Overflow(&'static str),

    /// Money in and money out of a pass disagree.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}
