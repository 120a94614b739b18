//! Funding invariants checked on every record entering or leaving a pass.
//!
//! - `0 <= invested_amount <= full_amount`, `full_amount > 0`.
//! - `fully_invested == (invested_amount == full_amount)`.
//! - `close_date` is set exactly when the record is fully invested.
//! - What projects absorb in a pass equals what donations give up, and both
//!   equal `min(demand, supply)`.

use crate::error::{AllocationError, Result};
use crate::types::{Amount, Fundable, FundingChange};

/// Reject a record that cannot be allocated: closed, or internally inconsistent.
pub fn check_open_record<T: Fundable>(kind: &'static str, record: &T) -> Result<()> {
    let funding = record.funding();
    let invalid = |reason: String| AllocationError::InvalidRecord {
        kind,
        id: record.id(),
        reason,
    };

    if !funding.is_open() {
        return Err(AllocationError::ClosedRecord {
            kind,
            id: record.id(),
        });
    }
    if funding.full_amount <= 0 {
        return Err(invalid(format!(
            "non-positive full_amount ({})",
            funding.full_amount
        )));
    }
    if funding.invested_amount < 0 || funding.invested_amount > funding.full_amount {
        return Err(invalid(format!(
            "invested_amount {} outside 0..={}",
            funding.invested_amount, funding.full_amount
        )));
    }
    if funding.fully_invested || funding.invested_amount == funding.full_amount {
        return Err(invalid("open record is already fully invested".to_string()));
    }
    Ok(())
}

/// Check the state a change leaves behind.
pub fn check_change(kind: &'static str, change: &FundingChange) -> Result<()> {
    let invalid = |reason: String| AllocationError::InvalidRecord {
        kind,
        id: change.id,
        reason,
    };

    if change.invested_amount > change.full_amount {
        return Err(invalid(format!(
            "invested_amount {} exceeds full_amount {}",
            change.invested_amount, change.full_amount
        )));
    }
    if change.delta() <= 0 {
        return Err(invalid(format!(
            "change does not move money ({} -> {})",
            change.previous_invested, change.invested_amount
        )));
    }
    if change.fully_invested() != change.close_date.is_some() {
        return Err(invalid(
            "close_date must be set exactly when fully invested".to_string(),
        ));
    }
    Ok(())
}

/// Money moved into projects must equal money moved out of donations, and
/// both must equal `consumed`.
pub fn check_conservation(
    consumed: Amount,
    projects: &[FundingChange],
    donations: &[FundingChange],
) -> Result<()> {
    let absorbed: Amount = projects.iter().map(FundingChange::delta).sum();
    let spent: Amount = donations.iter().map(FundingChange::delta).sum();

    if absorbed != consumed || spent != consumed {
        return Err(AllocationError::InvariantViolation(format!(
            "projects absorbed {absorbed}, donations spent {spent}, expected {consumed}"
        )));
    }
    Ok(())
}
