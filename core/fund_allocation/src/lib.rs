//! # Fund allocation engine
//!
//! Routes open donations into open charity projects. Whenever money arrives
//! or a project is created, the surrounding service loads every open record
//! and calls [`plan`], which runs three stages in order:
//!
//! | Stage        | Module            | Produces                                   |
//! |--------------|-------------------|--------------------------------------------|
//! | Aggregator   | [`aggregator`]    | `demand` and `supply` ([`Totals`])          |
//! | Allocator    | [`allocator`]     | project diffs, `consumed = min(demand, supply)` |
//! | Distributor  | [`distributor`]   | donation diffs summing to `consumed`       |
//!
//! Both sides are consumed strictly first-in first-out. Only aggregate
//! invested amounts are tracked; which donation paid for which project is
//! deliberately not recorded.
//!
//! The crate does no I/O. The caller owns the storage handle, applies the
//! returned [`FundingChange`]s as one atomic batch and retries the whole pass
//! on a concurrent-update conflict.
//!
//! ## Invariants
//!
//! - `0 <= invested_amount <= full_amount` on every record.
//! - `fully_invested` holds exactly when `invested_amount == full_amount`, and
//!   exactly then `close_date` is set; closed records never change again.
//! - Per pass, Σ project increase == Σ donation increase == `min(demand, supply)`.

pub mod aggregator;
pub mod allocator;
pub mod distributor;
pub mod engine;
pub mod error;
pub mod invariants;
pub mod types;

#[cfg(test)]
mod test_allocation;

pub use engine::{plan, Allocation};
pub use error::{AllocationError, Result};
pub use types::{Amount, Donation, Fundable, Funding, FundingChange, Project, RecordId, Totals};
