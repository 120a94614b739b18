//! Aggregator: outstanding demand and supply over the open records.

use crate::error::{AllocationError, Result};
use crate::types::{Amount, Donation, Fundable, Project, Totals};

/// Sum the unfilled need of `projects` and the unspent value of `donations`.
///
/// Only open records should be passed in; closed ones contribute nothing
/// anyway since their remaining amount is zero.
pub fn aggregate(projects: &[Project], donations: &[Donation]) -> Result<Totals> {
    Ok(Totals {
        demand: outstanding(projects, "projects")?,
        supply: outstanding(donations, "donations")?,
    })
}

fn outstanding<T: Fundable>(records: &[T], what: &'static str) -> Result<Amount> {
    records
        .iter()
        .filter(|r| r.funding().is_open())
        .try_fold(0 as Amount, |acc, r| {
            acc.checked_add(r.funding().remaining())
                .ok_or(AllocationError::Overflow(what))
        })
}
