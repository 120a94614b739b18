//! Allocator: fills open projects, oldest first, from the pooled supply.
//!
//! Earlier projects have absolute priority. Each one is either closed in
//! full or, when the pool runs dry, left as the single partially funded
//! "frontier" project; nothing after the frontier is touched.

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::types::{Amount, Fundable, FundingChange, Project, Totals};

/// Outcome of one allocator pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProjectFill {
    pub changes: Vec<FundingChange>,
    /// `min(demand, supply)`, recomputed from the totals.
    pub consumed: Amount,
}

/// Walk `projects` (already in arrival order) and fund them from `totals.supply`.
pub fn allocate(projects: &[Project], totals: Totals, now: DateTime<Utc>) -> ProjectFill {
    let mut pool = totals.supply;
    let mut remaining_need = totals.demand;
    let mut changes = Vec::new();

    for project in projects {
        if pool <= 0 || remaining_need <= 0 {
            break;
        }

        let need = project.funding.remaining();
        if need <= pool {
            changes.push(FundingChange::top_up(project.id(), &project.funding, need, now));
            pool -= need;
            remaining_need -= need;
            trace!(project = project.id, need, pool, "project fully funded");
        } else {
            // The pool is spent on the frontier project; the pass ends here.
            changes.push(FundingChange::top_up(project.id(), &project.funding, pool, now));
            trace!(project = project.id, funded = pool, need, "frontier project");
            break;
        }
    }

    ProjectFill {
        changes,
        // The running counters stop early on a partial fill, so they are not
        // the authoritative amount moved.
        consumed: totals.consumable(),
    }
}
