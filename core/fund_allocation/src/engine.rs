//! Pure orchestration of one allocation pass.
//!
//! Aggregator, Allocator and Distributor run strictly in sequence over an
//! in-memory snapshot. The result is a set of diffs; nothing is written here.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::aggregator::aggregate;
use crate::allocator::allocate;
use crate::distributor::distribute;
use crate::error::Result;
use crate::invariants::{check_change, check_conservation, check_open_record};
use crate::types::{Amount, Donation, Fundable, FundingChange, Project, Totals};

/// Everything one pass decided.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Allocation {
    /// Demand and supply before the pass.
    pub totals: Totals,
    /// Amount moved from donations into projects.
    pub consumed: Amount,
    pub projects: Vec<FundingChange>,
    pub donations: Vec<FundingChange>,
}

impl Allocation {
    fn idle(totals: Totals) -> Self {
        Self {
            totals,
            ..Self::default()
        }
    }

    /// True when the pass moved no money and touched no record.
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty() && self.donations.is_empty()
    }

    pub fn closed_projects(&self) -> usize {
        self.projects.iter().filter(|c| c.fully_invested()).count()
    }

    pub fn closed_donations(&self) -> usize {
        self.donations.iter().filter(|c| c.fully_invested()).count()
    }
}

/// Plan one allocation pass over the open `projects` and `donations`.
///
/// Records may arrive in any order; they are walked oldest first by
/// `(create_date, id)`. Every input must be open and consistent, otherwise
/// the pass is refused. `now` becomes the `close_date` of everything the
/// pass closes.
pub fn plan(
    mut projects: Vec<Project>,
    mut donations: Vec<Donation>,
    now: DateTime<Utc>,
) -> Result<Allocation> {
    for project in &projects {
        check_open_record("project", project)?;
    }
    for donation in &donations {
        check_open_record("donation", donation)?;
    }

    projects.sort_by_key(|p| p.arrival());
    donations.sort_by_key(|d| d.arrival());

    let totals = aggregate(&projects, &donations)?;
    if totals.demand == 0 || totals.supply == 0 {
        debug!(
            demand = totals.demand,
            supply = totals.supply,
            "nothing to allocate"
        );
        return Ok(Allocation::idle(totals));
    }

    let fill = allocate(&projects, totals, now);
    let donation_changes = distribute(&donations, fill.consumed, now);

    for change in &fill.changes {
        check_change("project", change)?;
    }
    for change in &donation_changes {
        check_change("donation", change)?;
    }
    check_conservation(fill.consumed, &fill.changes, &donation_changes)?;

    let allocation = Allocation {
        totals,
        consumed: fill.consumed,
        projects: fill.changes,
        donations: donation_changes,
    };
    debug!(
        demand = totals.demand,
        supply = totals.supply,
        consumed = allocation.consumed,
        projects_touched = allocation.projects.len(),
        donations_touched = allocation.donations.len(),
        "allocation planned"
    );
    Ok(allocation)
}
