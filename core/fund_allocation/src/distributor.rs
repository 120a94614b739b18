//! Distributor: spends open donations, oldest first, up to what the
//! allocator placed into projects.

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::types::{Amount, Donation, Fundable, FundingChange};

/// Walk `donations` (already in arrival order) and consume `consumed` of them.
pub fn distribute(
    donations: &[Donation],
    consumed: Amount,
    now: DateTime<Utc>,
) -> Vec<FundingChange> {
    let mut cap = consumed;
    let mut changes = Vec::new();

    for donation in donations {
        if cap <= 0 {
            break;
        }

        let avail = donation.funding.remaining();
        if avail <= cap {
            changes.push(FundingChange::top_up(donation.id(), &donation.funding, avail, now));
            cap -= avail;
            trace!(donation = donation.id, spent = avail, cap, "donation exhausted");
        } else {
            changes.push(FundingChange::top_up(donation.id(), &donation.funding, cap, now));
            trace!(donation = donation.id, spent = cap, avail, "donation partially spent");
            break;
        }
    }

    changes
}
