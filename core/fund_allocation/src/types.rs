//! # Types
//!
//! Records read and written by the allocation engine.
//!
//! ## Design decisions
//!
//! ### Shared funding state
//!
//! Projects and donations carry the same five bookkeeping fields. They are
//! grouped in [`Funding`] so the aggregator, allocator and distributor can walk
//! either side through the [`Fundable`] trait without caring which one it is.
//!
//! ### Diffs, not mutation
//!
//! The engine never mutates a loaded record. Every touched record produces a
//! [`FundingChange`], and the whole set is handed to storage in one batch.
//! `previous_invested` and `full_amount` are the values the engine saw, so the
//! store can reject a change whose row moved underneath it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage identifier of a project or donation.
pub type RecordId = i64;

/// Money in indivisible minor units.
pub type Amount = i64;

/// Bookkeeping state shared by projects and donations.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Funding {
    /// Target (project) or gift size (donation). Always positive.
    pub full_amount: Amount,
    /// Amount already moved across. `0 ..= full_amount`.
    pub invested_amount: Amount,
    pub fully_invested: bool,
    pub create_date: DateTime<Utc>,
    /// Set exactly once, when the record becomes fully invested.
    pub close_date: Option<DateTime<Utc>>,
}

impl Funding {
    /// A fresh, open record with nothing invested.
    pub fn open(full_amount: Amount, create_date: DateTime<Utc>) -> Self {
        Self {
            full_amount,
            invested_amount: 0,
            fully_invested: false,
            create_date,
            close_date: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.close_date.is_none()
    }

    /// Unfilled need (project) or unspent value (donation).
    pub fn remaining(&self) -> Amount {
        self.full_amount - self.invested_amount
    }
}

/// A fundraising campaign with a target amount.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: RecordId,
    pub name: String,
    pub description: String,
    #[serde(flatten)]
    pub funding: Funding,
}

/// A contributor's gift awaiting allocation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Donation {
    pub id: RecordId,
    pub owner_id: i64,
    pub comment: Option<String>,
    #[serde(flatten)]
    pub funding: Funding,
}

/// Anything that takes part in an allocation pass.
pub trait Fundable {
    fn id(&self) -> RecordId;
    fn funding(&self) -> &Funding;

    /// FIFO key: oldest first, ties broken by id.
    fn arrival(&self) -> (DateTime<Utc>, RecordId) {
        (self.funding().create_date, self.id())
    }
}

impl Fundable for Project {
    fn id(&self) -> RecordId {
        self.id
    }

    fn funding(&self) -> &Funding {
        &self.funding
    }
}

impl Fundable for Donation {
    fn id(&self) -> RecordId {
        self.id
    }

    fn funding(&self) -> &Funding {
        &self.funding
    }
}

/// The new funding state of one record touched by a pass.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FundingChange {
    pub id: RecordId,
    /// `full_amount` as observed when the pass started.
    pub full_amount: Amount,
    /// `invested_amount` as observed when the pass started.
    pub previous_invested: Amount,
    pub invested_amount: Amount,
    /// `Some` when this pass closed the record.
    pub close_date: Option<DateTime<Utc>>,
}

impl FundingChange {
    /// Move `amount` into a record. Reaching `full_amount` closes it at `now`.
    pub fn top_up(id: RecordId, funding: &Funding, amount: Amount, now: DateTime<Utc>) -> Self {
        let invested_amount = funding.invested_amount + amount;
        Self {
            id,
            full_amount: funding.full_amount,
            previous_invested: funding.invested_amount,
            invested_amount,
            close_date: (invested_amount == funding.full_amount).then_some(now),
        }
    }

    pub fn fully_invested(&self) -> bool {
        self.invested_amount == self.full_amount
    }

    /// How much this pass moved into (or out of) the record.
    pub fn delta(&self) -> Amount {
        self.invested_amount - self.previous_invested
    }
}

/// Outstanding demand and supply across all open records.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    /// Σ unfilled need over open projects.
    pub demand: Amount,
    /// Σ unspent value over open donations.
    pub supply: Amount,
}

impl Totals {
    /// The amount a single pass can move: `min(demand, supply)`.
    pub fn consumable(&self) -> Amount {
        self.demand.min(self.supply)
    }
}
