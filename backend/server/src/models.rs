//! Stored records, request payloads and response views.

use chrono::{DateTime, Utc};
use fund_allocation::{Donation, Funding, Project};
use serde::{Deserialize, Serialize};

/// A charity project row as stored in / read from the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProjectRecord {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub full_amount: i64,
    pub invested_amount: i64,
    pub fully_invested: bool,
    pub create_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_date: Option<DateTime<Utc>>,
}

impl From<ProjectRecord> for Project {
    fn from(row: ProjectRecord) -> Self {
        Project {
            id: row.id,
            name: row.name,
            description: row.description,
            funding: Funding {
                full_amount: row.full_amount,
                invested_amount: row.invested_amount,
                fully_invested: row.fully_invested,
                create_date: row.create_date,
                close_date: row.close_date,
            },
        }
    }
}

/// A donation row as stored in / read from the database.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct DonationRecord {
    pub id: i64,
    pub user_id: i64,
    pub comment: Option<String>,
    pub full_amount: i64,
    pub invested_amount: i64,
    pub fully_invested: bool,
    pub create_date: DateTime<Utc>,
    pub close_date: Option<DateTime<Utc>>,
}

impl From<DonationRecord> for Donation {
    fn from(row: DonationRecord) -> Self {
        Donation {
            id: row.id,
            owner_id: row.user_id,
            comment: row.comment,
            funding: Funding {
                full_amount: row.full_amount,
                invested_amount: row.invested_amount,
                fully_invested: row.fully_invested,
                create_date: row.create_date,
                close_date: row.close_date,
            },
        }
    }
}

// ─────────────────────────────────────────────────────────
// Request payloads
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectCreate {
    pub name: String,
    pub description: String,
    pub full_amount: i64,
}

/// Partial edit of an open project. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub full_amount: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DonationCreate {
    pub full_amount: i64,
    pub comment: Option<String>,
}

// ─────────────────────────────────────────────────────────
// Response views
// ─────────────────────────────────────────────────────────

/// What a contributor sees of their own donation.
#[derive(Debug, Clone, Serialize)]
pub struct DonationShort {
    pub id: i64,
    pub full_amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub create_date: DateTime<Utc>,
}

impl From<DonationRecord> for DonationShort {
    fn from(row: DonationRecord) -> Self {
        DonationShort {
            id: row.id,
            full_amount: row.full_amount,
            comment: row.comment,
            create_date: row.create_date,
        }
    }
}

/// Administrator view of a donation, including allocation progress.
#[derive(Debug, Clone, Serialize)]
pub struct DonationFull {
    #[serde(flatten)]
    pub short: DonationShort,
    pub user_id: i64,
    pub invested_amount: i64,
    pub fully_invested: bool,
}

impl From<DonationRecord> for DonationFull {
    fn from(row: DonationRecord) -> Self {
        DonationFull {
            user_id: row.user_id,
            invested_amount: row.invested_amount,
            fully_invested: row.fully_invested,
            short: row.into(),
        }
    }
}
