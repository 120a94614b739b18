//! Allocation engine runner: loads the open ledger inside the caller's
//! transaction, plans a pass and writes the diffs back.
//!
//! Runs are synchronous with the request that triggered them. Mutual
//! exclusion between concurrent runs is optimistic: the batch write only
//! matches rows that still hold the values the plan was computed from, and
//! [`with_conflict_retry`] replays a losing attempt against a fresh snapshot.

use std::future::Future;

use chrono::{DateTime, Utc};
use fund_allocation::{Allocation, Donation, Project};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{info, warn};

use crate::db;
use crate::errors::Result;

/// What one committed-or-not run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub demand: i64,
    pub supply: i64,
    pub consumed: i64,
    pub projects_touched: usize,
    pub projects_closed: usize,
    pub donations_touched: usize,
    pub donations_closed: usize,
}

impl From<&Allocation> for RunSummary {
    fn from(allocation: &Allocation) -> Self {
        RunSummary {
            demand: allocation.totals.demand,
            supply: allocation.totals.supply,
            consumed: allocation.consumed,
            projects_touched: allocation.projects.len(),
            projects_closed: allocation.closed_projects(),
            donations_touched: allocation.donations.len(),
            donations_closed: allocation.closed_donations(),
        }
    }
}

/// Run one allocation pass on `conn`, which must be inside a transaction.
///
/// Nothing is committed here; the caller commits together with whatever
/// record triggered the run.
pub async fn run(conn: &mut SqliteConnection, now: DateTime<Utc>) -> Result<RunSummary> {
    let projects: Vec<Project> = db::list_open_projects(&mut *conn)
        .await?
        .into_iter()
        .map(Project::from)
        .collect();
    let donations: Vec<Donation> = db::list_open_donations(&mut *conn)
        .await?
        .into_iter()
        .map(Donation::from)
        .collect();

    let allocation = fund_allocation::plan(projects, donations, now)?;
    let summary = RunSummary::from(&allocation);

    if allocation.is_empty() {
        return Ok(summary);
    }

    db::apply_allocation(conn, &allocation).await?;
    info!(
        demand = summary.demand,
        supply = summary.supply,
        consumed = summary.consumed,
        projects_closed = summary.projects_closed,
        donations_closed = summary.donations_closed,
        "Allocated {} across {} projects and {} donations",
        summary.consumed,
        summary.projects_touched,
        summary.donations_touched
    );
    Ok(summary)
}

/// Run `attempt` until it succeeds, fails for a non-conflict reason, or
/// `max_attempts` conflicts have been seen.
///
/// Each attempt must open and commit its own transaction so that a replay
/// starts from a fresh snapshot.
pub async fn with_conflict_retry<T, F, Fut>(max_attempts: u32, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut tries = 0;
    loop {
        tries += 1;
        match attempt().await {
            Err(e) if e.is_conflict() && tries < max_attempts => {
                warn!("Allocation attempt {tries}/{max_attempts} lost a concurrent update, retrying: {e}");
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::errors::AppError;
    use crate::models::{DonationCreate, ProjectCreate};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 8, 0, 0).unwrap()
    }

    fn project(name: &str, full_amount: i64) -> ProjectCreate {
        ProjectCreate {
            name: name.to_string(),
            description: "shelter".to_string(),
            full_amount,
        }
    }

    fn donation(full_amount: i64) -> DonationCreate {
        DonationCreate {
            full_amount,
            comment: None,
        }
    }

    #[tokio::test]
    async fn run_moves_surplus_into_open_projects() {
        let pool = db::memory_pool().await.unwrap();
        let mut tx = pool.begin().await.unwrap();
        let p1 = db::insert_project(&mut tx, &project("first", 100), t0()).await.unwrap();
        let p2 = db::insert_project(&mut tx, &project("second", 50), t0() + Duration::seconds(1))
            .await
            .unwrap();
        let d = db::insert_donation(&mut tx, 1, &donation(120), t0() + Duration::seconds(2))
            .await
            .unwrap();

        let summary = run(&mut tx, t0() + Duration::minutes(1)).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(summary.consumed, 120);
        assert_eq!(summary.projects_closed, 1);
        let p1 = db::get_project(&pool, p1).await.unwrap().unwrap();
        let p2 = db::get_project(&pool, p2).await.unwrap().unwrap();
        let d = db::get_donation(&pool, d).await.unwrap().unwrap();
        assert_eq!((p1.invested_amount, p1.fully_invested), (100, true));
        assert_eq!(p1.close_date, Some(t0() + Duration::minutes(1)));
        assert_eq!((p2.invested_amount, p2.fully_invested), (20, false));
        assert!(p2.close_date.is_none());
        assert_eq!((d.invested_amount, d.fully_invested), (120, true));
    }

    #[tokio::test]
    async fn rerun_without_new_records_changes_nothing() {
        let pool = db::memory_pool().await.unwrap();
        let mut tx = pool.begin().await.unwrap();
        db::insert_project(&mut tx, &project("only", 30), t0()).await.unwrap();
        db::insert_donation(&mut tx, 1, &donation(10), t0()).await.unwrap();
        run(&mut tx, t0()).await.unwrap();
        tx.commit().await.unwrap();

        let before = db::list_projects(&pool).await.unwrap();
        let mut tx = pool.begin().await.unwrap();
        let summary = run(&mut tx, t0() + Duration::hours(1)).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(summary.consumed, 0);
        assert_eq!(summary.projects_touched + summary.donations_touched, 0);
        assert_eq!(db::list_projects(&pool).await.unwrap(), before);
    }

    #[tokio::test]
    async fn stale_plan_is_rejected_as_conflict() {
        let pool = db::memory_pool().await.unwrap();
        let mut tx = pool.begin().await.unwrap();
        db::insert_project(&mut tx, &project("target", 100), t0()).await.unwrap();
        db::insert_donation(&mut tx, 1, &donation(40), t0()).await.unwrap();

        // Plan against the current snapshot, then let another writer move the
        // same donation before the plan is written.
        let projects = db::list_open_projects(&mut *tx).await.unwrap();
        let donations = db::list_open_donations(&mut *tx).await.unwrap();
        let stale = fund_allocation::plan(
            projects.into_iter().map(Project::from).collect(),
            donations.into_iter().map(Donation::from).collect(),
            t0(),
        )
        .unwrap();
        run(&mut tx, t0()).await.unwrap();

        let err = db::apply_allocation(&mut tx, &stale).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn retry_replays_conflicts_then_gives_up() {
        let calls = &AtomicU32::new(0);
        let result: Result<()> = with_conflict_retry(3, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::Conflict("busy".into()))
        })
        .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_returns_first_success() {
        let calls = &AtomicU32::new(0);
        let result = with_conflict_retry(5, move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(AppError::Conflict("lost race".into()))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retry_does_not_replay_other_failures() {
        let calls = &AtomicU32::new(0);
        let result: Result<()> = with_conflict_retry(5, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::Validation("bad".into()))
        })
        .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
