//! Ledger operations behind the REST API.
//!
//! Every write that can move money creates its record and runs the
//! allocation engine in the same transaction, so either both are committed
//! or neither is. Attempts that lose a concurrent update are replayed.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::db;
use crate::engine::{self, with_conflict_retry};
use crate::errors::{AppError, Result};
use crate::models::{
    DonationCreate, DonationRecord, ProjectCreate, ProjectRecord, ProjectUpdate,
};
use crate::report::{self, Report};
use crate::validation;

#[derive(Clone)]
pub struct Ledger {
    pub pool: SqlitePool,
    pub max_attempts: u32,
}

impl Ledger {
    pub fn new(pool: SqlitePool, max_attempts: u32) -> Self {
        Self { pool, max_attempts }
    }

    // ─────────────────────────────────────────────────────
    // Projects
    // ─────────────────────────────────────────────────────

    /// Create a project and immediately fund it from any surplus donations.
    pub async fn create_project(&self, input: ProjectCreate) -> Result<ProjectRecord> {
        validation::check_new_project(&input)?;
        let input = &input;
        with_conflict_retry(self.max_attempts, move || self.create_project_once(input)).await
    }

    async fn create_project_once(&self, input: &ProjectCreate) -> Result<ProjectRecord> {
        let mut tx = self.pool.begin().await?;
        validation::ensure_name_free(&mut *tx, &input.name).await?;

        let now = Utc::now();
        let id = db::insert_project(&mut tx, input, now)
            .await
            .map_err(|e| name_taken(e, &input.name))?;
        let summary = engine::run(&mut tx, now).await?;

        let project = db::get_project(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Project {id} not found")))?;
        tx.commit().await?;

        info!(
            "Project {id} {:?} created, {} of {} funded on arrival",
            project.name, summary.consumed, project.full_amount
        );
        Ok(project)
    }

    pub async fn list_projects(&self) -> Result<Vec<ProjectRecord>> {
        db::list_projects(&self.pool).await
    }

    /// Edit an open project. Lowering the target to exactly the invested
    /// amount closes the project.
    pub async fn update_project(&self, id: i64, update: ProjectUpdate) -> Result<ProjectRecord> {
        let update = &update;
        with_conflict_retry(self.max_attempts, move || self.update_project_once(id, update)).await
    }

    async fn update_project_once(&self, id: i64, update: &ProjectUpdate) -> Result<ProjectRecord> {
        let mut tx = self.pool.begin().await?;
        let current = db::get_project(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Project {id} not found")))?;
        validation::check_update(&current, update)?;

        let mut edited = current.clone();
        if let Some(name) = &update.name {
            if *name != current.name {
                validation::ensure_name_free(&mut *tx, name).await?;
                edited.name = name.clone();
            }
        }
        if let Some(description) = &update.description {
            edited.description = description.clone();
        }
        if let Some(full_amount) = update.full_amount {
            edited.full_amount = full_amount;
        }
        if edited == current {
            return Ok(current);
        }

        db::update_project_details(&mut tx, &edited)
            .await
            .map_err(|e| name_taken(e, &edited.name))?;

        // An open project means there is no idle supply, so a new target
        // needs no allocation pass; only an exact match has to be closed.
        if edited.full_amount == edited.invested_amount {
            db::mark_project_funded(&mut tx, id, Utc::now()).await?;
        }

        let project = db::get_project(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Project {id} not found")))?;
        tx.commit().await?;
        info!("Project {id} updated");
        Ok(project)
    }

    /// Delete a project that never received money.
    ///
    /// A funded project is closed instead (if still open) and the delete is
    /// refused; the closing is committed even though the request fails.
    pub async fn delete_project(&self, id: i64) -> Result<ProjectRecord> {
        let mut tx = self.pool.begin().await?;
        let project = db::get_project(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Project {id} not found")))?;

        if project.invested_amount > 0 {
            if project.close_date.is_none() {
                db::close_project(&mut tx, id, Utc::now()).await?;
                tx.commit().await?;
                warn!(
                    "Project {id} holds {} invested; closed instead of deleted",
                    project.invested_amount
                );
            }
            return Err(AppError::Validation(
                "Funds were already invested in this project; it cannot be deleted".to_string(),
            ));
        }

        db::delete_project(&mut tx, id).await?;
        tx.commit().await?;
        info!("Project {id} {:?} deleted", project.name);
        Ok(project)
    }

    pub async fn report(&self) -> Result<Report> {
        let closed = db::list_closed_projects(&self.pool).await?;
        Ok(report::build(closed))
    }

    // ─────────────────────────────────────────────────────
    // Donations
    // ─────────────────────────────────────────────────────

    /// Record a donation and immediately spend it on open projects.
    pub async fn create_donation(&self, user_id: i64, input: DonationCreate) -> Result<DonationRecord> {
        validation::check_new_donation(&input)?;
        let input = &input;
        with_conflict_retry(self.max_attempts, move || {
            self.create_donation_once(user_id, input)
        })
        .await
    }

    async fn create_donation_once(
        &self,
        user_id: i64,
        input: &DonationCreate,
    ) -> Result<DonationRecord> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let id = db::insert_donation(&mut tx, user_id, input, now).await?;
        let summary = engine::run(&mut tx, now).await?;

        let donation = db::get_donation(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Donation {id} not found")))?;
        tx.commit().await?;

        info!(
            "Donation {id} of {} from user {user_id} recorded, {} allocated",
            donation.full_amount, summary.consumed
        );
        Ok(donation)
    }

    /// All donations, or only those of `user_id`.
    pub async fn list_donations(&self, user_id: Option<i64>) -> Result<Vec<DonationRecord>> {
        db::list_donations(&self.pool, user_id).await
    }
}

/// A unique-constraint hit on insert/update means another request took the
/// name after our check.
fn name_taken(err: AppError, name: &str) -> AppError {
    if let AppError::Database(sqlx::Error::Database(db)) = &err {
        if db.is_unique_violation() {
            return validation::duplicate_name(name);
        }
    }
    err
}
