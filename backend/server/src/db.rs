//! Database layer for the ledger store. Migrations, record queries and the
//! compare-and-set batch write used by the allocation engine.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fund_allocation::{Allocation, FundingChange};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};
use tracing::info;

use crate::config::Config;
use crate::errors::{AppError, Result};
use crate::models::{DonationCreate, DonationRecord, ProjectCreate, ProjectRecord};

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(config: &Config) -> Result<SqlitePool> {
    let url = if config.database_url.starts_with("sqlite:") {
        config.database_url.clone()
    } else {
        format!("sqlite:{}", config.database_url)
    };

    let options = SqliteConnectOptions::from_str(&url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(config.db_busy_timeout_secs));

    let pool = SqlitePoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

/// Single-connection in-memory database for tests.
#[cfg(test)]
pub async fn memory_pool() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

// ─────────────────────────────────────────────────────────
// Projects
// ─────────────────────────────────────────────────────────

/// Insert a new, open, unfunded project and return its id.
pub async fn insert_project(
    conn: &mut SqliteConnection,
    project: &ProjectCreate,
    now: DateTime<Utc>,
) -> Result<i64> {
    let id = sqlx::query(
        r#"
        INSERT INTO charity_project
            (name, description, full_amount, invested_amount, fully_invested, create_date)
        VALUES (?1, ?2, ?3, 0, FALSE, ?4)
        "#,
    )
    .bind(&project.name)
    .bind(&project.description)
    .bind(project.full_amount)
    .bind(now)
    .execute(conn)
    .await?
    .last_insert_rowid();
    Ok(id)
}

pub async fn get_project<'e, E: SqliteExecutor<'e>>(
    executor: E,
    id: i64,
) -> Result<Option<ProjectRecord>> {
    let row = sqlx::query_as::<_, ProjectRecord>(
        r#"
        SELECT id, name, description, full_amount, invested_amount, fully_invested,
               create_date, close_date
        FROM   charity_project
        WHERE  id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;
    Ok(row)
}

pub async fn find_project_by_name<'e, E: SqliteExecutor<'e>>(
    executor: E,
    name: &str,
) -> Result<Option<ProjectRecord>> {
    let row = sqlx::query_as::<_, ProjectRecord>(
        r#"
        SELECT id, name, description, full_amount, invested_amount, fully_invested,
               create_date, close_date
        FROM   charity_project
        WHERE  name = ?1
        "#,
    )
    .bind(name)
    .fetch_optional(executor)
    .await?;
    Ok(row)
}

/// Fetch all projects, ordered by id ascending.
pub async fn list_projects<'e, E: SqliteExecutor<'e>>(executor: E) -> Result<Vec<ProjectRecord>> {
    let rows = sqlx::query_as::<_, ProjectRecord>(
        r#"
        SELECT id, name, description, full_amount, invested_amount, fully_invested,
               create_date, close_date
        FROM   charity_project
        ORDER  BY id ASC
        "#,
    )
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

/// Fetch open projects in arrival order.
pub async fn list_open_projects<'e, E: SqliteExecutor<'e>>(
    executor: E,
) -> Result<Vec<ProjectRecord>> {
    let rows = sqlx::query_as::<_, ProjectRecord>(
        r#"
        SELECT id, name, description, full_amount, invested_amount, fully_invested,
               create_date, close_date
        FROM   charity_project
        WHERE  close_date IS NULL
        ORDER  BY create_date ASC, id ASC
        "#,
    )
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

/// Fetch closed projects for reporting.
pub async fn list_closed_projects<'e, E: SqliteExecutor<'e>>(
    executor: E,
) -> Result<Vec<ProjectRecord>> {
    let rows = sqlx::query_as::<_, ProjectRecord>(
        r#"
        SELECT id, name, description, full_amount, invested_amount, fully_invested,
               create_date, close_date
        FROM   charity_project
        WHERE  close_date IS NOT NULL
        "#,
    )
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

/// Overwrite the editable fields of an open project.
pub async fn update_project_details(
    conn: &mut SqliteConnection,
    project: &ProjectRecord,
) -> Result<()> {
    let affected = sqlx::query(
        r#"
        UPDATE charity_project
        SET    name = ?1, description = ?2, full_amount = ?3
        WHERE  id = ?4 AND close_date IS NULL AND invested_amount <= ?3
        "#,
    )
    .bind(&project.name)
    .bind(&project.description)
    .bind(project.full_amount)
    .bind(project.id)
    .execute(conn)
    .await?
    .rows_affected();

    if affected != 1 {
        return Err(AppError::Conflict(format!(
            "project {} changed while being edited",
            project.id
        )));
    }
    Ok(())
}

/// Close an open project whose target now equals what it already holds.
pub async fn mark_project_funded(
    conn: &mut SqliteConnection,
    id: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE charity_project
        SET    fully_invested = TRUE, close_date = ?2
        WHERE  id = ?1 AND close_date IS NULL AND invested_amount = full_amount
        "#,
    )
    .bind(id)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(())
}

/// Stop a project from taking part in allocation. An already set
/// `close_date` is left untouched.
pub async fn close_project(conn: &mut SqliteConnection, id: i64, now: DateTime<Utc>) -> Result<()> {
    sqlx::query("UPDATE charity_project SET close_date = ?2 WHERE id = ?1 AND close_date IS NULL")
        .bind(id)
        .bind(now)
        .execute(conn)
        .await?;
    Ok(())
}

/// Delete a project that never received funds.
pub async fn delete_project(conn: &mut SqliteConnection, id: i64) -> Result<()> {
    let affected = sqlx::query("DELETE FROM charity_project WHERE id = ?1 AND invested_amount = 0")
        .bind(id)
        .execute(conn)
        .await?
        .rows_affected();

    if affected != 1 {
        return Err(AppError::Conflict(format!(
            "project {id} changed while being deleted"
        )));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────
// Donations
// ─────────────────────────────────────────────────────────

/// Insert a new, open, unspent donation and return its id.
pub async fn insert_donation(
    conn: &mut SqliteConnection,
    user_id: i64,
    donation: &DonationCreate,
    now: DateTime<Utc>,
) -> Result<i64> {
    let id = sqlx::query(
        r#"
        INSERT INTO donation
            (user_id, comment, full_amount, invested_amount, fully_invested, create_date)
        VALUES (?1, ?2, ?3, 0, FALSE, ?4)
        "#,
    )
    .bind(user_id)
    .bind(&donation.comment)
    .bind(donation.full_amount)
    .bind(now)
    .execute(conn)
    .await?
    .last_insert_rowid();
    Ok(id)
}

pub async fn get_donation<'e, E: SqliteExecutor<'e>>(
    executor: E,
    id: i64,
) -> Result<Option<DonationRecord>> {
    let row = sqlx::query_as::<_, DonationRecord>(
        r#"
        SELECT id, user_id, comment, full_amount, invested_amount, fully_invested,
               create_date, close_date
        FROM   donation
        WHERE  id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;
    Ok(row)
}

/// Fetch all donations, optionally only those of one contributor.
pub async fn list_donations<'e, E: SqliteExecutor<'e>>(
    executor: E,
    user_id: Option<i64>,
) -> Result<Vec<DonationRecord>> {
    let rows = sqlx::query_as::<_, DonationRecord>(
        r#"
        SELECT id, user_id, comment, full_amount, invested_amount, fully_invested,
               create_date, close_date
        FROM   donation
        WHERE  ?1 IS NULL OR user_id = ?1
        ORDER  BY id ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

/// Fetch open donations in arrival order.
pub async fn list_open_donations<'e, E: SqliteExecutor<'e>>(
    executor: E,
) -> Result<Vec<DonationRecord>> {
    let rows = sqlx::query_as::<_, DonationRecord>(
        r#"
        SELECT id, user_id, comment, full_amount, invested_amount, fully_invested,
               create_date, close_date
        FROM   donation
        WHERE  close_date IS NULL
        ORDER  BY create_date ASC, id ASC
        "#,
    )
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

// ─────────────────────────────────────────────────────────
// Allocation batch
// ─────────────────────────────────────────────────────────

/// Write every diff of an allocation pass.
///
/// Each row is only updated if it still holds the values the pass saw;
/// otherwise the batch is abandoned with [`AppError::Conflict`]. Callers run
/// this inside a transaction so a conflict leaves nothing behind.
pub async fn apply_allocation(conn: &mut SqliteConnection, allocation: &Allocation) -> Result<()> {
    for change in &allocation.projects {
        apply_change(&mut *conn, "charity_project", change).await?;
    }
    for change in &allocation.donations {
        apply_change(&mut *conn, "donation", change).await?;
    }
    Ok(())
}

async fn apply_change(
    conn: &mut SqliteConnection,
    table: &'static str,
    change: &FundingChange,
) -> Result<()> {
    let sql = format!(
        r#"
        UPDATE {table}
        SET    invested_amount = ?1, fully_invested = ?2, close_date = ?3
        WHERE  id = ?4 AND invested_amount = ?5 AND full_amount = ?6 AND close_date IS NULL
        "#
    );
    let affected = sqlx::query(&sql)
        .bind(change.invested_amount)
        .bind(change.fully_invested())
        .bind(change.close_date)
        .bind(change.id)
        .bind(change.previous_invested)
        .bind(change.full_amount)
        .execute(conn)
        .await?
        .rows_affected();

    if affected != 1 {
        return Err(AppError::Conflict(format!(
            "{table} {} changed during allocation",
            change.id
        )));
    }
    Ok(())
}
