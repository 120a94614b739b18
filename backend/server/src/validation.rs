//! Request checks run before anything reaches the allocation engine.

use sqlx::SqliteExecutor;

use crate::db;
use crate::errors::{AppError, Result};
use crate::models::{DonationCreate, ProjectCreate, ProjectRecord, ProjectUpdate};

pub const NAME_MAX_CHARS: usize = 100;

pub fn check_name(name: &str) -> Result<()> {
    let chars = name.chars().count();
    if name.trim().is_empty() || chars > NAME_MAX_CHARS {
        return Err(AppError::Validation(format!(
            "Project name must be 1 to {NAME_MAX_CHARS} characters long"
        )));
    }
    Ok(())
}

pub fn check_description(description: &str) -> Result<()> {
    if description.trim().is_empty() {
        return Err(AppError::Validation(
            "Project description must not be empty".to_string(),
        ));
    }
    Ok(())
}

pub fn check_amount(full_amount: i64) -> Result<()> {
    if full_amount <= 0 {
        return Err(AppError::Validation(format!(
            "Amount must be positive, got {full_amount}"
        )));
    }
    Ok(())
}

pub fn check_new_project(project: &ProjectCreate) -> Result<()> {
    check_name(&project.name)?;
    check_description(&project.description)?;
    check_amount(project.full_amount)
}

pub fn check_new_donation(donation: &DonationCreate) -> Result<()> {
    check_amount(donation.full_amount)
}

/// Validate an edit against the stored project. Name uniqueness is checked
/// separately since it needs the database.
pub fn check_update(project: &ProjectRecord, update: &ProjectUpdate) -> Result<()> {
    if project.close_date.is_some() || project.fully_invested {
        return Err(AppError::Validation(
            "A closed project cannot be edited".to_string(),
        ));
    }
    if let Some(name) = &update.name {
        check_name(name)?;
    }
    if let Some(description) = &update.description {
        check_description(description)?;
    }
    if let Some(full_amount) = update.full_amount {
        check_amount(full_amount)?;
        if full_amount < project.invested_amount {
            return Err(AppError::Validation(format!(
                "New target {full_amount} is below the {} already invested",
                project.invested_amount
            )));
        }
    }
    Ok(())
}

/// Reject `name` if another project already uses it.
pub async fn ensure_name_free<'e, E: SqliteExecutor<'e>>(executor: E, name: &str) -> Result<()> {
    if db::find_project_by_name(executor, name).await?.is_some() {
        return Err(duplicate_name(name));
    }
    Ok(())
}

pub fn duplicate_name(name: &str) -> AppError {
    AppError::Validation(format!("A project named {name:?} already exists"))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn stored(invested_amount: i64, closed: bool) -> ProjectRecord {
        let created = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        ProjectRecord {
            id: 1,
            name: "Library".into(),
            description: "books".into(),
            full_amount: 1_000,
            invested_amount,
            fully_invested: closed,
            create_date: created,
            close_date: closed.then_some(created),
        }
    }

    #[test]
    fn name_length_limits() {
        assert!(check_name("a").is_ok());
        assert!(check_name(&"я".repeat(NAME_MAX_CHARS)).is_ok());
        assert!(check_name(&"x".repeat(NAME_MAX_CHARS + 1)).is_err());
        assert!(check_name("   ").is_err());
    }

    #[test]
    fn new_project_needs_description_and_positive_target() {
        let mut project = ProjectCreate {
            name: "Library".into(),
            description: String::new(),
            full_amount: 10,
        };
        assert!(check_new_project(&project).is_err());
        project.description = "books".into();
        assert!(check_new_project(&project).is_ok());
        project.full_amount = 0;
        assert!(check_new_project(&project).is_err());
    }

    #[test]
    fn donation_amount_must_be_positive() {
        let donation = DonationCreate {
            full_amount: -5,
            comment: None,
        };
        assert!(check_new_donation(&donation).is_err());
    }

    #[test]
    fn closed_project_cannot_be_edited() {
        let update = ProjectUpdate {
            description: Some("more books".into()),
            ..Default::default()
        };
        assert!(matches!(
            check_update(&stored(1_000, true), &update),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn target_cannot_drop_below_invested() {
        let project = stored(400, false);
        let shrink = |full_amount| ProjectUpdate {
            full_amount: Some(full_amount),
            ..Default::default()
        };
        assert!(check_update(&project, &shrink(399)).is_err());
        assert!(check_update(&project, &shrink(400)).is_ok());
        assert!(check_update(&project, &shrink(5_000)).is_ok());
    }
}
