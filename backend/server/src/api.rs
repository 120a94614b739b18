//! Axum REST API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use serde::Serialize;
use tracing::info;

use crate::auth::{Admin, Caller};
use crate::errors::Result;
use crate::models::{DonationCreate, DonationFull, DonationShort, ProjectCreate, ProjectUpdate};
use crate::service::Ledger;

#[derive(Clone)]
pub struct ApiState {
    pub ledger: Ledger,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/charity_project", get(list_projects).post(create_project))
        .route("/charity_project/report", get(project_report))
        .route(
            "/charity_project/:project_id",
            patch(update_project).delete(delete_project),
        )
        .route("/donation", get(list_donations).post(create_donation))
        .route("/donation/my", get(my_donations))
        .with_state(state)
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /charity_project`: administrators only.
///
/// The new project is funded from surplus donations before it is returned.
pub async fn create_project(
    State(state): State<Arc<ApiState>>,
    Admin(admin): Admin,
    Json(payload): Json<ProjectCreate>,
) -> Result<impl IntoResponse> {
    info!(admin = admin.user_id, "Creating project {:?}", payload.name);
    let project = state.ledger.create_project(payload).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// `GET /charity_project`: open to everyone.
pub async fn list_projects(State(state): State<Arc<ApiState>>) -> Result<impl IntoResponse> {
    Ok(Json(state.ledger.list_projects().await?))
}

/// `PATCH /charity_project/:project_id`: administrators only.
pub async fn update_project(
    State(state): State<Arc<ApiState>>,
    Admin(admin): Admin,
    Path(project_id): Path<i64>,
    Json(payload): Json<ProjectUpdate>,
) -> Result<impl IntoResponse> {
    info!(admin = admin.user_id, "Editing project {project_id}");
    Ok(Json(state.ledger.update_project(project_id, payload).await?))
}

/// `DELETE /charity_project/:project_id`: administrators only.
pub async fn delete_project(
    State(state): State<Arc<ApiState>>,
    Admin(admin): Admin,
    Path(project_id): Path<i64>,
) -> Result<impl IntoResponse> {
    info!(admin = admin.user_id, "Deleting project {project_id}");
    Ok(Json(state.ledger.delete_project(project_id).await?))
}

/// `GET /charity_project/report`: administrators only.
///
/// Closed projects ordered by how quickly they were funded.
pub async fn project_report(
    State(state): State<Arc<ApiState>>,
    _admin: Admin,
) -> Result<impl IntoResponse> {
    Ok(Json(state.ledger.report().await?))
}

/// `POST /donation`: any identified user.
///
/// The donation is spent on open projects before it is returned.
pub async fn create_donation(
    State(state): State<Arc<ApiState>>,
    caller: Caller,
    Json(payload): Json<DonationCreate>,
) -> Result<impl IntoResponse> {
    let donation = state.ledger.create_donation(caller.user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(DonationShort::from(donation))))
}

/// `GET /donation`: administrators only; full allocation details.
pub async fn list_donations(
    State(state): State<Arc<ApiState>>,
    _admin: Admin,
) -> Result<impl IntoResponse> {
    let donations: Vec<DonationFull> = state
        .ledger
        .list_donations(None)
        .await?
        .into_iter()
        .map(DonationFull::from)
        .collect();
    Ok(Json(donations))
}

/// `GET /donation/my`: the caller's own donations.
pub async fn my_donations(
    State(state): State<Arc<ApiState>>,
    caller: Caller,
) -> Result<impl IntoResponse> {
    let donations: Vec<DonationShort> = state
        .ledger
        .list_donations(Some(caller.user_id))
        .await?
        .into_iter()
        .map(DonationShort::from)
        .collect();
    Ok(Json(donations))
}
