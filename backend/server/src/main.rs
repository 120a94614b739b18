//! Charity fund service entry point.
//!
//! Records charity projects and donations in SQLite and, whenever either is
//! created, runs the fund-allocation engine in the same transaction so that
//! surplus donations flow into open projects oldest first. Exposes a small
//! Axum REST API for administrators and contributors.

mod api;
mod auth;
mod config;
mod db;
mod engine;
mod errors;
mod models;
mod report;
mod service;
mod validation;

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use service::Ledger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Set up the SQLite connection pool and run migrations.
    let pool = db::init_pool(&config).await?;

    let state = Arc::new(api::ApiState {
        ledger: Ledger::new(pool, config.allocation_max_attempts),
    });

    let app = api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
