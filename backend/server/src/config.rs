//! Application configuration loaded from environment variables.

use std::str::FromStr;

use crate::errors::{AppError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database URL or file path
    pub database_url: String,
    /// Port for the REST API server
    pub api_port: u16,
    /// Size of the SQLite connection pool
    pub db_max_connections: u32,
    /// How long a writer waits on a locked database before giving up
    pub db_busy_timeout_secs: u64,
    /// Attempts per request when an allocation run loses a concurrent update
    pub allocation_max_attempts: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Config {
            database_url: env_var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./charity.db".to_string()),
            api_port: parse_var("API_PORT", "3001")?,
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", "5")?,
            db_busy_timeout_secs: parse_var("DB_BUSY_TIMEOUT_SECS", "5")?,
            allocation_max_attempts: parse_var("ALLOCATION_MAX_ATTEMPTS", "3")?,
        };

        if config.allocation_max_attempts == 0 {
            return Err(AppError::Config(
                "ALLOCATION_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        if config.db_max_connections == 0 {
            return Err(AppError::Config(
                "DB_MAX_CONNECTIONS must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| AppError::Config(format!("Missing env var: {key}")))
}

fn parse_var<T: FromStr>(key: &str, default: &str) -> Result<T> {
    env_var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| AppError::Config(format!("Invalid {key}")))
}
