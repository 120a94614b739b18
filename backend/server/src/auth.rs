//! Caller identity as forwarded by the fronting gateway.
//!
//! The gateway authenticates the user and passes the result in two trusted
//! headers: `x-user-id` (integer) and `x-user-role` (`admin` or `user`).

use axum::{async_trait, extract::FromRequestParts, http::request::Parts, http::HeaderMap};

use crate::errors::{AppError, Result};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: i64,
    pub is_admin: bool,
}

impl Caller {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self> {
        let user_id = headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
            .ok_or(AppError::Unauthorized)?;

        let is_admin = match headers.get(USER_ROLE_HEADER) {
            None => false,
            Some(role) => match role.to_str().map(str::trim) {
                Ok("admin") => true,
                Ok("user") => false,
                _ => return Err(AppError::Unauthorized),
            },
        };

        Ok(Caller { user_id, is_admin })
    }

    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        Caller::from_headers(&parts.headers)
    }
}

/// A caller holding the `admin` role; rejects everyone else with 403.
#[derive(Debug, Clone, Copy)]
pub struct Admin(pub Caller);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Admin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        let caller = Caller::from_headers(&parts.headers)?;
        caller.require_admin()?;
        Ok(Admin(caller))
    }
}
