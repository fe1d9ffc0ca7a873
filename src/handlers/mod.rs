// src/handlers/mod.rs
pub mod driver_handler;
pub mod ride_handler;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::{errors::KestrelError, models::user::UserRole};

/// Caller identity, set by the upstream auth gateway. Authentication itself
/// is out of scope here; we only read the verified headers it forwards.
pub struct Identity {
    pub user_id: String,
    pub role: UserRole,
}

impl Identity {
    pub fn require_role(&self, role: UserRole) -> Result<(), KestrelError> {
        if self.role == role || self.role == UserRole::Admin {
            Ok(())
        } else {
            Err(KestrelError::forbidden(format!(
                "This endpoint requires the {:?} role",
                role
            )))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = KestrelError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                KestrelError::Unauthorized("Missing x-user-id header".to_string())
            })?;

        let role = parts
            .headers
            .get("x-user-role")
            .and_then(|v| v.to_str().ok())
            .and_then(UserRole::parse)
            .ok_or_else(|| {
                KestrelError::Unauthorized("Missing or invalid x-user-role header".to_string())
            })?;

        Ok(Self { user_id, role })
    }
}
