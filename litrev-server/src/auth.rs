//! Caller identity and project access checks
//!
//! Authentication happens upstream; the proxy forwards the authenticated
//! user id in `X-User-Id`. Project-scoped resources are invisible (404) to
//! non-members, and members without the needed flag get 403.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{Member, Permission};

pub const USER_ID_HEADER: &str = "x-user-id";
const MAX_USER_ID_LEN: usize = 200;

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

impl CurrentUser {
    pub fn id(&self) -> &str {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("Missing X-User-Id header".to_string()))?;

        let user_id = value
            .to_str()
            .map(str::trim)
            .map_err(|_| ApiError::Unauthorized("X-User-Id is not valid text".to_string()))?;

        if user_id.is_empty() || user_id.chars().count() > MAX_USER_ID_LEN {
            return Err(ApiError::Unauthorized("X-User-Id is empty or too long".to_string()));
        }

        Ok(CurrentUser(user_id.to_string()))
    }
}

/// Membership of the caller, 404 when not a member
pub async fn require_member(pool: &SqlitePool, project_id: Uuid, user: &CurrentUser) -> ApiResult<Member> {
    db::members::get_member(pool, project_id, user.id())
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Project {}", project_id)))
}

/// Membership carrying `permission`, 403 when the flag is missing
pub async fn require_permission(
    pool: &SqlitePool,
    project_id: Uuid,
    user: &CurrentUser,
    permission: Permission,
) -> ApiResult<Member> {
    let member = require_member(pool, project_id, user).await?;
    if !member.permissions.allows(permission) {
        return Err(ApiError::Forbidden(format!(
            "Role '{}' lacks {}",
            member.role_name, permission
        )));
    }
    Ok(member)
}
