//! Role and membership endpoints
//!
//! Every change is checked so the project keeps at least one member able to
//! manage members (`LAST_MANAGER` otherwise).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use super::{deleted, ApiJson};
use crate::auth::{require_member, require_permission, CurrentUser};
use crate::db;
use crate::error::{ok, ApiError, ApiResult, Success};
use crate::models::{require_text, Member, Permission, Permissions, Role};
use crate::AppState;

const MAX_ROLE_NAME_LEN: usize = 100;
const MAX_USER_ID_LEN: usize = 200;

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    #[serde(flatten)]
    pub permissions: Permissions,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateRoleRequest {
    pub name: Option<String>,
    pub can_manage_project: Option<bool>,
    pub can_manage_members: Option<bool>,
    pub can_manage_phases: Option<bool>,
    pub can_manage_articles: Option<bool>,
    pub can_run_ai_jobs: Option<bool>,
    pub can_write_notes: Option<bool>,
}

impl UpdateRoleRequest {
    fn apply(&self, permissions: &mut Permissions) {
        let flags = [
            (self.can_manage_project, &mut permissions.can_manage_project),
            (self.can_manage_members, &mut permissions.can_manage_members),
            (self.can_manage_phases, &mut permissions.can_manage_phases),
            (self.can_manage_articles, &mut permissions.can_manage_articles),
            (self.can_run_ai_jobs, &mut permissions.can_run_ai_jobs),
            (self.can_write_notes, &mut permissions.can_write_notes),
        ];
        for (requested, flag) in flags {
            if let Some(value) = requested {
                *flag = value;
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: String,
    pub role_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMemberRequest {
    pub role_id: Uuid,
}

async fn load_role(pool: &SqlitePool, project_id: Uuid, role_id: Uuid) -> ApiResult<Role> {
    db::roles::get_role(pool, project_id, role_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Role {}", role_id)))
}

async fn ensure_other_manager(pool: &SqlitePool, project_id: Uuid, except_user: Option<&str>, except_role: Option<Uuid>) -> ApiResult<()> {
    if db::members::count_managers_excluding(pool, project_id, except_user, except_role).await? == 0 {
        return Err(ApiError::LastManager(
            "The project must keep at least one member who can manage members".to_string(),
        ));
    }
    Ok(())
}

/// GET /api/projects/:project_id/roles
pub async fn list_roles(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Success<Vec<Role>>>> {
    require_member(&state.db, project_id, &user).await?;
    Ok(ok(db::roles::list_roles(&state.db, project_id).await?))
}

/// POST /api/projects/:project_id/roles
pub async fn create_role(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<Uuid>,
    ApiJson(request): ApiJson<CreateRoleRequest>,
) -> ApiResult<(StatusCode, Json<Success<Role>>)> {
    require_permission(&state.db, project_id, &user, Permission::ManageMembers).await?;
    let name = require_text("name", &request.name, MAX_ROLE_NAME_LEN).map_err(ApiError::BadRequest)?;

    let role = db::roles::create_role(&state.db, project_id, &name, request.permissions)
        .await
        .map_err(|e| match e {
            e if e.is_unique_violation() => ApiError::Conflict(format!("Role '{}' already exists", name)),
            e => e.into(),
        })?;
    Ok((StatusCode::CREATED, ok(role)))
}

/// PATCH /api/projects/:project_id/roles/:role_id
pub async fn update_role(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project_id, role_id)): Path<(Uuid, Uuid)>,
    ApiJson(request): ApiJson<UpdateRoleRequest>,
) -> ApiResult<Json<Success<Role>>> {
    require_permission(&state.db, project_id, &user, Permission::ManageMembers).await?;
    let mut role = load_role(&state.db, project_id, role_id).await?;

    if let Some(name) = &request.name {
        role.name = require_text("name", name, MAX_ROLE_NAME_LEN).map_err(ApiError::BadRequest)?;
    }
    let was_manager = role.permissions.can_manage_members;
    request.apply(&mut role.permissions);

    if was_manager
        && !role.permissions.can_manage_members
        && db::roles::count_members_with_role(&state.db, role.id).await? > 0
    {
        ensure_other_manager(&state.db, project_id, None, Some(role.id)).await?;
    }

    db::roles::update_role(&state.db, &role).await.map_err(|e| match e {
        e if e.is_unique_violation() => ApiError::Conflict(format!("Role '{}' already exists", role.name)),
        e => e.into(),
    })?;
    info!(role_id = %role.id, "Updated role");
    Ok(ok(role))
}

/// DELETE /api/projects/:project_id/roles/:role_id
pub async fn delete_role(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project_id, role_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Success<Value>>> {
    require_permission(&state.db, project_id, &user, Permission::ManageMembers).await?;
    let role = load_role(&state.db, project_id, role_id).await?;

    let assigned = db::roles::count_members_with_role(&state.db, role.id).await?;
    if assigned > 0 {
        return Err(ApiError::Conflict(format!(
            "Role '{}' is assigned to {} member(s)",
            role.name, assigned
        )));
    }

    db::roles::delete_role(&state.db, role.id).await?;
    Ok(ok(deleted()))
}

/// GET /api/projects/:project_id/members
pub async fn list_members(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Success<Vec<Member>>>> {
    require_member(&state.db, project_id, &user).await?;
    Ok(ok(db::members::list_members(&state.db, project_id).await?))
}

/// POST /api/projects/:project_id/members
pub async fn add_member(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<Uuid>,
    ApiJson(request): ApiJson<AddMemberRequest>,
) -> ApiResult<(StatusCode, Json<Success<Member>>)> {
    require_permission(&state.db, project_id, &user, Permission::ManageMembers).await?;
    let user_id = require_text("user_id", &request.user_id, MAX_USER_ID_LEN)
        .map_err(ApiError::BadRequest)?;
    let role = db::roles::get_role(&state.db, project_id, request.role_id)
        .await?
        .ok_or_else(|| ApiError::BadRequest(format!("Role {} does not belong to this project", request.role_id)))?;

    if db::members::get_member(&state.db, project_id, &user_id).await?.is_some() {
        return Err(ApiError::Conflict(format!("{} is already a member", user_id)));
    }

    let member = db::members::add_member(&state.db, project_id, &user_id, role.id).await?;
    info!(project_id = %project_id, member = %user_id, role = %role.name, "Added member");
    Ok((StatusCode::CREATED, ok(member)))
}

async fn load_member(pool: &SqlitePool, project_id: Uuid, user_id: &str) -> ApiResult<Member> {
    db::members::get_member(pool, project_id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Member {}", user_id)))
}

/// PATCH /api/projects/:project_id/members/:user_id
pub async fn update_member(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project_id, member_id)): Path<(Uuid, String)>,
    ApiJson(request): ApiJson<UpdateMemberRequest>,
) -> ApiResult<Json<Success<Member>>> {
    require_permission(&state.db, project_id, &user, Permission::ManageMembers).await?;
    let member = load_member(&state.db, project_id, &member_id).await?;
    let role = db::roles::get_role(&state.db, project_id, request.role_id)
        .await?
        .ok_or_else(|| ApiError::BadRequest(format!("Role {} does not belong to this project", request.role_id)))?;

    if member.permissions.can_manage_members && !role.permissions.can_manage_members {
        ensure_other_manager(&state.db, project_id, Some(&member.user_id), None).await?;
    }

    db::members::update_member_role(&state.db, project_id, &member.user_id, role.id).await?;
    Ok(ok(load_member(&state.db, project_id, &member.user_id).await?))
}

/// DELETE /api/projects/:project_id/members/:user_id
pub async fn remove_member(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project_id, member_id)): Path<(Uuid, String)>,
) -> ApiResult<Json<Success<Value>>> {
    require_permission(&state.db, project_id, &user, Permission::ManageMembers).await?;
    let member = load_member(&state.db, project_id, &member_id).await?;

    if member.permissions.can_manage_members {
        ensure_other_manager(&state.db, project_id, Some(&member.user_id), None).await?;
    }

    db::members::remove_member(&state.db, project_id, &member.user_id).await?;
    info!(project_id = %project_id, member = %member.user_id, "Removed member");
    Ok(ok(deleted()))
}

pub fn member_routes() -> Router<AppState> {
    Router::new()
        .route("/api/projects/:project_id/roles", get(list_roles).post(create_role))
        .route(
            "/api/projects/:project_id/roles/:role_id",
            patch(update_role).delete(delete_role),
        )
        .route("/api/projects/:project_id/members", get(list_members).post(add_member))
        .route(
            "/api/projects/:project_id/members/:user_id",
            patch(update_member).delete(remove_member),
        )
}
