//! Project endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::{deleted, ApiJson};
use crate::auth::{require_member, require_permission, CurrentUser};
use crate::db;
use crate::error::{ok, ApiError, ApiResult, Success};
use crate::models::{optional_text, require_text, Permission, Project, ProjectSummary};
use crate::AppState;

pub const MAX_PROJECT_NAME_LEN: usize = 200;
pub const MAX_PROJECT_DESCRIPTION_LEN: usize = 2000;

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProjectRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// GET /api/projects
pub async fn list_projects(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<Success<Vec<ProjectSummary>>>> {
    Ok(ok(db::projects::list_projects_for_user(&state.db, user.id()).await?))
}

/// POST /api/projects
pub async fn create_project(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<Success<Project>>)> {
    let name = require_text("name", &request.name, MAX_PROJECT_NAME_LEN).map_err(ApiError::BadRequest)?;
    let description = optional_text("description", request.description.as_deref(), MAX_PROJECT_DESCRIPTION_LEN)
        .map_err(ApiError::BadRequest)?
        .unwrap_or_default();

    let project = db::projects::create_project(&state.db, &name, &description, user.id()).await?;
    Ok((StatusCode::CREATED, ok(project)))
}

async fn load_project(state: &AppState, project_id: Uuid) -> ApiResult<Project> {
    db::projects::get_project(&state.db, project_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Project {}", project_id)))
}

/// GET /api/projects/:project_id
pub async fn get_project(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Success<Project>>> {
    require_member(&state.db, project_id, &user).await?;
    Ok(ok(load_project(&state, project_id).await?))
}

/// PATCH /api/projects/:project_id
pub async fn update_project(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<Uuid>,
    ApiJson(request): ApiJson<UpdateProjectRequest>,
) -> ApiResult<Json<Success<Project>>> {
    require_permission(&state.db, project_id, &user, Permission::ManageProject).await?;
    let mut project = load_project(&state, project_id).await?;

    if let Some(name) = &request.name {
        project.name = require_text("name", name, MAX_PROJECT_NAME_LEN).map_err(ApiError::BadRequest)?;
    }
    if let Some(description) = &request.description {
        project.description = optional_text("description", Some(description), MAX_PROJECT_DESCRIPTION_LEN)
            .map_err(ApiError::BadRequest)?
            .unwrap_or_default();
    }
    project.updated_at = litrev_common::time::now();

    db::projects::update_project(&state.db, &project).await?;
    Ok(ok(project))
}

/// DELETE /api/projects/:project_id
pub async fn delete_project(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Success<Value>>> {
    require_permission(&state.db, project_id, &user, Permission::ManageProject).await?;

    if db::jobs::count_active_jobs_for_project(&state.db, project_id).await? > 0 {
        return Err(ApiError::JobAlreadyRunning(
            "Project has queued or running jobs".to_string(),
        ));
    }

    db::projects::delete_project(&state.db, project_id).await?;
    tracing::info!(project_id = %project_id, deleted_by = user.id(), "Deleted project");
    Ok(ok(deleted()))
}

pub fn project_routes() -> Router<AppState> {
    Router::new()
        .route("/api/projects", get(list_projects).post(create_project))
        .route(
            "/api/projects/:project_id",
            get(get_project).patch(update_project).delete(delete_project),
        )
}
