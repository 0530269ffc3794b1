//! Phase and dimension endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use litrev_common::PhaseStatus;
use serde::Deserialize;
use serde_json::Value;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{deleted, ApiJson};
use crate::auth::{require_member, require_permission, CurrentUser};
use crate::db;
use crate::error::{ok, ApiError, ApiResult, Success};
use crate::models::dimension::{normalize_options, validate_labels};
use crate::models::{optional_text, require_text, Article, Dimension, DimensionKind, Permission, Phase};
use crate::services::{eligibility, lifecycle};
use crate::AppState;

const MAX_PHASE_NAME_LEN: usize = 200;
const MAX_PHASE_DESCRIPTION_LEN: usize = 2000;

#[derive(Debug, Deserialize)]
pub struct CreatePhaseRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePhaseRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PhaseStatusRequest {
    pub status: PhaseStatus,
}

#[derive(Debug, Deserialize)]
pub struct CreateDimensionRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub kind: DimensionKind,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDimensionRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub position: Option<i64>,
}

pub(crate) async fn load_phase(pool: &SqlitePool, project_id: Uuid, phase_id: Uuid) -> ApiResult<Phase> {
    db::phases::get_phase(pool, project_id, phase_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Phase {}", phase_id)))
}

fn ensure_open(phase: &Phase) -> ApiResult<()> {
    if phase.status.is_terminal() {
        return Err(ApiError::Conflict(format!("Phase is {} and can no longer be edited", phase.status)));
    }
    Ok(())
}

/// GET /api/projects/:project_id/phases
pub async fn list_phases(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Success<Vec<Phase>>>> {
    require_member(&state.db, project_id, &user).await?;
    Ok(ok(db::phases::list_phases(&state.db, project_id).await?))
}

/// POST /api/projects/:project_id/phases
pub async fn create_phase(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<Uuid>,
    ApiJson(request): ApiJson<CreatePhaseRequest>,
) -> ApiResult<(StatusCode, Json<Success<Phase>>)> {
    require_permission(&state.db, project_id, &user, Permission::ManagePhases).await?;
    let name = require_text("name", &request.name, MAX_PHASE_NAME_LEN).map_err(ApiError::BadRequest)?;
    let description = optional_text("description", request.description.as_deref(), MAX_PHASE_DESCRIPTION_LEN)
        .map_err(ApiError::BadRequest)?
        .unwrap_or_default();

    let phase = db::phases::create_phase(&state.db, project_id, &name, &description).await?;
    tracing::info!(phase_id = %phase.id, number = phase.phase_number, "Created phase");
    Ok((StatusCode::CREATED, ok(phase)))
}

/// GET /api/projects/:project_id/phases/:phase_id
pub async fn get_phase(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project_id, phase_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Success<Phase>>> {
    require_member(&state.db, project_id, &user).await?;
    Ok(ok(load_phase(&state.db, project_id, phase_id).await?))
}

/// PATCH /api/projects/:project_id/phases/:phase_id
pub async fn update_phase(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project_id, phase_id)): Path<(Uuid, Uuid)>,
    ApiJson(request): ApiJson<UpdatePhaseRequest>,
) -> ApiResult<Json<Success<Phase>>> {
    require_permission(&state.db, project_id, &user, Permission::ManagePhases).await?;
    let mut phase = load_phase(&state.db, project_id, phase_id).await?;
    ensure_open(&phase)?;

    if let Some(name) = &request.name {
        phase.name = require_text("name", name, MAX_PHASE_NAME_LEN).map_err(ApiError::BadRequest)?;
    }
    if let Some(description) = &request.description {
        phase.description = optional_text("description", Some(description), MAX_PHASE_DESCRIPTION_LEN)
            .map_err(ApiError::BadRequest)?
            .unwrap_or_default();
    }

    db::phases::update_phase_labels(&state.db, &phase).await?;
    Ok(ok(load_phase(&state.db, project_id, phase_id).await?))
}

/// DELETE /api/projects/:project_id/phases/:phase_id
pub async fn delete_phase(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project_id, phase_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Success<Value>>> {
    require_permission(&state.db, project_id, &user, Permission::ManagePhases).await?;
    let phase = load_phase(&state.db, project_id, phase_id).await?;
    lifecycle::delete_phase(&state.db, &phase).await?;
    Ok(ok(deleted()))
}

/// POST /api/projects/:project_id/phases/:phase_id/status
pub async fn change_phase_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project_id, phase_id)): Path<(Uuid, Uuid)>,
    ApiJson(request): ApiJson<PhaseStatusRequest>,
) -> ApiResult<Json<Success<Phase>>> {
    require_permission(&state.db, project_id, &user, Permission::ManagePhases).await?;
    let phase = load_phase(&state.db, project_id, phase_id).await?;
    let updated = lifecycle::change_phase_status(&state.db, &state.event_bus, &phase, request.status).await?;
    Ok(ok(updated))
}

/// GET /api/projects/:project_id/phases/:phase_id/eligible-articles
pub async fn eligible_articles(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project_id, phase_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Success<Vec<Article>>>> {
    require_member(&state.db, project_id, &user).await?;
    let phase = load_phase(&state.db, project_id, phase_id).await?;
    Ok(ok(eligibility::eligible_articles(&state.db, &phase).await?))
}

/// GET /api/projects/:project_id/phases/:phase_id/dimensions
pub async fn list_dimensions(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project_id, phase_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Success<Vec<Dimension>>>> {
    require_member(&state.db, project_id, &user).await?;
    let phase = load_phase(&state.db, project_id, phase_id).await?;
    Ok(ok(db::dimensions::list_dimensions(&state.db, phase.id).await?))
}

fn duplicate_name(name: &str) -> impl FnOnce(litrev_common::Error) -> ApiError + '_ {
    move |e| {
        if e.is_unique_violation() {
            ApiError::Conflict(format!("Dimension '{}' already exists in this phase", name))
        } else {
            e.into()
        }
    }
}

/// POST /api/projects/:project_id/phases/:phase_id/dimensions
pub async fn create_dimension(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project_id, phase_id)): Path<(Uuid, Uuid)>,
    ApiJson(request): ApiJson<CreateDimensionRequest>,
) -> ApiResult<(StatusCode, Json<Success<Dimension>>)> {
    require_permission(&state.db, project_id, &user, Permission::ManagePhases).await?;
    let phase = load_phase(&state.db, project_id, phase_id).await?;
    ensure_open(&phase)?;

    let (name, description) =
        validate_labels(&request.name, request.description.as_deref()).map_err(ApiError::BadRequest)?;
    let options = normalize_options(request.kind, &request.options).map_err(ApiError::BadRequest)?;

    let dimension = db::dimensions::create_dimension(&state.db, phase.id, &name, &description, request.kind, &options)
        .await
        .map_err(duplicate_name(&name))?;
    Ok((StatusCode::CREATED, ok(dimension)))
}

/// PATCH /api/projects/:project_id/phases/:phase_id/dimensions/:dimension_id
pub async fn update_dimension(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project_id, phase_id, dimension_id)): Path<(Uuid, Uuid, Uuid)>,
    ApiJson(request): ApiJson<UpdateDimensionRequest>,
) -> ApiResult<Json<Success<Dimension>>> {
    require_permission(&state.db, project_id, &user, Permission::ManagePhases).await?;
    let phase = load_phase(&state.db, project_id, phase_id).await?;
    ensure_open(&phase)?;
    let mut dimension = db::dimensions::get_dimension(&state.db, phase.id, dimension_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Dimension {}", dimension_id)))?;

    let (name, description) = validate_labels(
        request.name.as_deref().unwrap_or(&dimension.name),
        Some(request.description.as_deref().unwrap_or(&dimension.description)),
    )
    .map_err(ApiError::BadRequest)?;
    dimension.name = name;
    dimension.description = description;

    if let Some(options) = &request.options {
        dimension.options = normalize_options(dimension.kind, options).map_err(ApiError::BadRequest)?;
    }
    if let Some(position) = request.position {
        if position < 1 {
            return Err(ApiError::BadRequest("position must be at least 1".to_string()));
        }
        dimension.position = position;
    }

    db::dimensions::update_dimension(&state.db, &dimension)
        .await
        .map_err(duplicate_name(&dimension.name))?;
    Ok(ok(dimension))
}

/// DELETE /api/projects/:project_id/phases/:phase_id/dimensions/:dimension_id
pub async fn delete_dimension(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project_id, phase_id, dimension_id)): Path<(Uuid, Uuid, Uuid)>,
) -> ApiResult<Json<Success<Value>>> {
    require_permission(&state.db, project_id, &user, Permission::ManagePhases).await?;
    let phase = load_phase(&state.db, project_id, phase_id).await?;
    ensure_open(&phase)?;
    let dimension = db::dimensions::get_dimension(&state.db, phase.id, dimension_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Dimension {}", dimension_id)))?;

    let reviews = db::dimensions::count_reviews(&state.db, dimension.id).await?;
    if reviews > 0 {
        return Err(ApiError::Conflict(format!(
            "Dimension '{}' has {} review(s)",
            dimension.name, reviews
        )));
    }

    db::dimensions::delete_dimension(&state.db, dimension.id).await?;
    Ok(ok(deleted()))
}

pub fn phase_routes() -> Router<AppState> {
    Router::new()
        .route("/api/projects/:project_id/phases", get(list_phases).post(create_phase))
        .route(
            "/api/projects/:project_id/phases/:phase_id",
            get(get_phase).patch(update_phase).delete(delete_phase),
        )
        .route(
            "/api/projects/:project_id/phases/:phase_id/status",
            post(change_phase_status),
        )
        .route(
            "/api/projects/:project_id/phases/:phase_id/eligible-articles",
            get(eligible_articles),
        )
        .route(
            "/api/projects/:project_id/phases/:phase_id/dimensions",
            get(list_dimensions).post(create_dimension),
        )
        .route(
            "/api/projects/:project_id/phases/:phase_id/dimensions/:dimension_id",
            patch(update_dimension).delete(delete_dimension),
        )
}
