//! Batch and human review endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use litrev_common::BatchStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::phases::load_phase;
use super::{deleted, ApiJson};
use crate::auth::{require_member, require_permission, CurrentUser};
use crate::db;
use crate::error::{ok, ApiError, ApiResult, Success};
use crate::models::{optional_text, Batch, BatchDetail, DimensionReview, Permission};
use crate::services::lifecycle;
use crate::AppState;

const MAX_BATCH_NAME_LEN: usize = 200;
const MAX_RATIONALE_LEN: usize = 5000;

#[derive(Debug, Deserialize)]
pub struct CreateBatchRequest {
    #[serde(default)]
    pub name: Option<String>,
    pub article_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct BatchStatusRequest {
    pub status: BatchStatus,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub article_id: Uuid,
    pub dimension_id: Uuid,
    pub value: String,
    #[serde(default)]
    pub rationale: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchReviews {
    pub batch_id: Uuid,
    pub status: BatchStatus,
    pub reviews: Vec<DimensionReview>,
}

pub(crate) async fn load_batch(state: &AppState, project_id: Uuid, batch_id: Uuid) -> ApiResult<Batch> {
    db::batches::get_batch(&state.db, project_id, batch_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Batch {}", batch_id)))
}

/// GET /api/projects/:project_id/phases/:phase_id/batches
pub async fn list_batches(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project_id, phase_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Success<Vec<Batch>>>> {
    require_member(&state.db, project_id, &user).await?;
    let phase = load_phase(&state.db, project_id, phase_id).await?;
    Ok(ok(db::batches::list_batches(&state.db, phase.id).await?))
}

/// POST /api/projects/:project_id/phases/:phase_id/batches
pub async fn create_batch(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project_id, phase_id)): Path<(Uuid, Uuid)>,
    ApiJson(request): ApiJson<CreateBatchRequest>,
) -> ApiResult<(StatusCode, Json<Success<BatchDetail>>)> {
    require_permission(&state.db, project_id, &user, Permission::ManagePhases).await?;
    let phase = load_phase(&state.db, project_id, phase_id).await?;
    let name = optional_text("name", request.name.as_deref(), MAX_BATCH_NAME_LEN).map_err(ApiError::BadRequest)?;

    let detail = lifecycle::create_batch(&state.db, &phase, name.as_deref(), &request.article_ids).await?;
    Ok((StatusCode::CREATED, ok(detail)))
}

/// GET /api/projects/:project_id/batches/:batch_id
pub async fn get_batch(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project_id, batch_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Success<BatchDetail>>> {
    require_member(&state.db, project_id, &user).await?;
    let batch = load_batch(&state, project_id, batch_id).await?;
    let article_ids = db::batches::batch_article_ids(&state.db, batch.id).await?;
    Ok(ok(BatchDetail { batch, article_ids }))
}

/// DELETE /api/projects/:project_id/batches/:batch_id
pub async fn delete_batch(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project_id, batch_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Success<Value>>> {
    require_permission(&state.db, project_id, &user, Permission::ManagePhases).await?;
    let batch = load_batch(&state, project_id, batch_id).await?;
    if state.jobs.is_claimed(batch.id) {
        return Err(ApiError::JobAlreadyRunning(format!("Batch {} has an active job", batch.id)));
    }
    lifecycle::delete_batch(&state.db, &batch).await?;
    Ok(ok(deleted()))
}

/// POST /api/projects/:project_id/batches/:batch_id/status
pub async fn change_batch_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project_id, batch_id)): Path<(Uuid, Uuid)>,
    ApiJson(request): ApiJson<BatchStatusRequest>,
) -> ApiResult<Json<Success<Batch>>> {
    require_permission(&state.db, project_id, &user, Permission::ManagePhases).await?;
    let batch = load_batch(&state, project_id, batch_id).await?;
    let updated = lifecycle::change_batch_status(&state.db, &state.event_bus, &batch, request.status).await?;
    Ok(ok(updated))
}

/// GET /api/projects/:project_id/batches/:batch_id/reviews
pub async fn list_reviews(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project_id, batch_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Success<BatchReviews>>> {
    require_member(&state.db, project_id, &user).await?;
    let batch = load_batch(&state, project_id, batch_id).await?;
    let reviews = db::reviews::list_reviews(&state.db, batch.id).await?;
    Ok(ok(BatchReviews {
        batch_id: batch.id,
        status: batch.status,
        reviews,
    }))
}

/// PUT /api/projects/:project_id/batches/:batch_id/reviews
///
/// Records a human judgment for one article and dimension. Human reviews
/// are kept when preclassification runs again on the batch.
pub async fn put_review(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project_id, batch_id)): Path<(Uuid, Uuid)>,
    ApiJson(request): ApiJson<ReviewRequest>,
) -> ApiResult<Json<Success<DimensionReview>>> {
    require_permission(&state.db, project_id, &user, Permission::ManageArticles).await?;
    let batch = load_batch(&state, project_id, batch_id).await?;

    if batch.status.is_terminal() {
        return Err(ApiError::Conflict(format!(
            "Batch is {}; reviews can no longer change",
            batch.status
        )));
    }

    let article_ids = db::batches::batch_article_ids(&state.db, batch.id).await?;
    if !article_ids.contains(&request.article_id) {
        return Err(ApiError::BadRequest(format!(
            "Article {} is not part of this batch",
            request.article_id
        )));
    }

    let dimension = db::dimensions::get_dimension(&state.db, batch.phase_id, request.dimension_id)
        .await?
        .ok_or_else(|| {
            ApiError::BadRequest(format!(
                "Dimension {} does not belong to this batch's phase",
                request.dimension_id
            ))
        })?;

    let value = dimension.validate_value(&request.value).map_err(ApiError::BadRequest)?;
    let rationale = optional_text("rationale", request.rationale.as_deref(), MAX_RATIONALE_LEN)
        .map_err(ApiError::BadRequest)?;

    let review = db::reviews::upsert_human_review(
        &state.db,
        batch.id,
        request.article_id,
        dimension.id,
        &value,
        rationale.as_deref(),
        user.id(),
    )
    .await?;
    Ok(ok(review))
}

pub fn batch_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/projects/:project_id/phases/:phase_id/batches",
            get(list_batches).post(create_batch),
        )
        .route(
            "/api/projects/:project_id/batches/:batch_id",
            get(get_batch).delete(delete_batch),
        )
        .route(
            "/api/projects/:project_id/batches/:batch_id/status",
            post(change_batch_status),
        )
        .route(
            "/api/projects/:project_id/batches/:batch_id/reviews",
            get(list_reviews).put(put_review),
        )
}
