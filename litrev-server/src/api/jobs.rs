//! AI job endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use litrev_common::JobType;
use serde::Deserialize;
use uuid::Uuid;

use super::batches::load_batch;
use super::ApiJson;
use crate::auth::{require_member, require_permission, CurrentUser};
use crate::db;
use crate::error::{ok, ApiError, ApiResult, Success};
use crate::models::{AiJob, Permission};
use crate::services::job_tracker::{self, SubmitContext};
use crate::AppState;

const DEFAULT_JOB_LIMIT: i64 = 50;
const MAX_JOB_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    pub job_type: JobType,
}

#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    pub batch_id: Option<Uuid>,
    pub limit: Option<i64>,
}

/// Load a job the caller can see; non-members get 404
async fn load_visible_job(state: &AppState, user: &CurrentUser, job_id: Uuid) -> ApiResult<AiJob> {
    let job = db::jobs::get_job(&state.db, job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Job {}", job_id)))?;
    require_member(&state.db, job.project_id, user)
        .await
        .map_err(|e| match e {
            ApiError::NotFound(_) => ApiError::NotFound(format!("Job {}", job_id)),
            other => other,
        })?;
    Ok(job)
}

/// POST /api/projects/:project_id/batches/:batch_id/jobs
pub async fn submit_job(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project_id, batch_id)): Path<(Uuid, Uuid)>,
    ApiJson(request): ApiJson<SubmitJobRequest>,
) -> ApiResult<(StatusCode, Json<Success<AiJob>>)> {
    require_permission(&state.db, project_id, &user, Permission::RunAiJobs).await?;
    let batch = load_batch(&state, project_id, batch_id).await?;

    let ctx = SubmitContext {
        db: &state.db,
        event_bus: &state.event_bus,
        tracker: &state.jobs,
        ai: state.ai.clone(),
        target_language: &state.config.ai.target_language,
    };
    let job = job_tracker::submit(ctx, &batch, request.job_type, user.id()).await?;
    Ok((StatusCode::CREATED, ok(job)))
}

/// GET /api/projects/:project_id/jobs
pub async fn list_jobs(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<Uuid>,
    Query(query): Query<JobListQuery>,
) -> ApiResult<Json<Success<Vec<AiJob>>>> {
    require_member(&state.db, project_id, &user).await?;
    let limit = query.limit.unwrap_or(DEFAULT_JOB_LIMIT).clamp(1, MAX_JOB_LIMIT);
    Ok(ok(db::jobs::list_jobs(&state.db, project_id, query.batch_id, limit).await?))
}

/// GET /api/jobs/:job_id
pub async fn get_job(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<Success<AiJob>>> {
    Ok(ok(load_visible_job(&state, &user, job_id).await?))
}

/// POST /api/jobs/:job_id/cancel
///
/// Cancellation is cooperative: the runner stops at the next article
/// boundary and the job ends as failed with "cancelled by user".
pub async fn cancel_job(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<Success<AiJob>>> {
    let job = load_visible_job(&state, &user, job_id).await?;
    require_permission(&state.db, job.project_id, &user, Permission::RunAiJobs).await?;
    job_tracker::cancel(&state.db, &state.event_bus, &state.jobs, &job).await?;
    Ok(ok(job))
}

pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/projects/:project_id/batches/:batch_id/jobs",
            post(submit_job),
        )
        .route("/api/projects/:project_id/jobs", get(list_jobs))
        .route("/api/jobs/:job_id", get(get_job))
        .route("/api/jobs/:job_id/cancel", post(cancel_job))
}
