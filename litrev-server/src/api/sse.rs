//! Server-Sent Events endpoints
//!
//! Two feeds: everything happening in a project, and the progress of a
//! single job. The job feed closes after the job's terminal update.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use litrev_common::sse::{filtered_event_stream, StreamEnd};
use uuid::Uuid;

use crate::auth::{require_member, CurrentUser};
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /api/projects/:project_id/events
pub async fn project_events(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    require_member(&state.db, project_id, &user).await?;

    let rx = state.event_bus.subscribe();
    Ok(filtered_event_stream(
        format!("project {}", project_id),
        rx,
        Vec::new(),
        move |event| event.project_id() == project_id,
        StreamEnd::Never,
    ))
}

/// GET /api/jobs/:job_id/events
///
/// Starts with the job's current row so late subscribers see where it is.
pub async fn job_events(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(job_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    // Subscribe first; an update between the snapshot and the subscription would be lost
    let rx = state.event_bus.subscribe();

    let job = db::jobs::get_job(&state.db, job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Job {}", job_id)))?;
    require_member(&state.db, job.project_id, &user)
        .await
        .map_err(|e| match e {
            ApiError::NotFound(_) => ApiError::NotFound(format!("Job {}", job_id)),
            other => other,
        })?;

    Ok(filtered_event_stream(
        format!("job {}", job_id),
        rx,
        vec![job.to_event()],
        move |event| event.job_id() == Some(job_id),
        StreamEnd::AfterTerminalJobUpdate,
    ))
}

pub fn event_routes() -> Router<AppState> {
    Router::new()
        .route("/api/projects/:project_id/events", get(project_events))
        .route("/api/jobs/:job_id/events", get(job_events))
}
