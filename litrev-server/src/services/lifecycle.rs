//! Phase and batch lifecycle guard
//!
//! Status enums in `litrev_common::status` hold the structural transition
//! tables; this module adds the data-dependent guards, performs the write as
//! a compare-and-set and publishes the change event.
//!
//! | phase transition     | guard                                   |
//! |----------------------|-----------------------------------------|
//! | inactive → active    | no other active phase in the project    |
//! | active → inactive    | no queued or running job in the phase   |
//! | active → completed   | no batch in a non-terminal status       |
//! | * → annulled         | no queued or running job in the phase   |

use litrev_common::events::{EventBus, LitrevEvent};
use litrev_common::{time, BatchStatus, PhaseStatus};
use sqlx::SqlitePool;
use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{Batch, BatchDetail, Phase};
use crate::services::eligibility;

pub async fn change_phase_status(
    pool: &SqlitePool,
    event_bus: &EventBus,
    phase: &Phase,
    next: PhaseStatus,
) -> ApiResult<Phase> {
    let current = phase.status;
    if current == next {
        return Err(ApiError::InvalidTransition(format!("Phase is already {}", current)));
    }
    if !current.can_transition_to(next) {
        return Err(ApiError::InvalidTransition(format!(
            "Phase cannot move from {} to {}",
            current, next
        )));
    }

    match next {
        PhaseStatus::Active => {
            if db::phases::find_other_active_phase(pool, phase.project_id, phase.id).await?.is_some() {
                return Err(ApiError::InvalidTransition(
                    "Another phase of this project is already active".to_string(),
                ));
            }
        }
        PhaseStatus::Inactive | PhaseStatus::Annulled => {
            let jobs = db::phases::count_active_jobs(pool, phase.id).await?;
            if jobs > 0 {
                return Err(ApiError::InvalidTransition(format!(
                    "Phase has {} queued or running job(s)",
                    jobs
                )));
            }
        }
        PhaseStatus::Completed => {
            let open = db::phases::count_open_batches(pool, phase.id).await?;
            if open > 0 {
                return Err(ApiError::InvalidTransition(format!(
                    "Phase has {} batch(es) not yet completed or discarded",
                    open
                )));
            }
        }
    }

    let applied = match db::phases::set_phase_status(pool, phase.id, current, next).await {
        Ok(applied) => applied,
        // Lost an activation race to another request
        Err(e) if e.is_unique_violation() => {
            return Err(ApiError::InvalidTransition(
                "Another phase of this project is already active".to_string(),
            ))
        }
        Err(e) => return Err(e.into()),
    };
    if !applied {
        return Err(ApiError::Conflict("Phase status changed concurrently".to_string()));
    }

    info!(phase_id = %phase.id, from = %current, to = %next, "Phase status changed");
    event_bus.emit_lossy(LitrevEvent::PhaseStatusChanged {
        project_id: phase.project_id,
        phase_id: phase.id,
        old_status: current,
        new_status: next,
        timestamp: time::now(),
    });

    db::phases::get_phase(pool, phase.project_id, phase.id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Phase {}", phase.id)))
}

/// Phases with batches or dimensions are kept for the record; annul them instead
pub async fn delete_phase(pool: &SqlitePool, phase: &Phase) -> ApiResult<()> {
    let batches = db::phases::count_batches(pool, phase.id).await?;
    let dimensions = db::phases::count_dimensions(pool, phase.id).await?;
    if batches > 0 || dimensions > 0 {
        return Err(ApiError::Conflict(format!(
            "Phase has {} batch(es) and {} dimension(s); annul it instead",
            batches, dimensions
        )));
    }

    db::phases::delete_phase(pool, phase.id).await?;
    info!(phase_id = %phase.id, "Deleted phase");
    Ok(())
}

/// Create a batch in an active phase from eligible articles
pub async fn create_batch(
    pool: &SqlitePool,
    phase: &Phase,
    name: Option<&str>,
    article_ids: &[Uuid],
) -> ApiResult<BatchDetail> {
    if phase.status != PhaseStatus::Active {
        return Err(ApiError::InvalidTransition(format!(
            "Batches can only be created in an active phase (phase is {})",
            phase.status
        )));
    }

    let mut seen = HashSet::new();
    let ids: Vec<Uuid> = article_ids.iter().copied().filter(|id| seen.insert(*id)).collect();
    if ids.is_empty() {
        return Err(ApiError::BadRequest("article_ids must not be empty".to_string()));
    }

    let eligible = eligibility::eligible_article_ids(pool, phase).await?;
    for id in &ids {
        if eligible.contains(id) {
            continue;
        }
        if db::articles::get_article(pool, phase.project_id, *id).await?.is_none() {
            return Err(ApiError::BadRequest(format!("Article {} does not belong to this project", id)));
        }
        return Err(ApiError::Conflict(format!("Article {} is not eligible for this phase", id)));
    }

    let detail = db::batches::create_batch(pool, phase.project_id, phase.id, name, &ids).await?;
    info!(
        batch_id = %detail.batch.id,
        phase_id = %phase.id,
        articles = ids.len(),
        "Created batch"
    );
    Ok(detail)
}

/// User-requested batch transition (discard, or complete after review)
pub async fn change_batch_status(
    pool: &SqlitePool,
    event_bus: &EventBus,
    batch: &Batch,
    next: BatchStatus,
) -> ApiResult<Batch> {
    let current = batch.status;
    if current == next {
        return Err(ApiError::InvalidTransition(format!("Batch is already {}", current)));
    }
    if current.is_running() {
        return Err(ApiError::InvalidTransition(format!(
            "Batch is {}; wait for the job to finish",
            current
        )));
    }
    if !current.can_user_transition_to(next) {
        return Err(ApiError::InvalidTransition(format!(
            "Batch cannot move from {} to {}",
            current, next
        )));
    }

    if !db::batches::set_batch_status(pool, batch.id, current, next).await? {
        return Err(ApiError::Conflict("Batch status changed concurrently".to_string()));
    }

    info!(batch_id = %batch.id, from = %current, to = %next, "Batch status changed");
    event_bus.emit_lossy(LitrevEvent::BatchStatusChanged {
        project_id: batch.project_id,
        phase_id: batch.phase_id,
        batch_id: batch.id,
        old_status: current,
        new_status: next,
        timestamp: time::now(),
    });

    db::batches::get_batch(pool, batch.project_id, batch.id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Batch {}", batch.id)))
}

/// Only untouched (pending) or discarded batches may be deleted
pub async fn delete_batch(pool: &SqlitePool, batch: &Batch) -> ApiResult<()> {
    if !matches!(batch.status, BatchStatus::Pending | BatchStatus::Discarded) {
        return Err(ApiError::Conflict(format!(
            "Only pending or discarded batches can be deleted (batch is {})",
            batch.status
        )));
    }
    if db::jobs::count_active_jobs_for_batch(pool, batch.id).await? > 0 {
        return Err(ApiError::JobAlreadyRunning(format!("Batch {} has an active job", batch.id)));
    }

    db::batches::delete_batch(pool, batch.id).await?;
    info!(batch_id = %batch.id, "Deleted batch");
    Ok(())
}
