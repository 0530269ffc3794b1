//! AI job submission, cancellation and restart recovery
//!
//! Two layers keep a batch to one job at a time: an in-memory claim held
//! for the lifetime of the worker task, and a check for queued/running rows
//! in `ai_jobs`. The claim map is per server process and is not persisted;
//! recovery at startup fails jobs a previous process left behind.

use litrev_common::events::{EventBus, LitrevEvent};
use litrev_common::{time, JobStatus, JobType, PhaseStatus};
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db;
use crate::db::jobs::JobOutcome;
use crate::error::{ApiError, ApiResult};
use crate::models::{AiJob, Batch};
use crate::services::ai_client::LanguageModel;
use crate::services::job_runner::{self, JobContext};

/// Error message recorded for jobs cancelled through the API
pub const CANCELLED_MESSAGE: &str = "cancelled by user";

/// Error message recorded for jobs interrupted by a restart
pub const INTERRUPTED_MESSAGE: &str = "interrupted by server restart";

/// Process-wide registry of running jobs
#[derive(Clone, Default)]
pub struct JobTracker {
    running_batches: Arc<Mutex<HashSet<Uuid>>>,
    cancellation_tokens: Arc<RwLock<HashMap<Uuid, CancellationToken>>>,
}

/// Exclusive claim on a batch; released on drop
pub struct BatchClaim {
    running_batches: Arc<Mutex<HashSet<Uuid>>>,
    batch_id: Uuid,
}

impl Drop for BatchClaim {
    fn drop(&mut self) {
        let mut batches = self
            .running_batches
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        batches.remove(&self.batch_id);
    }
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `batch_id`, `None` when another job holds it
    pub fn try_claim(&self, batch_id: Uuid) -> Option<BatchClaim> {
        let mut batches = self
            .running_batches
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !batches.insert(batch_id) {
            return None;
        }
        Some(BatchClaim {
            running_batches: Arc::clone(&self.running_batches),
            batch_id,
        })
    }

    pub fn is_claimed(&self, batch_id: Uuid) -> bool {
        self.running_batches
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(&batch_id)
    }

    pub(crate) async fn register_token(&self, job_id: Uuid, token: CancellationToken) {
        self.cancellation_tokens.write().await.insert(job_id, token);
    }

    pub(crate) async fn remove_token(&self, job_id: Uuid) {
        self.cancellation_tokens.write().await.remove(&job_id);
    }

    /// Signal a running worker; false when this process is not running the job
    pub async fn cancel(&self, job_id: Uuid) -> bool {
        match self.cancellation_tokens.read().await.get(&job_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

/// Everything a submission needs from the application state
pub struct SubmitContext<'a> {
    pub db: &'a SqlitePool,
    pub event_bus: &'a EventBus,
    pub tracker: &'a JobTracker,
    pub ai: Option<Arc<dyn LanguageModel>>,
    pub target_language: &'a str,
}

/// Validate, record and start a job for `batch`
pub async fn submit(ctx: SubmitContext<'_>, batch: &Batch, job_type: JobType, submitted_by: &str) -> ApiResult<AiJob> {
    let ai = ctx
        .ai
        .clone()
        .ok_or_else(|| ApiError::AiUnavailable("No AI API key configured".to_string()))?;

    let claim = ctx.tracker.try_claim(batch.id).ok_or_else(|| {
        ApiError::JobAlreadyRunning(format!("A job is already running for batch {}", batch.id))
    })?;

    if db::jobs::count_active_jobs_for_batch(ctx.db, batch.id).await? > 0 {
        return Err(ApiError::JobAlreadyRunning(format!(
            "A job is already queued or running for batch {}",
            batch.id
        )));
    }

    let phase = db::phases::get_phase(ctx.db, batch.project_id, batch.phase_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Phase {}", batch.phase_id)))?;
    if phase.status != PhaseStatus::Active {
        return Err(ApiError::InvalidTransition(format!(
            "Jobs can only run in an active phase (phase is {})",
            phase.status
        )));
    }

    let running_status = batch.status.running_status_for(job_type).ok_or_else(|| {
        ApiError::InvalidTransition(format!("Cannot start {} on a {} batch", job_type, batch.status))
    })?;

    if job_type == JobType::Preclassification && db::phases::count_dimensions(ctx.db, phase.id).await? == 0 {
        return Err(ApiError::BadRequest(
            "Phase has no dimensions to preclassify against".to_string(),
        ));
    }

    let now = time::now();
    let job = AiJob {
        id: Uuid::new_v4(),
        project_id: batch.project_id,
        batch_id: batch.id,
        job_type,
        status: JobStatus::Queued,
        progress: 0.0,
        details: serde_json::json!({ "processed": 0, "total": batch.article_count }),
        error_message: None,
        batch_status_before: batch.status,
        submitted_by: submitted_by.to_string(),
        created_at: now,
        updated_at: now,
        completed_at: None,
    };

    // Cancellable from the moment the row exists
    let token = CancellationToken::new();
    ctx.tracker.register_token(job.id, token.clone()).await;

    match db::jobs::insert_job_claiming_batch(ctx.db, &job, running_status).await {
        Ok(true) => {}
        Ok(false) => {
            ctx.tracker.remove_token(job.id).await;
            return Err(ApiError::Conflict("Batch status changed concurrently".to_string()));
        }
        Err(e) => {
            ctx.tracker.remove_token(job.id).await;
            return Err(e.into());
        }
    }

    info!(job_id = %job.id, batch_id = %batch.id, job_type = %job_type, "Job submitted");

    ctx.event_bus.emit_lossy(LitrevEvent::BatchStatusChanged {
        project_id: batch.project_id,
        phase_id: batch.phase_id,
        batch_id: batch.id,
        old_status: batch.status,
        new_status: running_status,
        timestamp: now,
    });
    ctx.event_bus.emit_lossy(job.to_event());

    let runner = JobContext {
        db: ctx.db.clone(),
        event_bus: ctx.event_bus.clone(),
        ai,
        tracker: ctx.tracker.clone(),
        target_language: ctx.target_language.to_string(),
        phase_id: phase.id,
        running_status,
    };
    tokio::spawn(job_runner::run_job(runner, job.clone(), claim, token));

    Ok(job)
}

/// Request cancellation of a non-terminal job
///
/// A running worker is signalled and records the outcome itself. A queued
/// or running row that no worker holds (its terminal write was lost) is
/// failed here and its batch restored.
pub async fn cancel(pool: &SqlitePool, event_bus: &EventBus, tracker: &JobTracker, job: &AiJob) -> ApiResult<()> {
    if job.status.is_terminal() {
        return Err(ApiError::Conflict(format!("Job {} already {}", job.id, job.status)));
    }
    if tracker.cancel(job.id).await {
        info!(job_id = %job.id, "Job cancellation requested");
        return Ok(());
    }
    if tracker.is_claimed(job.batch_id) {
        return Err(ApiError::Conflict(format!("Job {} is not running on this server", job.id)));
    }

    warn!(job_id = %job.id, batch_id = %job.batch_id, "Cancelling job with no worker");
    match fail_unfinished_job(pool, event_bus, job, CANCELLED_MESSAGE).await {
        Ok(_) => Ok(()),
        Err(litrev_common::Error::NotFound(_)) => {
            Err(ApiError::Conflict(format!("Job {} finished meanwhile", job.id)))
        }
        Err(e) => Err(e.into()),
    }
}

/// Mark an unfinished job failed and move its batch back to the status it had before
///
/// Returns whether the batch was restored.
async fn fail_unfinished_job(
    pool: &SqlitePool,
    event_bus: &EventBus,
    job: &AiJob,
    message: &str,
) -> litrev_common::Result<bool> {
    let before = job.batch_status_before;
    let running = before.running_status_for(job.job_type).unwrap_or(before);
    let outcome = JobOutcome {
        status: JobStatus::Failed,
        progress: job.progress,
        details: &job.details,
        error_message: Some(message),
        batch_transition: (running, before),
    };

    let restored = db::jobs::finish_job(pool, job.id, job.batch_id, &outcome).await?;
    if restored {
        if let Some(batch) = db::batches::get_batch(pool, job.project_id, job.batch_id).await? {
            event_bus.emit_lossy(LitrevEvent::BatchStatusChanged {
                project_id: job.project_id,
                phase_id: batch.phase_id,
                batch_id: job.batch_id,
                old_status: running,
                new_status: before,
                timestamp: time::now(),
            });
        }
    } else {
        warn!(job_id = %job.id, batch_id = %job.batch_id, "Batch was not in its running status; left unchanged");
    }
    if let Some(updated) = db::jobs::get_job(pool, job.id).await? {
        event_bus.emit_lossy(updated.to_event());
    }
    Ok(restored)
}

/// Fail jobs a previous process left queued or running and restore their batches
pub async fn recover_interrupted_jobs(pool: &SqlitePool, event_bus: &EventBus) -> litrev_common::Result<usize> {
    let jobs = db::jobs::list_unfinished_jobs(pool).await?;
    let mut recovered = 0;

    for job in jobs {
        match fail_unfinished_job(pool, event_bus, &job, INTERRUPTED_MESSAGE).await {
            Ok(_) => recovered += 1,
            Err(e) => error!(job_id = %job.id, error = %e, "Failed to recover interrupted job"),
        }
    }

    if recovered > 0 {
        info!(recovered, "Marked interrupted jobs as failed");
    }
    Ok(recovered)
}
