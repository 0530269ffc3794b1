//! AI job workers
//!
//! A worker walks the batch's articles in order, calling the language model
//! per article and persisting results as it goes. After every article the
//! job row gets new `progress`/`details` and a `JobUpdated` event is
//! published. Cancellation is honoured at article boundaries.

use litrev_common::events::{EventBus, LitrevEvent};
use litrev_common::{time, BatchStatus, JobStatus, JobType};
use serde_json::json;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db;
use crate::db::jobs::JobOutcome;
use crate::models::{AiJob, Article};
use crate::services::ai_client::{AiError, LanguageModel};
use crate::services::job_tracker::{BatchClaim, JobTracker, CANCELLED_MESSAGE};

/// Owned state a worker task runs with
pub struct JobContext {
    pub db: SqlitePool,
    pub event_bus: EventBus,
    pub ai: Arc<dyn LanguageModel>,
    pub tracker: JobTracker,
    pub target_language: String,
    pub phase_id: Uuid,
    /// Batch status while this job runs
    pub running_status: BatchStatus,
}

/// Why a worker stopped early
#[derive(Debug)]
enum Stop {
    Cancelled,
    Failed(String),
}

impl From<litrev_common::Error> for Stop {
    fn from(err: litrev_common::Error) -> Self {
        Stop::Failed(err.to_string())
    }
}

/// Terminal state that made it into the database
struct Recorded {
    status: JobStatus,
    progress: f64,
    error_message: Option<String>,
    batch_next: BatchStatus,
    batch_moved: bool,
}

/// Running counters, serialized into the job's `details`
#[derive(Debug, Default)]
struct Progress {
    processed: usize,
    total: usize,
    current_article_id: Option<Uuid>,
    translated: usize,
    skipped: usize,
    reviews_written: usize,
    human_reviews_kept: usize,
}

impl Progress {
    fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.processed as f64 / self.total as f64 * 100.0).min(100.0)
        }
    }

    fn details(&self, job_type: JobType) -> serde_json::Value {
        let mut details = json!({
            "processed": self.processed,
            "total": self.total,
            "current_article_id": self.current_article_id,
        });
        let counters = match job_type {
            JobType::Translation => json!({ "translated": self.translated, "skipped": self.skipped }),
            JobType::Preclassification => json!({
                "reviews_written": self.reviews_written,
                "human_reviews_kept": self.human_reviews_kept,
            }),
        };
        if let (Some(target), Some(extra)) = (details.as_object_mut(), counters.as_object()) {
            target.extend(extra.clone());
        }
        details
    }
}

/// Worker entry point, spawned once per submitted job
pub async fn run_job(ctx: JobContext, mut job: AiJob, claim: BatchClaim, token: CancellationToken) {
    info!(job_id = %job.id, job_type = %job.job_type, "Job started");

    let mut progress = Progress::default();
    let result = run_articles(&ctx, &mut job, &mut progress, &token).await;

    let (status, error_message, batch_next) = match &result {
        Ok(()) => (JobStatus::Completed, None, job.job_type.done_status()),
        Err(Stop::Cancelled) => (JobStatus::Failed, Some(CANCELLED_MESSAGE.to_string()), job.batch_status_before),
        Err(Stop::Failed(message)) => (JobStatus::Failed, Some(message.clone()), job.batch_status_before),
    };

    progress.current_article_id = None;
    let details = progress.details(job.job_type);
    let final_progress = if status == JobStatus::Completed { 100.0 } else { progress.percent() };
    let outcome = JobOutcome {
        status,
        progress: final_progress,
        details: &details,
        error_message: error_message.as_deref(),
        batch_transition: (ctx.running_status, batch_next),
    };

    let finished = db::jobs::finish_job(&ctx.db, job.id, job.batch_id, &outcome).await;
    let recorded = match finished {
        Ok(batch_moved) => {
            match &result {
                Ok(()) => info!(job_id = %job.id, processed = progress.processed, "Job completed"),
                Err(Stop::Cancelled) => info!(job_id = %job.id, "Job cancelled"),
                Err(Stop::Failed(message)) => warn!(job_id = %job.id, error = %message, "Job failed"),
            }
            Some(Recorded {
                status,
                progress: final_progress,
                error_message,
                batch_next,
                batch_moved,
            })
        }
        Err(e) => {
            error!(job_id = %job.id, error = %e, "Failed to record job outcome");
            record_failure(&ctx, &job, &details, progress.percent(), &e).await
        }
    };

    if let Some(recorded) = recorded {
        let now = time::now();
        job.status = recorded.status;
        job.progress = recorded.progress;
        job.details = details;
        job.error_message = recorded.error_message;
        job.updated_at = now;
        job.completed_at = Some(now);

        if recorded.batch_moved {
            ctx.event_bus.emit_lossy(LitrevEvent::BatchStatusChanged {
                project_id: job.project_id,
                phase_id: ctx.phase_id,
                batch_id: job.batch_id,
                old_status: ctx.running_status,
                new_status: recorded.batch_next,
                timestamp: now,
            });
        } else {
            warn!(job_id = %job.id, batch_id = %job.batch_id, "Batch left its running status during the job");
        }
        ctx.event_bus.emit_lossy(job.to_event());
    }

    ctx.tracker.remove_token(job.id).await;
    drop(claim);
}

/// Second attempt after the terminal write failed: fail the job and restore the batch
///
/// If this write fails too the row stays unfinished; cancelling it after the
/// claim is released, or the next restart, fails it.
async fn record_failure(
    ctx: &JobContext,
    job: &AiJob,
    details: &serde_json::Value,
    percent: f64,
    cause: &litrev_common::Error,
) -> Option<Recorded> {
    let message = format!("Failed to record job outcome: {}", cause);
    let outcome = JobOutcome {
        status: JobStatus::Failed,
        progress: percent,
        details,
        error_message: Some(&message),
        batch_transition: (ctx.running_status, job.batch_status_before),
    };

    let finished = db::jobs::finish_job(&ctx.db, job.id, job.batch_id, &outcome).await;
    match finished {
        Ok(batch_moved) => {
            warn!(job_id = %job.id, "Job marked failed after its outcome could not be recorded");
            Some(Recorded {
                status: JobStatus::Failed,
                progress: percent,
                error_message: Some(message),
                batch_next: job.batch_status_before,
                batch_moved,
            })
        }
        Err(e) => {
            error!(job_id = %job.id, error = %e, "Failed to mark job as failed; row left unfinished");
            None
        }
    }
}

async fn run_articles(
    ctx: &JobContext,
    job: &mut AiJob,
    progress: &mut Progress,
    token: &CancellationToken,
) -> Result<(), Stop> {
    let articles = db::articles::articles_in_batch(&ctx.db, job.batch_id).await?;
    progress.total = articles.len();

    let dimensions = match job.job_type {
        JobType::Preclassification => db::dimensions::list_dimensions(&ctx.db, ctx.phase_id).await?,
        JobType::Translation => Vec::new(),
    };
    if job.job_type == JobType::Preclassification && dimensions.is_empty() {
        return Err(Stop::Failed("Phase has no dimensions".to_string()));
    }

    publish_progress(ctx, job, progress).await?;

    for article in &articles {
        if token.is_cancelled() {
            return Err(Stop::Cancelled);
        }
        progress.current_article_id = Some(article.id);

        match job.job_type {
            JobType::Translation => translate_article(ctx, article, progress).await?,
            JobType::Preclassification => {
                let judgments = ctx.ai.classify(article, &dimensions).await.map_err(|e| {
                    Stop::Failed(format!("Preclassification failed for article {}: {}", article.id, e))
                })?;
                for judgment in judgments {
                    let written = db::reviews::upsert_ai_review(
                        &ctx.db,
                        job.batch_id,
                        article.id,
                        judgment.dimension_id,
                        &judgment.value,
                        judgment.confidence,
                        judgment.rationale.as_deref(),
                    )
                    .await?;
                    if written {
                        progress.reviews_written += 1;
                    } else {
                        progress.human_reviews_kept += 1;
                    }
                }
            }
        }

        progress.processed += 1;
        publish_progress(ctx, job, progress).await?;
    }

    if token.is_cancelled() {
        return Err(Stop::Cancelled);
    }
    Ok(())
}

/// Translate title and abstract unless both are already translated
async fn translate_article(ctx: &JobContext, article: &Article, progress: &mut Progress) -> Result<(), Stop> {
    if article.is_translated() {
        progress.skipped += 1;
        return Ok(());
    }

    let failed = |e: AiError| Stop::Failed(format!("Translation failed for article {}: {}", article.id, e));

    let title = ctx.ai.translate(&article.title, &ctx.target_language).await.map_err(failed)?;
    let abstract_text = match article.abstract_text.as_deref() {
        Some(text) => Some(ctx.ai.translate(text, &ctx.target_language).await.map_err(failed)?),
        None => None,
    };

    db::articles::set_translation(&ctx.db, article.id, &title, abstract_text.as_deref()).await?;
    progress.translated += 1;
    Ok(())
}

async fn publish_progress(ctx: &JobContext, job: &mut AiJob, progress: &Progress) -> Result<(), Stop> {
    let details = progress.details(job.job_type);
    let percent = progress.percent();
    let updated_at = db::jobs::update_progress(&ctx.db, job.id, JobStatus::Running, percent, &details).await?;

    job.status = JobStatus::Running;
    job.progress = percent;
    job.details = details;
    job.updated_at = updated_at;
    ctx.event_bus.emit_lossy(job.to_event());
    Ok(())
}
