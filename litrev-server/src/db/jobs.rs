//! AI job rows
//!
//! Progress and terminal writes go through [`retry_on_lock`] so a worker is
//! not failed by a momentary lock held by a request handler.

use chrono::{DateTime, Utc};
use litrev_common::{time, BatchStatus, Error, JobStatus, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::batches::set_batch_status_on;
use super::retry::{max_lock_wait_ms, retry_on_lock};
use super::{get_json, get_opt_timestamp, get_parsed, get_timestamp, get_uuid};
use crate::models::AiJob;

const JOB_COLUMNS: &str = "id, project_id, batch_id, job_type, status, progress, details, error_message, \
     batch_status_before, submitted_by, created_at, updated_at, completed_at";

fn row_to_job(row: &SqliteRow) -> Result<AiJob> {
    Ok(AiJob {
        id: get_uuid(row, "id")?,
        project_id: get_uuid(row, "project_id")?,
        batch_id: get_uuid(row, "batch_id")?,
        job_type: get_parsed(row, "job_type")?,
        status: get_parsed(row, "status")?,
        progress: row.try_get("progress")?,
        details: get_json(row, "details")?,
        error_message: row.try_get("error_message")?,
        batch_status_before: get_parsed(row, "batch_status_before")?,
        submitted_by: row.try_get("submitted_by")?,
        created_at: get_timestamp(row, "created_at")?,
        updated_at: get_timestamp(row, "updated_at")?,
        completed_at: get_opt_timestamp(row, "completed_at")?,
    })
}

fn details_json(details: &serde_json::Value) -> String {
    details.to_string()
}

/// Insert a queued job and move its batch into `running_status` atomically
///
/// Returns false (and writes nothing) when the batch left
/// `job.batch_status_before` in the meantime.
pub async fn insert_job_claiming_batch(pool: &SqlitePool, job: &AiJob, running_status: BatchStatus) -> Result<bool> {
    let mut tx = pool.begin().await?;

    let claimed = set_batch_status_on(&mut *tx, job.batch_id, job.batch_status_before, running_status).await?;
    if !claimed {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query(
        r#"
        INSERT INTO ai_jobs (
            id, project_id, batch_id, job_type, status, progress, details, error_message,
            batch_status_before, submitted_by, created_at, updated_at, completed_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL)
        "#,
    )
    .bind(job.id.to_string())
    .bind(job.project_id.to_string())
    .bind(job.batch_id.to_string())
    .bind(job.job_type.as_str())
    .bind(job.status.as_str())
    .bind(job.progress)
    .bind(details_json(&job.details))
    .bind(&job.error_message)
    .bind(job.batch_status_before.as_str())
    .bind(&job.submitted_by)
    .bind(job.created_at.to_rfc3339())
    .bind(job.updated_at.to_rfc3339())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}

pub async fn get_job(pool: &SqlitePool, job_id: Uuid) -> Result<Option<AiJob>> {
    let row = sqlx::query(&format!("SELECT {} FROM ai_jobs WHERE id = ?", JOB_COLUMNS))
        .bind(job_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(row_to_job).transpose()
}

/// Job history of a project, newest first
pub async fn list_jobs(pool: &SqlitePool, project_id: Uuid, batch_id: Option<Uuid>, limit: i64) -> Result<Vec<AiJob>> {
    let batch_id = batch_id.map(|id| id.to_string());
    let rows = sqlx::query(&format!(
        r#"
        SELECT {} FROM ai_jobs
        WHERE project_id = ? AND (? IS NULL OR batch_id = ?)
        ORDER BY created_at DESC
        LIMIT ?
        "#,
        JOB_COLUMNS
    ))
    .bind(project_id.to_string())
    .bind(&batch_id)
    .bind(&batch_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_job).collect()
}

pub async fn count_active_jobs_for_batch(pool: &SqlitePool, batch_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM ai_jobs WHERE batch_id = ? AND status IN ('queued', 'running')",
    )
    .bind(batch_id.to_string())
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Jobs a previous process left queued or running
pub async fn list_unfinished_jobs(pool: &SqlitePool) -> Result<Vec<AiJob>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM ai_jobs WHERE status IN ('queued', 'running') ORDER BY created_at",
        JOB_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_job).collect()
}

/// Persist status, progress and details of a non-terminal job
pub async fn update_progress(
    pool: &SqlitePool,
    job_id: Uuid,
    status: JobStatus,
    progress: f64,
    details: &serde_json::Value,
) -> Result<DateTime<Utc>> {
    let max_wait_ms = max_lock_wait_ms(pool).await;
    let details = details_json(details);
    let job_id = job_id.to_string();

    retry_on_lock("update_job_progress", max_wait_ms, || async {
        let now = time::now();
        sqlx::query(
            "UPDATE ai_jobs SET status = ?, progress = ?, details = ?, updated_at = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(progress)
        .bind(&details)
        .bind(now.to_rfc3339())
        .bind(&job_id)
        .execute(pool)
        .await
        .map_err(Error::Database)?;
        Ok::<_, Error>(now)
    })
    .await
}

/// Final state of a job, together with its batch
pub struct JobOutcome<'a> {
    pub status: JobStatus,
    pub progress: f64,
    pub details: &'a serde_json::Value,
    pub error_message: Option<&'a str>,
    /// Batch status compare-and-set: (expected, new)
    pub batch_transition: (BatchStatus, BatchStatus),
}

/// Write a terminal job row and move the batch in one transaction
///
/// Only a queued or running row is finished; a row that is already terminal
/// yields `NotFound` and leaves the batch alone. Returns whether the batch
/// transition applied.
pub async fn finish_job(pool: &SqlitePool, job_id: Uuid, batch_id: Uuid, outcome: &JobOutcome<'_>) -> Result<bool> {
    let max_wait_ms = max_lock_wait_ms(pool).await;
    let details = details_json(outcome.details);
    let job_id = job_id.to_string();
    let (expected, next) = outcome.batch_transition;

    retry_on_lock("finish_job", max_wait_ms, || async {
        let now = time::now_rfc3339();
        let mut tx = pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE ai_jobs
            SET status = ?, progress = ?, details = ?, error_message = ?,
                updated_at = ?, completed_at = ?
            WHERE id = ? AND status IN ('queued', 'running')
            "#,
        )
        .bind(outcome.status.as_str())
        .bind(outcome.progress)
        .bind(&details)
        .bind(outcome.error_message)
        .bind(&now)
        .bind(&now)
        .bind(&job_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(Error::NotFound(format!("Unfinished job {}", job_id)));
        }

        let moved = set_batch_status_on(&mut *tx, batch_id, expected, next).await?;
        tx.commit().await?;
        Ok::<_, Error>(moved)
    })
    .await
}

pub async fn count_active_jobs_for_project(pool: &SqlitePool, project_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM ai_jobs WHERE project_id = ? AND status IN ('queued', 'running')",
    )
    .bind(project_id.to_string())
    .fetch_one(pool)
    .await?;
    Ok(count)
}
