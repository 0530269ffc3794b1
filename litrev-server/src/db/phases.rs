//! Phase rows and the counts the lifecycle guard needs

use litrev_common::{time, BatchStatus, PhaseStatus, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{get_parsed, get_timestamp, get_uuid};
use crate::models::Phase;

const PHASE_COLUMNS: &str =
    "id, project_id, name, description, phase_number, status, created_at, updated_at";

fn row_to_phase(row: &SqliteRow) -> Result<Phase> {
    Ok(Phase {
        id: get_uuid(row, "id")?,
        project_id: get_uuid(row, "project_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        phase_number: row.try_get("phase_number")?,
        status: get_parsed(row, "status")?,
        created_at: get_timestamp(row, "created_at")?,
        updated_at: get_timestamp(row, "updated_at")?,
    })
}

/// Append a phase after the highest existing number
pub async fn create_phase(pool: &SqlitePool, project_id: Uuid, name: &str, description: &str) -> Result<Phase> {
    let now = time::now();
    let id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO phases (id, project_id, name, description, phase_number, status, created_at, updated_at)
        VALUES (?, ?, ?, ?,
                (SELECT COALESCE(MAX(phase_number), 0) + 1 FROM phases WHERE project_id = ?),
                'inactive', ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(project_id.to_string())
    .bind(name)
    .bind(description)
    .bind(project_id.to_string())
    .bind(now.to_rfc3339())
    .bind(now.to_rfc3339())
    .execute(pool)
    .await?;

    get_phase(pool, project_id, id)
        .await?
        .ok_or_else(|| litrev_common::Error::Internal(format!("Phase {} vanished after insert", id)))
}

pub async fn list_phases(pool: &SqlitePool, project_id: Uuid) -> Result<Vec<Phase>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM phases WHERE project_id = ? ORDER BY phase_number",
        PHASE_COLUMNS
    ))
    .bind(project_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_phase).collect()
}

pub async fn get_phase(pool: &SqlitePool, project_id: Uuid, phase_id: Uuid) -> Result<Option<Phase>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM phases WHERE id = ? AND project_id = ?",
        PHASE_COLUMNS
    ))
    .bind(phase_id.to_string())
    .bind(project_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_phase).transpose()
}

pub async fn update_phase_labels(pool: &SqlitePool, phase: &Phase) -> Result<()> {
    sqlx::query("UPDATE phases SET name = ?, description = ?, updated_at = ? WHERE id = ?")
        .bind(&phase.name)
        .bind(&phase.description)
        .bind(time::now_rfc3339())
        .bind(phase.id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/// Compare-and-set the status; false when the row no longer has `from`
pub async fn set_phase_status(
    pool: &SqlitePool,
    phase_id: Uuid,
    from: PhaseStatus,
    to: PhaseStatus,
) -> Result<bool> {
    let result = sqlx::query("UPDATE phases SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
        .bind(to.as_str())
        .bind(time::now_rfc3339())
        .bind(phase_id.to_string())
        .bind(from.as_str())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn delete_phase(pool: &SqlitePool, phase_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM phases WHERE id = ?")
        .bind(phase_id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Active phase of the project other than `except`
pub async fn find_other_active_phase(pool: &SqlitePool, project_id: Uuid, except: Uuid) -> Result<Option<Uuid>> {
    let id: Option<String> = sqlx::query_scalar(
        "SELECT id FROM phases WHERE project_id = ? AND status = 'active' AND id != ? LIMIT 1",
    )
    .bind(project_id.to_string())
    .bind(except.to_string())
    .fetch_optional(pool)
    .await?;

    id.as_deref().map(crate::models::parse_uuid).transpose()
}

/// Nearest non-annulled phase numbered below `phase_number`
pub async fn nearest_predecessor(pool: &SqlitePool, project_id: Uuid, phase_number: i64) -> Result<Option<Phase>> {
    let row = sqlx::query(&format!(
        r#"
        SELECT {} FROM phases
        WHERE project_id = ? AND phase_number < ? AND status != 'annulled'
        ORDER BY phase_number DESC
        LIMIT 1
        "#,
        PHASE_COLUMNS
    ))
    .bind(project_id.to_string())
    .bind(phase_number)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_phase).transpose()
}

pub async fn count_batches(pool: &SqlitePool, phase_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM batches WHERE phase_id = ?")
        .bind(phase_id.to_string())
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn count_dimensions(pool: &SqlitePool, phase_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dimensions WHERE phase_id = ?")
        .bind(phase_id.to_string())
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Batches of the phase not yet completed or discarded
pub async fn count_open_batches(pool: &SqlitePool, phase_id: Uuid) -> Result<i64> {
    let placeholders = vec!["?"; BatchStatus::NON_TERMINAL.len()].join(", ");
    let sql = format!(
        "SELECT COUNT(*) FROM batches WHERE phase_id = ? AND status IN ({})",
        placeholders
    );

    let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(phase_id.to_string());
    for status in BatchStatus::NON_TERMINAL {
        query = query.bind(status.as_str());
    }
    Ok(query.fetch_one(pool).await?)
}

/// Queued or running jobs on any batch of the phase
pub async fn count_active_jobs(pool: &SqlitePool, phase_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM ai_jobs j
        JOIN batches b ON b.id = j.batch_id
        WHERE b.phase_id = ? AND j.status IN ('queued', 'running')
        "#,
    )
    .bind(phase_id.to_string())
    .fetch_one(pool)
    .await?;
    Ok(count)
}
