//! Batch rows and batch membership

use litrev_common::{time, BatchStatus, Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{get_parsed, get_timestamp, get_uuid};
use crate::models::{parse_uuid, Batch, BatchDetail};

const BATCH_SELECT: &str = r#"
    SELECT b.id, b.project_id, b.phase_id, b.name, b.batch_number, b.status,
           b.created_at, b.updated_at,
           (SELECT COUNT(*) FROM batch_articles ba WHERE ba.batch_id = b.id) AS article_count
    FROM batches b
"#;

fn row_to_batch(row: &SqliteRow) -> Result<Batch> {
    Ok(Batch {
        id: get_uuid(row, "id")?,
        project_id: get_uuid(row, "project_id")?,
        phase_id: get_uuid(row, "phase_id")?,
        name: row.try_get("name")?,
        batch_number: row.try_get("batch_number")?,
        status: get_parsed(row, "status")?,
        article_count: row.try_get("article_count")?,
        created_at: get_timestamp(row, "created_at")?,
        updated_at: get_timestamp(row, "updated_at")?,
    })
}

/// Insert a batch with its articles; number is the next free one in the phase
pub async fn create_batch(
    pool: &SqlitePool,
    project_id: Uuid,
    phase_id: Uuid,
    name: Option<&str>,
    article_ids: &[Uuid],
) -> Result<BatchDetail> {
    let id = Uuid::new_v4();
    let now = time::now_rfc3339();
    let mut tx = pool.begin().await?;

    let batch_number: i64 =
        sqlx::query_scalar("SELECT COALESCE(MAX(batch_number), 0) + 1 FROM batches WHERE phase_id = ?")
            .bind(phase_id.to_string())
            .fetch_one(&mut *tx)
            .await?;
    let name = name
        .map(str::to_string)
        .unwrap_or_else(|| format!("Batch {}", batch_number));

    sqlx::query(
        r#"
        INSERT INTO batches (id, project_id, phase_id, name, batch_number, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, 'pending', ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(project_id.to_string())
    .bind(phase_id.to_string())
    .bind(&name)
    .bind(batch_number)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    for article_id in article_ids {
        sqlx::query("INSERT INTO batch_articles (batch_id, article_id) VALUES (?, ?)")
            .bind(id.to_string())
            .bind(article_id.to_string())
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    let batch = get_batch(pool, project_id, id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Batch {} vanished after insert", id)))?;
    Ok(BatchDetail {
        batch,
        article_ids: article_ids.to_vec(),
    })
}

pub async fn list_batches(pool: &SqlitePool, phase_id: Uuid) -> Result<Vec<Batch>> {
    let rows = sqlx::query(&format!("{} WHERE b.phase_id = ? ORDER BY b.batch_number", BATCH_SELECT))
        .bind(phase_id.to_string())
        .fetch_all(pool)
        .await?;

    rows.iter().map(row_to_batch).collect()
}

pub async fn get_batch(pool: &SqlitePool, project_id: Uuid, batch_id: Uuid) -> Result<Option<Batch>> {
    let row = sqlx::query(&format!("{} WHERE b.id = ? AND b.project_id = ?", BATCH_SELECT))
        .bind(batch_id.to_string())
        .bind(project_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(row_to_batch).transpose()
}

pub async fn batch_article_ids(pool: &SqlitePool, batch_id: Uuid) -> Result<Vec<Uuid>> {
    let ids: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT ba.article_id
        FROM batch_articles ba
        JOIN articles a ON a.id = ba.article_id
        WHERE ba.batch_id = ?
        ORDER BY a.created_at, a.id
        "#,
    )
    .bind(batch_id.to_string())
    .fetch_all(pool)
    .await?;

    ids.iter().map(|id| parse_uuid(id)).collect()
}

/// Compare-and-set on an open connection; false when the status moved on
pub async fn set_batch_status_on(
    conn: &mut SqliteConnection,
    batch_id: Uuid,
    from: BatchStatus,
    to: BatchStatus,
) -> Result<bool> {
    let result = sqlx::query("UPDATE batches SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
        .bind(to.as_str())
        .bind(time::now_rfc3339())
        .bind(batch_id.to_string())
        .bind(from.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn set_batch_status(pool: &SqlitePool, batch_id: Uuid, from: BatchStatus, to: BatchStatus) -> Result<bool> {
    let mut conn = pool.acquire().await?;
    set_batch_status_on(&mut *conn, batch_id, from, to).await
}

pub async fn delete_batch(pool: &SqlitePool, batch_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM batches WHERE id = ?")
        .bind(batch_id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
