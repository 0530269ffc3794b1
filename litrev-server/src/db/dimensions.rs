//! Dimension rows

use litrev_common::{time, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{get_json, get_parsed, get_timestamp, get_uuid};
use crate::models::{Dimension, DimensionKind};

const DIMENSION_COLUMNS: &str = "id, phase_id, name, description, kind, options, position, created_at";

fn row_to_dimension(row: &SqliteRow) -> Result<Dimension> {
    Ok(Dimension {
        id: get_uuid(row, "id")?,
        phase_id: get_uuid(row, "phase_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        kind: get_parsed(row, "kind")?,
        options: get_json(row, "options")?,
        position: row.try_get("position")?,
        created_at: get_timestamp(row, "created_at")?,
    })
}

fn options_json(options: &[String]) -> Result<String> {
    serde_json::to_string(options)
        .map_err(|e| litrev_common::Error::Internal(format!("Failed to serialize options: {}", e)))
}

pub async fn list_dimensions(pool: &SqlitePool, phase_id: Uuid) -> Result<Vec<Dimension>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM dimensions WHERE phase_id = ? ORDER BY position, name",
        DIMENSION_COLUMNS
    ))
    .bind(phase_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_dimension).collect()
}

pub async fn get_dimension(pool: &SqlitePool, phase_id: Uuid, dimension_id: Uuid) -> Result<Option<Dimension>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM dimensions WHERE id = ? AND phase_id = ?",
        DIMENSION_COLUMNS
    ))
    .bind(dimension_id.to_string())
    .bind(phase_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_dimension).transpose()
}

pub async fn create_dimension(
    pool: &SqlitePool,
    phase_id: Uuid,
    name: &str,
    description: &str,
    kind: DimensionKind,
    options: &[String],
) -> Result<Dimension> {
    let id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO dimensions (id, phase_id, name, description, kind, options, position, created_at)
        VALUES (?, ?, ?, ?, ?, ?,
                (SELECT COALESCE(MAX(position), 0) + 1 FROM dimensions WHERE phase_id = ?),
                ?)
        "#,
    )
    .bind(id.to_string())
    .bind(phase_id.to_string())
    .bind(name)
    .bind(description)
    .bind(kind.as_str())
    .bind(options_json(options)?)
    .bind(phase_id.to_string())
    .bind(time::now_rfc3339())
    .execute(pool)
    .await?;

    get_dimension(pool, phase_id, id)
        .await?
        .ok_or_else(|| litrev_common::Error::Internal(format!("Dimension {} vanished after insert", id)))
}

pub async fn update_dimension(pool: &SqlitePool, dimension: &Dimension) -> Result<()> {
    sqlx::query(
        "UPDATE dimensions SET name = ?, description = ?, kind = ?, options = ?, position = ? WHERE id = ?",
    )
    .bind(&dimension.name)
    .bind(&dimension.description)
    .bind(dimension.kind.as_str())
    .bind(options_json(&dimension.options)?)
    .bind(dimension.position)
    .bind(dimension.id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_dimension(pool: &SqlitePool, dimension_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM dimensions WHERE id = ?")
        .bind(dimension_id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn count_reviews(pool: &SqlitePool, dimension_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dimension_reviews WHERE dimension_id = ?")
        .bind(dimension_id.to_string())
        .fetch_one(pool)
        .await?;
    Ok(count)
}
