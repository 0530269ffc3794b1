//! Dimension review rows
//!
//! One row per (batch, article, dimension). AI runs replace earlier AI rows
//! but leave human rows untouched; a human write always wins.

use litrev_common::{time, Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{get_parsed, get_timestamp, get_uuid};
use crate::models::DimensionReview;

const REVIEW_COLUMNS: &str = "id, batch_id, article_id, dimension_id, value, confidence, rationale, \
     source, reviewer_id, created_at, updated_at";

fn row_to_review(row: &SqliteRow) -> Result<DimensionReview> {
    Ok(DimensionReview {
        id: get_uuid(row, "id")?,
        batch_id: get_uuid(row, "batch_id")?,
        article_id: get_uuid(row, "article_id")?,
        dimension_id: get_uuid(row, "dimension_id")?,
        value: row.try_get("value")?,
        confidence: row.try_get("confidence")?,
        rationale: row.try_get("rationale")?,
        source: get_parsed(row, "source")?,
        reviewer_id: row.try_get("reviewer_id")?,
        created_at: get_timestamp(row, "created_at")?,
        updated_at: get_timestamp(row, "updated_at")?,
    })
}

pub async fn list_reviews(pool: &SqlitePool, batch_id: Uuid) -> Result<Vec<DimensionReview>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM dimension_reviews WHERE batch_id = ? ORDER BY article_id, dimension_id",
        REVIEW_COLUMNS
    ))
    .bind(batch_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_review).collect()
}

async fn get_review(pool: &SqlitePool, batch_id: Uuid, article_id: Uuid, dimension_id: Uuid) -> Result<Option<DimensionReview>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM dimension_reviews WHERE batch_id = ? AND article_id = ? AND dimension_id = ?",
        REVIEW_COLUMNS
    ))
    .bind(batch_id.to_string())
    .bind(article_id.to_string())
    .bind(dimension_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_review).transpose()
}

/// Insert or overwrite with a human judgment
pub async fn upsert_human_review(
    pool: &SqlitePool,
    batch_id: Uuid,
    article_id: Uuid,
    dimension_id: Uuid,
    value: &str,
    rationale: Option<&str>,
    reviewer_id: &str,
) -> Result<DimensionReview> {
    let now = time::now_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO dimension_reviews (
            id, batch_id, article_id, dimension_id, value, confidence, rationale,
            source, reviewer_id, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, NULL, ?, 'human', ?, ?, ?)
        ON CONFLICT (batch_id, article_id, dimension_id) DO UPDATE SET
            value = excluded.value,
            confidence = NULL,
            rationale = excluded.rationale,
            source = 'human',
            reviewer_id = excluded.reviewer_id,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(batch_id.to_string())
    .bind(article_id.to_string())
    .bind(dimension_id.to_string())
    .bind(value)
    .bind(rationale)
    .bind(reviewer_id)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    get_review(pool, batch_id, article_id, dimension_id)
        .await?
        .ok_or_else(|| Error::Internal("Review vanished after upsert".to_string()))
}

/// Write an AI judgment; returns false when a human review holds the slot
pub async fn upsert_ai_review(
    pool: &SqlitePool,
    batch_id: Uuid,
    article_id: Uuid,
    dimension_id: Uuid,
    value: &str,
    confidence: f64,
    rationale: Option<&str>,
) -> Result<bool> {
    let now = time::now_rfc3339();

    let result = sqlx::query(
        r#"
        INSERT INTO dimension_reviews (
            id, batch_id, article_id, dimension_id, value, confidence, rationale,
            source, reviewer_id, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, 'ai', NULL, ?, ?)
        ON CONFLICT (batch_id, article_id, dimension_id) DO UPDATE SET
            value = excluded.value,
            confidence = excluded.confidence,
            rationale = excluded.rationale,
            updated_at = excluded.updated_at
        WHERE dimension_reviews.source = 'ai'
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(batch_id.to_string())
    .bind(article_id.to_string())
    .bind(dimension_id.to_string())
    .bind(value)
    .bind(confidence)
    .bind(rationale)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
