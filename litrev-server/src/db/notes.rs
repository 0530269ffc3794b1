//! Note rows

use litrev_common::{time, Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{get_opt_uuid, get_timestamp, get_uuid};
use crate::models::Note;

const NOTE_COLUMNS: &str = "id, project_id, article_id, author_id, title, content, created_at, updated_at";

fn row_to_note(row: &SqliteRow) -> Result<Note> {
    Ok(Note {
        id: get_uuid(row, "id")?,
        project_id: get_uuid(row, "project_id")?,
        article_id: get_opt_uuid(row, "article_id")?,
        author_id: row.try_get("author_id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        created_at: get_timestamp(row, "created_at")?,
        updated_at: get_timestamp(row, "updated_at")?,
    })
}

pub async fn create_note(
    pool: &SqlitePool,
    project_id: Uuid,
    article_id: Option<Uuid>,
    author_id: &str,
    title: &str,
    content: &str,
) -> Result<Note> {
    let id = Uuid::new_v4();
    let now = time::now_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO notes (id, project_id, article_id, author_id, title, content, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(project_id.to_string())
    .bind(article_id.map(|a| a.to_string()))
    .bind(author_id)
    .bind(title)
    .bind(content)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    get_note(pool, project_id, id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Note {} vanished after insert", id)))
}

/// Notes of a project, most recently edited first
pub async fn list_notes(pool: &SqlitePool, project_id: Uuid, article_id: Option<Uuid>) -> Result<Vec<Note>> {
    let article_id = article_id.map(|a| a.to_string());
    let rows = sqlx::query(&format!(
        "SELECT {} FROM notes WHERE project_id = ? AND (? IS NULL OR article_id = ?) ORDER BY updated_at DESC",
        NOTE_COLUMNS
    ))
    .bind(project_id.to_string())
    .bind(&article_id)
    .bind(&article_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_note).collect()
}

pub async fn get_note(pool: &SqlitePool, project_id: Uuid, note_id: Uuid) -> Result<Option<Note>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM notes WHERE id = ? AND project_id = ?",
        NOTE_COLUMNS
    ))
    .bind(note_id.to_string())
    .bind(project_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_note).transpose()
}

pub async fn update_note(pool: &SqlitePool, note: &Note) -> Result<()> {
    sqlx::query("UPDATE notes SET title = ?, content = ?, article_id = ?, updated_at = ? WHERE id = ?")
        .bind(&note.title)
        .bind(&note.content)
        .bind(note.article_id.map(|a| a.to_string()))
        .bind(note.updated_at.to_rfc3339())
        .bind(note.id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_note(pool: &SqlitePool, note_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM notes WHERE id = ?")
        .bind(note_id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
