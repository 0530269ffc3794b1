//! Article rows, search and eligibility queries

use litrev_common::{time, Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

use super::{get_timestamp, get_uuid};
use crate::models::{Article, ArticleInput};

const ARTICLE_COLUMNS: &str = "a.id, a.project_id, a.title, a.abstract, a.authors, a.publication_year, \
     a.doi, a.journal, a.language, a.title_translated, a.abstract_translated, a.created_at, a.updated_at";

fn row_to_article(row: &SqliteRow) -> Result<Article> {
    Ok(Article {
        id: get_uuid(row, "id")?,
        project_id: get_uuid(row, "project_id")?,
        title: row.try_get("title")?,
        abstract_text: row.try_get("abstract")?,
        authors: row.try_get("authors")?,
        publication_year: row.try_get("publication_year")?,
        doi: row.try_get("doi")?,
        journal: row.try_get("journal")?,
        language: row.try_get("language")?,
        title_translated: row.try_get("title_translated")?,
        abstract_translated: row.try_get("abstract_translated")?,
        created_at: get_timestamp(row, "created_at")?,
        updated_at: get_timestamp(row, "updated_at")?,
    })
}

async fn insert_article(conn: &mut SqliteConnection, project_id: Uuid, input: &ArticleInput) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let now = time::now_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO articles (
            id, project_id, title, abstract, authors, publication_year,
            doi, journal, language, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(project_id.to_string())
    .bind(&input.title)
    .bind(&input.abstract_text)
    .bind(&input.authors)
    .bind(input.publication_year)
    .bind(&input.doi)
    .bind(&input.journal)
    .bind(&input.language)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    Ok(id)
}

/// Insert one validated article
pub async fn create_article(pool: &SqlitePool, project_id: Uuid, input: &ArticleInput) -> Result<Article> {
    let mut conn = pool.acquire().await?;
    let id = insert_article(&mut *conn, project_id, input).await?;
    drop(conn);

    get_article(pool, project_id, id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Article {} vanished after insert", id)))
}

/// Outcome of a bulk import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ImportCounts {
    pub imported: usize,
    pub skipped_duplicates: usize,
}

/// Insert validated articles in one transaction, skipping DOIs already in
/// the project or repeated within the import
pub async fn import_articles(pool: &SqlitePool, project_id: Uuid, inputs: &[ArticleInput]) -> Result<ImportCounts> {
    let mut tx = pool.begin().await?;

    let existing: Vec<String> =
        sqlx::query_scalar("SELECT doi FROM articles WHERE project_id = ? AND doi IS NOT NULL")
            .bind(project_id.to_string())
            .fetch_all(&mut *tx)
            .await?;
    let mut seen: HashSet<String> = existing.into_iter().collect();

    let mut counts = ImportCounts::default();
    for input in inputs {
        if let Some(doi) = &input.doi {
            if !seen.insert(doi.clone()) {
                debug!(doi = %doi, "Skipping duplicate DOI");
                counts.skipped_duplicates += 1;
                continue;
            }
        }
        insert_article(&mut *tx, project_id, input).await?;
        counts.imported += 1;
    }

    tx.commit().await?;
    Ok(counts)
}

pub async fn doi_exists(pool: &SqlitePool, project_id: Uuid, doi: &str, except: Option<Uuid>) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM articles WHERE project_id = ? AND doi = ? AND (? IS NULL OR id != ?)",
    )
    .bind(project_id.to_string())
    .bind(doi)
    .bind(except.map(|id| id.to_string()))
    .bind(except.map(|id| id.to_string()))
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

fn search_pattern(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s.to_lowercase()))
}

pub async fn count_articles(pool: &SqlitePool, project_id: Uuid, search: Option<&str>) -> Result<i64> {
    let pattern = search_pattern(search);
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM articles a WHERE a.project_id = ? AND (? IS NULL OR LOWER(a.title) LIKE ?)",
    )
    .bind(project_id.to_string())
    .bind(&pattern)
    .bind(&pattern)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// One page of the project's articles, oldest first
pub async fn list_articles(
    pool: &SqlitePool,
    project_id: Uuid,
    search: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Article>> {
    let pattern = search_pattern(search);
    let rows = sqlx::query(&format!(
        r#"
        SELECT {} FROM articles a
        WHERE a.project_id = ? AND (? IS NULL OR LOWER(a.title) LIKE ?)
        ORDER BY a.created_at, a.id
        LIMIT ? OFFSET ?
        "#,
        ARTICLE_COLUMNS
    ))
    .bind(project_id.to_string())
    .bind(&pattern)
    .bind(&pattern)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_article).collect()
}

pub async fn get_article(pool: &SqlitePool, project_id: Uuid, article_id: Uuid) -> Result<Option<Article>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM articles a WHERE a.id = ? AND a.project_id = ?",
        ARTICLE_COLUMNS
    ))
    .bind(article_id.to_string())
    .bind(project_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_article).transpose()
}

/// Write every mutable column of `article`
pub async fn save_article(pool: &SqlitePool, article: &Article) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE articles SET
            title = ?, abstract = ?, authors = ?, publication_year = ?, doi = ?,
            journal = ?, language = ?, title_translated = ?, abstract_translated = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&article.title)
    .bind(&article.abstract_text)
    .bind(&article.authors)
    .bind(article.publication_year)
    .bind(&article.doi)
    .bind(&article.journal)
    .bind(&article.language)
    .bind(&article.title_translated)
    .bind(&article.abstract_translated)
    .bind(article.updated_at.to_rfc3339())
    .bind(article.id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_translation(
    pool: &SqlitePool,
    article_id: Uuid,
    title_translated: &str,
    abstract_translated: Option<&str>,
) -> Result<()> {
    sqlx::query(
        "UPDATE articles SET title_translated = ?, abstract_translated = ?, updated_at = ? WHERE id = ?",
    )
    .bind(title_translated)
    .bind(abstract_translated)
    .bind(time::now_rfc3339())
    .bind(article_id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_article(pool: &SqlitePool, article_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM articles WHERE id = ?")
        .bind(article_id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Batches holding the article that are neither completed nor discarded
pub async fn count_open_batches_for_article(pool: &SqlitePool, article_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM batch_articles ba
        JOIN batches b ON b.id = ba.batch_id
        WHERE ba.article_id = ? AND b.status NOT IN ('completed', 'discarded')
        "#,
    )
    .bind(article_id.to_string())
    .fetch_one(pool)
    .await?;
    Ok(count)
}

pub async fn articles_in_batch(pool: &SqlitePool, batch_id: Uuid) -> Result<Vec<Article>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {} FROM articles a
        JOIN batch_articles ba ON ba.article_id = a.id
        WHERE ba.batch_id = ?
        ORDER BY a.created_at, a.id
        "#,
        ARTICLE_COLUMNS
    ))
    .bind(batch_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_article).collect()
}

/// Articles that may join a new batch of `phase_id`
///
/// Excludes articles already in a non-discarded batch of the phase. With a
/// `predecessor`, only articles in one of its completed batches qualify.
pub async fn eligible_articles(
    pool: &SqlitePool,
    project_id: Uuid,
    phase_id: Uuid,
    predecessor: Option<Uuid>,
) -> Result<Vec<Article>> {
    let predecessor = predecessor.map(|id| id.to_string());
    let rows = sqlx::query(&format!(
        r#"
        SELECT {} FROM articles a
        WHERE a.project_id = ?
          AND NOT EXISTS (
              SELECT 1 FROM batch_articles ba
              JOIN batches b ON b.id = ba.batch_id
              WHERE ba.article_id = a.id AND b.phase_id = ? AND b.status != 'discarded'
          )
          AND (? IS NULL OR EXISTS (
              SELECT 1 FROM batch_articles ba
              JOIN batches b ON b.id = ba.batch_id
              WHERE ba.article_id = a.id AND b.phase_id = ? AND b.status = 'completed'
          ))
        ORDER BY a.created_at, a.id
        "#,
        ARTICLE_COLUMNS
    ))
    .bind(project_id.to_string())
    .bind(phase_id.to_string())
    .bind(&predecessor)
    .bind(&predecessor)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_article).collect()
}
