//! Database initialization
//!
//! Opens (creating if needed) the SQLite database and brings the schema up
//! to date. Every statement is idempotent, so initialization runs on every
//! startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Current schema version recorded in `schema_version`
pub const SCHEMA_VERSION: i64 = 1;

/// Setting key: max total milliseconds to retry a locked job write
pub const JOB_DB_MAX_LOCK_WAIT_MS_KEY: &str = "job_db_max_lock_wait_ms";

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        // WAL allows concurrent readers while a job worker writes progress
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// In-memory database with the full schema
///
/// Limited to one connection: every `:memory:` connection is a separate
/// database.
pub async fn init_in_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    create_schema(&pool).await?;
    Ok(pool)
}

/// Create all tables and indexes
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_settings_table(pool).await?;

    create_projects_table(pool).await?;
    create_roles_table(pool).await?;
    create_project_members_table(pool).await?;

    create_articles_table(pool).await?;
    create_phases_table(pool).await?;
    create_dimensions_table(pool).await?;
    create_batches_table(pool).await?;
    create_batch_articles_table(pool).await?;
    create_dimension_reviews_table(pool).await?;
    create_ai_jobs_table(pool).await?;

    create_notes_table(pool).await?;
    create_signup_requests_table(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    init_default_settings(pool).await?;

    Ok(())
}

/// Ensure runtime settings exist with their defaults
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    // Upper bound for retrying job progress writes under lock contention
    crate::db::settings::ensure_setting(pool, JOB_DB_MAX_LOCK_WAIT_MS_KEY, "5000").await?;
    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the settings table
///
/// Stores runtime key-value settings.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_projects_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_roles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS roles (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            can_manage_project INTEGER NOT NULL DEFAULT 0,
            can_manage_members INTEGER NOT NULL DEFAULT 0,
            can_manage_phases INTEGER NOT NULL DEFAULT 0,
            can_manage_articles INTEGER NOT NULL DEFAULT 0,
            can_run_ai_jobs INTEGER NOT NULL DEFAULT 0,
            can_write_notes INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            UNIQUE (project_id, name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_project_members_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS project_members (
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL,
            role_id TEXT NOT NULL REFERENCES roles(id),
            joined_at TEXT NOT NULL,
            PRIMARY KEY (project_id, user_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_project_members_user ON project_members(user_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_articles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS articles (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            abstract TEXT,
            authors TEXT,
            publication_year INTEGER,
            doi TEXT,
            journal TEXT,
            language TEXT,
            title_translated TEXT,
            abstract_translated TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_articles_project ON articles(project_id, created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_phases_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS phases (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            phase_number INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'inactive'
                CHECK (status IN ('inactive', 'active', 'completed', 'annulled')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (project_id, phase_number)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Backstop for the single-active-phase rule when two activations race
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_phases_single_active
        ON phases(project_id) WHERE status = 'active'
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_dimensions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dimensions (
            id TEXT PRIMARY KEY,
            phase_id TEXT NOT NULL REFERENCES phases(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            kind TEXT NOT NULL CHECK (kind IN ('boolean', 'categorical', 'text')),
            options TEXT NOT NULL DEFAULT '[]',
            position INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (phase_id, name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_batches_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS batches (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            phase_id TEXT NOT NULL REFERENCES phases(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            batch_number INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (phase_id, batch_number)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_batch_articles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS batch_articles (
            batch_id TEXT NOT NULL REFERENCES batches(id) ON DELETE CASCADE,
            article_id TEXT NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
            PRIMARY KEY (batch_id, article_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_batch_articles_article ON batch_articles(article_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_dimension_reviews_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dimension_reviews (
            id TEXT PRIMARY KEY,
            batch_id TEXT NOT NULL REFERENCES batches(id) ON DELETE CASCADE,
            article_id TEXT NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
            dimension_id TEXT NOT NULL REFERENCES dimensions(id) ON DELETE CASCADE,
            value TEXT NOT NULL,
            confidence REAL,
            rationale TEXT,
            source TEXT NOT NULL CHECK (source IN ('ai', 'human')),
            reviewer_id TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (batch_id, article_id, dimension_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_ai_jobs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ai_jobs (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            batch_id TEXT NOT NULL REFERENCES batches(id) ON DELETE CASCADE,
            job_type TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'queued',
            progress REAL NOT NULL DEFAULT 0.0,
            details TEXT NOT NULL DEFAULT '{}',
            error_message TEXT,
            batch_status_before TEXT NOT NULL,
            submitted_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            completed_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_ai_jobs_batch_status ON ai_jobs(batch_id, status)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_notes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notes (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            article_id TEXT REFERENCES articles(id) ON DELETE SET NULL,
            author_id TEXT NOT NULL,
            title TEXT NOT NULL,
            content TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_signup_requests_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS signup_requests (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            name TEXT,
            institution TEXT,
            message TEXT,
            client_key_hash TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
