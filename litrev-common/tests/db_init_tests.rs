//! Tests for database initialization

use litrev_common::db::{ensure_setting, get_setting, init_database, init_in_memory_database, set_setting};

#[tokio::test]
async fn test_database_creation_when_missing() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("data").join("litrev.db");

    let pool = init_database(&db_path).await;
    assert!(pool.is_ok(), "Database initialization failed: {:?}", pool.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("litrev.db");

    let pool1 = init_database(&db_path).await.unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_all_tables_created() {
    let pool = init_in_memory_database().await.unwrap();

    for table in [
        "projects",
        "roles",
        "project_members",
        "articles",
        "phases",
        "dimensions",
        "batches",
        "batch_articles",
        "dimension_reviews",
        "ai_jobs",
        "notes",
        "signup_requests",
        "settings",
    ] {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1, "table {} missing", table);
    }
}

async fn insert_project_and_phase(pool: &sqlx::SqlitePool, phase_id: &str, number: i64, status: &str) {
    sqlx::query(
        "INSERT OR IGNORE INTO projects (id, name, created_by, created_at, updated_at) VALUES ('p1', 'P', 'u', '', '')",
    )
    .execute(pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO phases (id, project_id, name, phase_number, status, created_at, updated_at) VALUES (?, 'p1', 'Phase', ?, ?, '', '')",
    )
    .bind(phase_id)
    .bind(number)
    .bind(status)
    .execute(pool)
    .await
    .unwrap();
}

#[tokio::test]
async fn test_unique_index_rejects_second_active_phase() {
    let pool = init_in_memory_database().await.unwrap();
    insert_project_and_phase(&pool, "ph1", 1, "active").await;
    insert_project_and_phase(&pool, "ph2", 2, "inactive").await;

    let result = sqlx::query("UPDATE phases SET status = 'active' WHERE id = 'ph2'")
        .execute(&pool)
        .await;
    let err = result.expect_err("second active phase must violate the unique index");
    let common_err = litrev_common::Error::from(err);
    assert!(common_err.is_unique_violation());
}

#[tokio::test]
async fn test_phase_status_check_constraint() {
    let pool = init_in_memory_database().await.unwrap();
    insert_project_and_phase(&pool, "ph1", 1, "inactive").await;

    let result = sqlx::query("UPDATE phases SET status = 'paused' WHERE id = 'ph1'")
        .execute(&pool)
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_settings_helpers() {
    let pool = init_in_memory_database().await.unwrap();

    assert_eq!(get_setting(&pool, "missing").await.unwrap(), None);
    assert_eq!(ensure_setting(&pool, "k", "default").await.unwrap(), "default");
    assert_eq!(ensure_setting(&pool, "k", "other").await.unwrap(), "default");

    set_setting(&pool, "k", "changed").await.unwrap();
    assert_eq!(get_setting(&pool, "k").await.unwrap().as_deref(), Some("changed"));
}

#[tokio::test]
async fn test_default_settings_initialized() {
    let pool = init_in_memory_database().await.unwrap();
    let value = get_setting(&pool, litrev_common::db::JOB_DB_MAX_LOCK_WAIT_MS_KEY)
        .await
        .unwrap();
    assert_eq!(value.as_deref(), Some("5000"));
}
