//! Key-value runtime settings

use crate::Result;
use sqlx::SqlitePool;

/// Read a setting, `None` when absent or NULL
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    Ok(value.flatten())
}

/// Insert or replace a setting
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}

/// Write `default` only when the key is missing or NULL, return the stored value
pub async fn ensure_setting(pool: &SqlitePool, key: &str, default: &str) -> Result<String> {
    match get_setting(pool, key).await? {
        Some(value) => Ok(value),
        None => {
            set_setting(pool, key, default).await?;
            Ok(default.to_string())
        }
    }
}
