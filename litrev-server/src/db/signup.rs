//! Sign-up request storage

use litrev_common::{time, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::ValidSignup;

/// Store a request; only a hash of the client key is kept
pub async fn insert_signup_request(pool: &SqlitePool, request: &ValidSignup, client_key_hash: &str) -> Result<Uuid> {
    let id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO signup_requests (id, email, name, institution, message, client_key_hash, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(&request.email)
    .bind(&request.name)
    .bind(&request.institution)
    .bind(&request.message)
    .bind(client_key_hash)
    .bind(time::now_rfc3339())
    .execute(pool)
    .await?;

    Ok(id)
}

pub async fn count_signup_requests(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM signup_requests")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
