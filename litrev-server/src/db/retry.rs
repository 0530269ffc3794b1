//! Retry of writes that hit SQLite lock contention
//!
//! Job workers write progress while request handlers read and write the same
//! tables. A write that fails with "database is locked" is retried with
//! exponential backoff (10ms doubling, capped at 1s) until the
//! `job_db_max_lock_wait_ms` setting is exhausted. Other errors fail at once.

use litrev_common::db::{get_setting, JOB_DB_MAX_LOCK_WAIT_MS_KEY};
use litrev_common::{Error, Result};
use sqlx::SqlitePool;
use std::future::Future;
use std::time::{Duration, Instant};

const DEFAULT_MAX_LOCK_WAIT_MS: u64 = 5000;
const MAX_BACKOFF_MS: u64 = 1000;

/// Current retry budget from settings, falling back to 5000ms
pub async fn max_lock_wait_ms(pool: &SqlitePool) -> u64 {
    match get_setting(pool, JOB_DB_MAX_LOCK_WAIT_MS_KEY).await {
        Ok(Some(value)) => value.trim().parse().unwrap_or(DEFAULT_MAX_LOCK_WAIT_MS),
        Ok(None) => DEFAULT_MAX_LOCK_WAIT_MS,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read lock wait setting, using default");
            DEFAULT_MAX_LOCK_WAIT_MS
        }
    }
}

/// Run `operation`, retrying lock errors until `max_wait_ms` elapses
pub async fn retry_on_lock<F, Fut, T>(operation_name: &str, max_wait_ms: u64, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let start = Instant::now();
    let max_duration = Duration::from_millis(max_wait_ms);
    let mut attempt = 0u32;
    let mut backoff_ms = 10u64;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Database write succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) if !err.is_lock_error() => return Err(err),
            Err(_) => {
                let elapsed = start.elapsed();
                if elapsed >= max_duration {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = elapsed.as_millis() as u64,
                        max_wait_ms,
                        "Database still locked, giving up"
                    );
                    return Err(Error::Internal(format!(
                        "Database locked after {} attempts ({} ms elapsed, max {} ms)",
                        attempt,
                        elapsed.as_millis(),
                        max_wait_ms
                    )));
                }

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms,
                    "Database locked, retrying"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locked() -> Error {
        Error::Database(sqlx::Error::Protocol("database is locked".to_string()))
    }

    #[tokio::test]
    async fn test_succeeds_first_attempt() {
        let result = retry_on_lock("test_op", 100, || async { Ok::<_, Error>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retries_lock_errors_until_success() {
        let mut attempts = 0;
        let result = retry_on_lock("test_op", 5000, || {
            attempts += 1;
            let current = attempts;
            async move {
                if current < 3 {
                    Err(locked())
                } else {
                    Ok(current)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_wait() {
        let result = retry_on_lock("test_op", 30, || async { Err::<i32, _>(locked()) }).await;
        match result {
            Err(Error::Internal(msg)) => assert!(msg.contains("Database locked")),
            other => panic!("expected Internal error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_other_errors_fail_immediately() {
        let mut attempts = 0;
        let result = retry_on_lock("test_op", 5000, || {
            attempts += 1;
            async { Err::<i32, _>(Error::Internal("other".to_string())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn test_budget_read_from_settings() {
        let pool = litrev_common::db::init_in_memory_database().await.unwrap();
        assert_eq!(max_lock_wait_ms(&pool).await, 5000);

        litrev_common::db::set_setting(&pool, JOB_DB_MAX_LOCK_WAIT_MS_KEY, "250")
            .await
            .unwrap();
        assert_eq!(max_lock_wait_ms(&pool).await, 250);
    }
}
