//! Database access for litrev-server
//!
//! One module per table group. Functions take the pool (or an open
//! transaction) and return `litrev_common::Result`; rows are mapped by hand
//! from TEXT columns.

pub mod articles;
pub mod batches;
pub mod dimensions;
pub mod jobs;
pub mod members;
pub mod notes;
pub mod phases;
pub mod projects;
pub mod retry;
pub mod reviews;
pub mod roles;
pub mod signup;

pub use retry::retry_on_lock;

use chrono::{DateTime, Utc};
use litrev_common::{time::parse_rfc3339, Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;
use uuid::Uuid;

use crate::models::parse_uuid;

pub(crate) fn get_uuid(row: &SqliteRow, column: &str) -> Result<Uuid> {
    let value: String = row.try_get(column)?;
    parse_uuid(&value)
}

pub(crate) fn get_opt_uuid(row: &SqliteRow, column: &str) -> Result<Option<Uuid>> {
    let value: Option<String> = row.try_get(column)?;
    value.as_deref().map(parse_uuid).transpose()
}

pub(crate) fn get_timestamp(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>> {
    let value: String = row.try_get(column)?;
    parse_rfc3339(&value)
}

pub(crate) fn get_opt_timestamp(row: &SqliteRow, column: &str) -> Result<Option<DateTime<Utc>>> {
    let value: Option<String> = row.try_get(column)?;
    value.as_deref().map(parse_rfc3339).transpose()
}

/// Parse a status-like TEXT column through its `FromStr`
pub(crate) fn get_parsed<T>(row: &SqliteRow, column: &str) -> Result<T>
where
    T: FromStr<Err = Error>,
{
    let value: String = row.try_get(column)?;
    value.parse()
}

/// Decode a JSON TEXT column
pub(crate) fn get_json<T>(row: &SqliteRow, column: &str) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let value: String = row.try_get(column)?;
    serde_json::from_str(&value)
        .map_err(|e| Error::Internal(format!("Failed to deserialize {}: {}", column, e)))
}
