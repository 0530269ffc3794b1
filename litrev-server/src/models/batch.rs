//! Batch rows

use chrono::{DateTime, Utc};
use litrev_common::BatchStatus;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct Batch {
    pub id: Uuid,
    pub project_id: Uuid,
    pub phase_id: Uuid,
    pub name: String,
    pub batch_number: i64,
    pub status: BatchStatus,
    pub article_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Batch with its member article ids
#[derive(Debug, Clone, Serialize)]
pub struct BatchDetail {
    #[serde(flatten)]
    pub batch: Batch,
    pub article_ids: Vec<Uuid>,
}
