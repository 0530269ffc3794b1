//! AI job rows

use chrono::{DateTime, Utc};
use litrev_common::events::LitrevEvent;
use litrev_common::{BatchStatus, JobStatus, JobType};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct AiJob {
    pub id: Uuid,
    pub project_id: Uuid,
    pub batch_id: Uuid,
    pub job_type: JobType,
    pub status: JobStatus,
    /// Percentage complete (0.0 - 100.0)
    pub progress: f64,
    /// Worker-defined payload: processed, total, current_article_id, counters
    pub details: serde_json::Value,
    pub error_message: Option<String>,
    pub batch_status_before: BatchStatus,
    pub submitted_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl AiJob {
    /// Change event describing the row as it is now
    pub fn to_event(&self) -> LitrevEvent {
        LitrevEvent::JobUpdated {
            job_id: self.id,
            project_id: self.project_id,
            batch_id: self.batch_id,
            job_type: self.job_type,
            status: self.status,
            progress: self.progress,
            details: self.details.clone(),
            error_message: self.error_message.clone(),
            timestamp: self.updated_at,
        }
    }
}
