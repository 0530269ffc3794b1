//! Notes

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub const MAX_NOTE_TITLE_LEN: usize = 200;
pub const MAX_NOTE_CONTENT_LEN: usize = 50_000;

#[derive(Debug, Clone, Serialize)]
pub struct Note {
    pub id: Uuid,
    pub project_id: Uuid,
    pub article_id: Option<Uuid>,
    pub author_id: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
