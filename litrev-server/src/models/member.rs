//! Project membership rows

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::role::Permissions;

#[derive(Debug, Clone, Serialize)]
pub struct Member {
    pub project_id: Uuid,
    pub user_id: String,
    pub role_id: Uuid,
    pub role_name: String,
    pub permissions: Permissions,
    pub joined_at: DateTime<Utc>,
}
