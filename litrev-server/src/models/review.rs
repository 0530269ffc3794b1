//! Dimension reviews (one judgment per batch, article and dimension)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Who produced a review. Human reviews are never overwritten by AI runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewSource {
    Ai,
    Human,
}

impl ReviewSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewSource::Ai => "ai",
            ReviewSource::Human => "human",
        }
    }
}

impl FromStr for ReviewSource {
    type Err = litrev_common::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ai" => Ok(ReviewSource::Ai),
            "human" => Ok(ReviewSource::Human),
            other => Err(litrev_common::Error::InvalidInput(format!(
                "Unknown review source '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DimensionReview {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub article_id: Uuid,
    pub dimension_id: Uuid,
    pub value: String,
    pub confidence: Option<f64>,
    pub rationale: Option<String>,
    pub source: ReviewSource,
    pub reviewer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
