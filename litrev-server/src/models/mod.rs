//! Data models for litrev-server
//!
//! Row types returned by the database layer and serialized by the API.

pub mod article;
pub mod batch;
pub mod dimension;
pub mod job;
pub mod member;
pub mod note;
pub mod phase;
pub mod project;
pub mod review;
pub mod role;
pub mod signup;

pub use article::{Article, ArticleInput, ArticleUpdate};
pub use batch::{Batch, BatchDetail};
pub use dimension::{Dimension, DimensionKind};
pub use job::AiJob;
pub use member::Member;
pub use note::Note;
pub use phase::Phase;
pub use project::{Project, ProjectSummary};
pub use review::{DimensionReview, ReviewSource};
pub use role::{Permission, Permissions, Role};
pub use signup::{SignupSubmission, ValidSignup};

use uuid::Uuid;

/// Parse a UUID stored as TEXT
pub(crate) fn parse_uuid(value: &str) -> litrev_common::Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| litrev_common::Error::InvalidInput(format!("Invalid UUID '{}': {}", value, e)))
}

/// Trim and require a non-empty string no longer than `max` characters
pub(crate) fn require_text(field: &str, value: &str, max: usize) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(format!("{} must not be empty", field));
    }
    if trimmed.chars().count() > max {
        return Err(format!("{} must be at most {} characters", field, max));
    }
    Ok(trimmed.to_string())
}

/// Trim optional text; blank becomes `None`
pub(crate) fn optional_text(field: &str, value: Option<&str>, max: usize) -> Result<Option<String>, String> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) if text.chars().count() > max => {
            Err(format!("{} must be at most {} characters", field, max))
        }
        Some(text) => Ok(Some(text.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_text() {
        assert_eq!(require_text("name", "  Review  ", 10).unwrap(), "Review");
        assert!(require_text("name", "   ", 10).is_err());
        assert!(require_text("name", "abcdefghijk", 10).is_err());
    }

    #[test]
    fn test_optional_text() {
        assert_eq!(optional_text("x", None, 5).unwrap(), None);
        assert_eq!(optional_text("x", Some("  "), 5).unwrap(), None);
        assert_eq!(optional_text("x", Some(" ab "), 5).unwrap().as_deref(), Some("ab"));
        assert!(optional_text("x", Some("abcdef"), 5).is_err());
    }
}
