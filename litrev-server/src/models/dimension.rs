//! Preclassification dimensions
//!
//! A dimension is one criterion an article is judged on within a phase.
//! Its kind decides which review values are accepted:
//!
//! | kind        | accepted values                   |
//! |-------------|-----------------------------------|
//! | boolean     | `yes`, `no`                       |
//! | categorical | one of the dimension's `options`  |
//! | text        | any non-empty text                |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::{optional_text, require_text};

pub const MAX_DIMENSION_NAME_LEN: usize = 200;
pub const MAX_DIMENSION_DESCRIPTION_LEN: usize = 2000;
pub const MAX_OPTION_LEN: usize = 200;
pub const MAX_TEXT_VALUE_LEN: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionKind {
    Boolean,
    Categorical,
    Text,
}

impl DimensionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DimensionKind::Boolean => "boolean",
            DimensionKind::Categorical => "categorical",
            DimensionKind::Text => "text",
        }
    }
}

impl FromStr for DimensionKind {
    type Err = litrev_common::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "boolean" => Ok(DimensionKind::Boolean),
            "categorical" => Ok(DimensionKind::Categorical),
            "text" => Ok(DimensionKind::Text),
            other => Err(litrev_common::Error::InvalidInput(format!(
                "Unknown dimension kind '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Dimension {
    pub id: Uuid,
    pub phase_id: Uuid,
    pub name: String,
    pub description: String,
    pub kind: DimensionKind,
    pub options: Vec<String>,
    pub position: i64,
    pub created_at: DateTime<Utc>,
}

/// Trim, drop blanks and duplicates; categorical dimensions need at least one
pub fn normalize_options(kind: DimensionKind, options: &[String]) -> Result<Vec<String>, String> {
    if kind != DimensionKind::Categorical {
        return Ok(Vec::new());
    }

    let mut normalized: Vec<String> = Vec::new();
    for option in options {
        let option = option.trim();
        if option.is_empty() || normalized.iter().any(|o| o == option) {
            continue;
        }
        if option.chars().count() > MAX_OPTION_LEN {
            return Err(format!("options must be at most {} characters each", MAX_OPTION_LEN));
        }
        normalized.push(option.to_string());
    }

    if normalized.is_empty() {
        return Err("categorical dimensions need at least one option".to_string());
    }
    Ok(normalized)
}

/// Validated dimension name and description
pub fn validate_labels(name: &str, description: Option<&str>) -> Result<(String, String), String> {
    let name = require_text("name", name, MAX_DIMENSION_NAME_LEN)?;
    let description = optional_text("description", description, MAX_DIMENSION_DESCRIPTION_LEN)?
        .unwrap_or_default();
    Ok((name, description))
}

impl Dimension {
    /// Canonical stored form of a review value, or why it is rejected
    pub fn validate_value(&self, value: &str) -> Result<String, String> {
        let value = value.trim();
        match self.kind {
            DimensionKind::Boolean => match value.to_lowercase().as_str() {
                "yes" => Ok("yes".to_string()),
                "no" => Ok("no".to_string()),
                _ => Err(format!("'{}' expects yes or no", self.name)),
            },
            DimensionKind::Categorical => self
                .options
                .iter()
                .find(|o| o.eq_ignore_ascii_case(value))
                .cloned()
                .ok_or_else(|| {
                    format!("'{}' expects one of: {}", self.name, self.options.join(", "))
                }),
            DimensionKind::Text => {
                require_text(&self.name, value, MAX_TEXT_VALUE_LEN)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dimension(kind: DimensionKind, options: &[&str]) -> Dimension {
        Dimension {
            id: Uuid::new_v4(),
            phase_id: Uuid::new_v4(),
            name: "Design".to_string(),
            description: String::new(),
            kind,
            options: options.iter().map(|s| s.to_string()).collect(),
            position: 1,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_boolean_values() {
        let d = dimension(DimensionKind::Boolean, &[]);
        assert_eq!(d.validate_value(" YES ").unwrap(), "yes");
        assert_eq!(d.validate_value("no").unwrap(), "no");
        assert!(d.validate_value("maybe").is_err());
    }

    #[test]
    fn test_categorical_values_use_stored_spelling() {
        let d = dimension(DimensionKind::Categorical, &["RCT", "Cohort"]);
        assert_eq!(d.validate_value("rct").unwrap(), "RCT");
        assert!(d.validate_value("Case study").is_err());
    }

    #[test]
    fn test_text_values_must_be_non_empty() {
        let d = dimension(DimensionKind::Text, &[]);
        assert!(d.validate_value("  ").is_err());
        assert_eq!(d.validate_value(" fine ").unwrap(), "fine");
    }

    #[test]
    fn test_normalize_options() {
        let opts = vec![" a ".to_string(), "a".to_string(), "".to_string(), "b".to_string()];
        assert_eq!(normalize_options(DimensionKind::Categorical, &opts).unwrap(), vec!["a", "b"]);
        assert!(normalize_options(DimensionKind::Categorical, &[]).is_err());
        assert!(normalize_options(DimensionKind::Text, &opts).unwrap().is_empty());
    }
}
