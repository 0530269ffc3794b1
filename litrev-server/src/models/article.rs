//! Article rows and write payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{optional_text, require_text};

pub const MAX_TITLE_LEN: usize = 1000;
pub const MAX_ABSTRACT_LEN: usize = 20_000;
pub const MAX_AUTHORS_LEN: usize = 2000;
pub const MAX_DOI_LEN: usize = 255;
pub const MAX_JOURNAL_LEN: usize = 500;
pub const MAX_LANGUAGE_LEN: usize = 50;

const YEAR_RANGE: std::ops::RangeInclusive<i64> = 1000..=2100;

#[derive(Debug, Clone, Serialize)]
pub struct Article {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub authors: Option<String>,
    pub publication_year: Option<i64>,
    pub doi: Option<String>,
    pub journal: Option<String>,
    pub language: Option<String>,
    pub title_translated: Option<String>,
    pub abstract_translated: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// True once the title (and abstract, when present) have translations
    pub fn is_translated(&self) -> bool {
        self.title_translated.is_some()
            && (self.abstract_text.is_none() || self.abstract_translated.is_some())
    }
}

/// New article, as posted or imported
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticleInput {
    pub title: String,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub authors: Option<String>,
    #[serde(default)]
    pub publication_year: Option<i64>,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub journal: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

/// Lowercase a DOI and drop a resolver prefix so duplicates compare equal
///
/// `None` when nothing is left after the prefix.
pub fn normalize_doi(doi: &str) -> Option<String> {
    let lower = doi.trim().to_lowercase();
    let bare = ["https://doi.org/", "http://doi.org/", "https://dx.doi.org/", "doi:"]
        .iter()
        .find_map(|prefix| lower.strip_prefix(prefix))
        .unwrap_or(lower.as_str())
        .trim();
    (!bare.is_empty()).then(|| bare.to_string())
}

fn check_year(year: Option<i64>) -> Result<Option<i64>, String> {
    match year {
        Some(y) if !YEAR_RANGE.contains(&y) => Err(format!(
            "publication_year must be between {} and {}",
            YEAR_RANGE.start(),
            YEAR_RANGE.end()
        )),
        other => Ok(other),
    }
}

impl ArticleInput {
    /// Trimmed, length-checked copy; the DOI is normalized
    pub fn validate(&self) -> Result<ArticleInput, String> {
        Ok(ArticleInput {
            title: require_text("title", &self.title, MAX_TITLE_LEN)?,
            abstract_text: optional_text("abstract", self.abstract_text.as_deref(), MAX_ABSTRACT_LEN)?,
            authors: optional_text("authors", self.authors.as_deref(), MAX_AUTHORS_LEN)?,
            publication_year: check_year(self.publication_year)?,
            doi: optional_text("doi", self.doi.as_deref(), MAX_DOI_LEN)?.and_then(|d| normalize_doi(&d)),
            journal: optional_text("journal", self.journal.as_deref(), MAX_JOURNAL_LEN)?,
            language: optional_text("language", self.language.as_deref(), MAX_LANGUAGE_LEN)?,
        })
    }
}

/// Partial article update
///
/// Absent fields are left unchanged; an empty string clears an optional field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticleUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub authors: Option<String>,
    #[serde(default)]
    pub publication_year: Option<i64>,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub journal: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

impl ArticleUpdate {
    /// Apply onto `article`, returning true when title or abstract changed
    pub fn apply_to(&self, article: &mut Article) -> Result<bool, String> {
        let mut source_changed = false;

        if let Some(title) = &self.title {
            let title = require_text("title", title, MAX_TITLE_LEN)?;
            source_changed |= title != article.title;
            article.title = title;
        }
        if let Some(text) = &self.abstract_text {
            let text = optional_text("abstract", Some(text), MAX_ABSTRACT_LEN)?;
            source_changed |= text != article.abstract_text;
            article.abstract_text = text;
        }
        if let Some(authors) = &self.authors {
            article.authors = optional_text("authors", Some(authors), MAX_AUTHORS_LEN)?;
        }
        if self.publication_year.is_some() {
            article.publication_year = check_year(self.publication_year)?;
        }
        if let Some(doi) = &self.doi {
            article.doi = optional_text("doi", Some(doi), MAX_DOI_LEN)?.and_then(|d| normalize_doi(&d));
        }
        if let Some(journal) = &self.journal {
            article.journal = optional_text("journal", Some(journal), MAX_JOURNAL_LEN)?;
        }
        if let Some(language) = &self.language {
            article.language = optional_text("language", Some(language), MAX_LANGUAGE_LEN)?;
        }

        if source_changed {
            article.title_translated = None;
            article.abstract_translated = None;
        }
        Ok(source_changed)
    }
}
