//! Data models for news articles and the records persisted from them.
//!
//! This module defines the canonical article shape shared by every feed:
//! - [`RawArticle`]: fields as a provider handed them over, all optional
//! - [`Article`]: the normalized record, with fallbacks applied
//! - [`Source`] and [`Category`]: the closed value sets the database accepts
//! - [`NewRecord`]: an article ready to be written, with enumerations coerced
//!
//! Normalization never fails. Every field has a fallback, so a provider can
//! hand over an empty object and still produce an [`Article`] (which will
//! then simply not pass [`Article::is_valid`]).

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use url::Url;

/// Title given to articles that arrive without one.
pub const NO_TITLE: &str = "No Title";

/// A news article exactly as a provider returned it.
#[derive(Debug, Clone, Default)]
pub struct RawArticle {
    pub title: Option<String>,
    pub source: Option<String>,
    pub url: Option<String>,
    pub category: Option<String>,
    pub published_at: Option<String>,
}

/// A normalized news article.
///
/// # Invariants
///
/// * `title`, `source` and `category` are never empty
/// * `published_at` is always a valid UTC timestamp
///
/// `source` and `category` are kept as free strings here. They are only
/// coerced into [`Source`] / [`Category`] when the article is turned into a
/// [`NewRecord`] for persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    /// Headline, trimmed. [`NO_TITLE`] when the provider sent none.
    pub title: String,
    /// Provider label, trimmed. `"Unknown"` when absent.
    pub source: String,
    /// Link to the article, trimmed. Empty when absent.
    pub url: String,
    /// Category name. `"General"` when absent.
    pub category: String,
    /// Publication time, or ingestion time when the provider omitted it.
    pub published_at: DateTime<Utc>,
}

impl Article {
    /// Build an article from raw provider fields, stamping missing
    /// publication times with the current time.
    pub fn normalize(raw: RawArticle) -> Self {
        Self::normalize_at(raw, Utc::now())
    }

    /// Same as [`Article::normalize`], with an explicit ingestion time.
    ///
    /// # Arguments
    ///
    /// * `raw` - Fields as the provider sent them
    /// * `ingested_at` - Used as `published_at` when the provider's timestamp
    ///   is missing or unparseable
    ///
    /// # Returns
    ///
    /// An [`Article`] with trimmed fields and fallbacks applied. It may still
    /// fail [`Article::is_valid`].
    pub fn normalize_at(raw: RawArticle, ingested_at: DateTime<Utc>) -> Self {
        Self {
            title: trimmed_or(raw.title, NO_TITLE),
            source: trimmed_or(raw.source, Source::Unknown.as_str()),
            url: trimmed_or(raw.url, ""),
            category: trimmed_or(raw.category, Category::General.as_str()),
            published_at: raw
                .published_at
                .as_deref()
                .and_then(parse_timestamp)
                .unwrap_or(ingested_at),
        }
    }

    /// An article is worth storing when it has a real title and an absolute
    /// URL with both a scheme and a host.
    pub fn is_valid(&self) -> bool {
        self.title != NO_TITLE && !self.url.is_empty() && is_absolute_url(&self.url)
    }
}

fn trimmed_or(value: Option<String>, fallback: &str) -> String {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => fallback.to_string(),
    }
}

fn is_absolute_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => {
            !parsed.scheme().is_empty() && parsed.host_str().is_some_and(|h| !h.is_empty())
        }
        Err(_) => false,
    }
}

/// Parse the timestamp formats the news providers are known to emit.
///
/// Accepts RFC 3339 (`2024-05-01T10:00:00Z`), `2024-05-01 10:00:00 +0000`,
/// naive date-times and bare dates. Naive values are taken to be UTC.
///
/// # Arguments
///
/// * `value` - Raw timestamp text; surrounding whitespace is ignored
///
/// # Returns
///
/// The instant in UTC, or `None` when no known format matches.
///
/// # Examples
///
/// ```ignore
/// let t = parse_timestamp("2024-05-01 11:00:00 +0100").unwrap();
/// assert_eq!(t.to_rfc3339(), "2024-05-01T10:00:00+00:00");
/// assert_eq!(parse_timestamp("yesterday"), None);
/// ```
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S %z", "%Y-%m-%dT%H:%M:%S%z"] {
        if let Ok(dt) = DateTime::parse_from_str(value, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Providers accepted by the database's `Source` select field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    GNews,
    MediaStack,
    Currents,
    Manual,
    Unknown,
}

impl Source {
    pub const ALL: [Source; 5] = [
        Source::GNews,
        Source::MediaStack,
        Source::Currents,
        Source::Manual,
        Source::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::GNews => "GNews",
            Source::MediaStack => "MediaStack",
            Source::Currents => "Currents",
            Source::Manual => "Manual",
            Source::Unknown => "Unknown",
        }
    }

    /// Select-option colour used when the field is created.
    pub fn color(&self) -> &'static str {
        match self {
            Source::GNews => "blue",
            Source::MediaStack => "green",
            Source::Currents => "orange",
            Source::Manual => "gray",
            Source::Unknown => "default",
        }
    }

    /// Exact-name lookup; anything else becomes [`Source::Unknown`].
    pub fn coerce(value: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|s| s.as_str() == value)
            .unwrap_or(Source::Unknown)
    }
}

/// Categories accepted by the database's `Category` select field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    General,
    Sports,
    Politics,
    Business,
    Technology,
    Entertainment,
    Health,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::General,
        Category::Sports,
        Category::Politics,
        Category::Business,
        Category::Technology,
        Category::Entertainment,
        Category::Health,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::General => "General",
            Category::Sports => "Sports",
            Category::Politics => "Politics",
            Category::Business => "Business",
            Category::Technology => "Technology",
            Category::Entertainment => "Entertainment",
            Category::Health => "Health",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Category::General => "default",
            Category::Sports => "green",
            Category::Politics => "red",
            Category::Business => "blue",
            Category::Technology => "purple",
            Category::Entertainment => "pink",
            Category::Health => "yellow",
        }
    }

    /// Exact-name lookup; anything else becomes [`Category::General`].
    pub fn coerce(value: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == value)
            .unwrap_or(Category::General)
    }
}

/// An article about to be written to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub title: String,
    pub source: Source,
    pub url: String,
    pub category: Category,
    pub published_at: DateTime<Utc>,
    pub added_at: DateTime<Utc>,
}

impl NewRecord {
    /// Coerce the article's source and category into the closed sets and
    /// stamp it with the insert time.
    pub fn from_article(article: &Article, added_at: DateTime<Utc>) -> Self {
        Self {
            title: article.title.clone(),
            source: Source::coerce(&article.source),
            url: article.url.clone(),
            category: Category::coerce(&article.category),
            published_at: article.published_at,
            added_at,
        }
    }
}
