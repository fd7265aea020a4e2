//! Record store access: the paginated article database.
//!
//! The store is anything implementing [`RecordStore`]: a paginated table of
//! article rows supporting filtered queries, inserts, soft deletes and
//! schema updates. Two implementations exist:
//!
//! | Store | Module | Notes |
//! |-------|--------|-------|
//! | Notion database | [`notion`] | Used by the binary |
//! | In-memory table | [`memory`] | Test double with failure injection |
//!
//! # Pagination
//!
//! A query returns one [`Page`] at a time. Each page carries an opaque
//! cursor for the next one, or `None` once the result set is exhausted.
//! [`Pages`] follows those cursors lazily; [`RecordStore::query_all`] drains
//! it into a `Vec`, which is fine at this scale (hundreds of rows).

use chrono::{DateTime, Duration, Utc};
use tracing::{error, instrument, warn};

use crate::error::Result;
use crate::models::{Category, NewRecord, Source};

#[cfg(test)]
pub mod memory;
pub mod notion;

/// Database property names, as they appear in the store schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Headline,
    Source,
    Url,
    Category,
    PublishedAt,
    AddedAt,
}

impl Field {
    pub fn property_name(&self) -> &'static str {
        match self {
            Field::Headline => "Headline",
            Field::Source => "Source",
            Field::Url => "URL",
            Field::Category => "Category",
            Field::PublishedAt => "Published At",
            Field::AddedAt => "Added At",
        }
    }
}

/// Type of a property definition in the store schema.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKind {
    /// Single-select with `(name, colour)` options.
    Select(Vec<(&'static str, &'static str)>),
    Url,
    Date,
}

/// A property the database must have before articles can be written.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySpec {
    pub field: Field,
    pub kind: PropertyKind,
}

impl PropertySpec {
    pub fn name(&self) -> &'static str {
        self.field.property_name()
    }
}

/// Properties written by [`RecordStore::create`].
///
/// The headline (title) property is not listed: every database has exactly
/// one title property and it cannot be added.
pub fn required_properties() -> Vec<PropertySpec> {
    vec![
        PropertySpec {
            field: Field::Source,
            kind: PropertyKind::Select(
                Source::ALL.iter().map(|s| (s.as_str(), s.color())).collect(),
            ),
        },
        PropertySpec {
            field: Field::Url,
            kind: PropertyKind::Url,
        },
        PropertySpec {
            field: Field::Category,
            kind: PropertyKind::Select(
                Category::ALL.iter().map(|c| (c.as_str(), c.color())).collect(),
            ),
        },
        PropertySpec {
            field: Field::PublishedAt,
            kind: PropertyKind::Date,
        },
        PropertySpec {
            field: Field::AddedAt,
            kind: PropertyKind::Date,
        },
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Before,
    After,
}

/// A date comparison on one field, e.g. `Added At before <cutoff>`.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFilter {
    pub field: Field,
    pub comparison: Comparison,
    pub value: DateTime<Utc>,
}

impl QueryFilter {
    pub fn added_before(cutoff: DateTime<Utc>) -> Self {
        Self {
            field: Field::AddedAt,
            comparison: Comparison::Before,
            value: cutoff,
        }
    }

    pub fn added_after(since: DateTime<Utc>) -> Self {
        Self {
            field: Field::AddedAt,
            comparison: Comparison::After,
            value: since,
        }
    }
}

/// An article row as read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: String,
    /// Trimmed headline. Empty when the row has none.
    pub title: String,
    pub url: Option<String>,
    pub added_at: Option<DateTime<Utc>>,
}

/// One page of query results.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub records: Vec<StoredRecord>,
    /// Cursor for the next page; `None` when there are no more pages.
    pub next_cursor: Option<String>,
}

/// Operations against the article database.
///
/// Implementations do not retry. A failed call returns the matching
/// [`crate::error::Error`] variant and the caller decides what to skip.
pub trait RecordStore {
    /// Fetch one page of live (non-archived) rows.
    async fn query_page(&self, filter: Option<&QueryFilter>, cursor: Option<&str>) -> Result<Page>;

    /// Insert one row. Fails with [`crate::error::Error::StoreWrite`].
    async fn create(&self, record: &NewRecord) -> Result<StoredRecord>;

    /// Soft-delete one row. Fails with [`crate::error::Error::StoreWrite`].
    async fn archive(&self, id: &str) -> Result<()>;

    /// Add any missing property definitions and return their names.
    /// Fails with [`crate::error::Error::SchemaSetup`].
    async fn ensure_schema(&self, required: &[PropertySpec]) -> Result<Vec<String>>;

    /// Every row matching `filter`, following cursors until exhausted.
    async fn query_all(&self, filter: Option<QueryFilter>) -> Result<Vec<StoredRecord>>
    where
        Self: Sized,
    {
        let mut pages = Pages::new(self, filter);
        let mut records = Vec::new();
        while let Some(page) = pages.next_page().await {
            records.extend(page?);
        }
        Ok(records)
    }
}

/// Lazy cursor-following iterator over query pages.
///
/// Yields each page's records once, in store order, and stops after the
/// last page or after the first error. It cannot be restarted.
pub struct Pages<'a, S> {
    store: &'a S,
    filter: Option<QueryFilter>,
    cursor: Option<String>,
    done: bool,
    fetched: usize,
}

impl<'a, S: RecordStore> Pages<'a, S> {
    pub fn new(store: &'a S, filter: Option<QueryFilter>) -> Self {
        Self {
            store,
            filter,
            cursor: None,
            done: false,
            fetched: 0,
        }
    }

    /// Number of pages fetched so far.
    pub fn pages_fetched(&self) -> usize {
        self.fetched
    }

    pub async fn next_page(&mut self) -> Option<Result<Vec<StoredRecord>>> {
        if self.done {
            return None;
        }

        let page = match self
            .store
            .query_page(self.filter.as_ref(), self.cursor.as_deref())
            .await
        {
            Ok(page) => page,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        self.fetched += 1;

        match page.next_cursor {
            Some(next) if self.cursor.as_deref() == Some(next.as_str()) => {
                warn!(cursor = %next, pages = self.fetched, "Store repeated a cursor; stopping pagination");
                self.done = true;
            }
            Some(next) => self.cursor = Some(next),
            None => self.done = true,
        }

        Some(Ok(page.records))
    }
}

/// Row counts reported before and after a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct DatabaseStats {
    pub total_articles: usize,
    /// Rows added in the 24 hours before `now`.
    pub recent_articles: usize,
}

/// Count all live rows and those added in the last day.
///
/// Read failures are logged and reported as zero.
#[instrument(level = "info", skip_all)]
pub async fn database_stats<S: RecordStore>(store: &S, now: DateTime<Utc>) -> DatabaseStats {
    let total_articles = match store.query_all(None).await {
        Ok(rows) => rows.len(),
        Err(e) => {
            error!(error = %e, "Error counting articles");
            return DatabaseStats::default();
        }
    };

    let recent_articles = match store
        .query_all(Some(QueryFilter::added_after(now - Duration::days(1))))
        .await
    {
        Ok(rows) => rows.len(),
        Err(e) => {
            error!(error = %e, "Error counting recent articles");
            0
        }
    };

    DatabaseStats {
        total_articles,
        recent_articles,
    }
}
