use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashSet};
use std::sync::Mutex;

use super::{Comparison, Field, Page, PropertySpec, QueryFilter, RecordStore, StoredRecord};
use crate::error::{Error, Result, StoreError};
use crate::models::{Category, NewRecord, Source};

#[derive(Debug, Clone)]
pub struct MemoryRow {
    pub seq: u64,
    pub title: String,
    pub source: Option<Source>,
    pub category: Option<Category>,
    pub url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub added_at: Option<DateTime<Utc>>,
    pub archived: bool,
}

impl MemoryRow {
    fn id(&self) -> String {
        format!("page-{}", self.seq)
    }

    fn to_stored(&self) -> StoredRecord {
        StoredRecord {
            id: self.id(),
            title: self.title.trim().to_string(),
            url: self.url.clone(),
            added_at: self.added_at,
        }
    }

    fn field_value(&self, field: Field) -> Option<DateTime<Utc>> {
        match field {
            Field::AddedAt => self.added_at,
            Field::PublishedAt => self.published_at,
            _ => None,
        }
    }
}

/// Whether a timestamp satisfies the filter. Missing values never do.
fn filter_matches(filter: &QueryFilter, value: Option<DateTime<Utc>>) -> bool {
    match (value, filter.comparison) {
        (Some(v), Comparison::Before) => v < filter.value,
        (Some(v), Comparison::After) => v > filter.value,
        (None, _) => false,
    }
}

#[derive(Default)]
struct Inner {
    rows: Vec<MemoryRow>,
    next_seq: u64,
    properties: BTreeSet<String>,
    query_calls: usize,
    create_calls: usize,
    archive_calls: usize,
    schema_calls: usize,
    fail_schema: bool,
    fail_queries_after: Option<usize>,
    fail_create_titles: HashSet<String>,
    fail_archive_ids: HashSet<String>,
    stuck_offset: usize,
}

/// In-process store with cursor pagination and failure injection.
///
/// Cursors are the sequence number of the last row returned, so archiving
/// rows mid-scan never shifts later pages.
pub struct MemoryStore {
    page_size: usize,
    leading_empty_page: bool,
    stuck_cursor: bool,
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_page_size(100)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        let mut inner = Inner::default();
        inner.properties.insert(Field::Headline.property_name().to_string());
        Self {
            page_size: page_size.max(1),
            leading_empty_page: false,
            stuck_cursor: false,
            inner: Mutex::new(inner),
        }
    }

    /// Start every scan with an empty page that still carries a cursor.
    pub fn with_leading_empty_page(mut self) -> Self {
        self.leading_empty_page = true;
        self
    }

    /// Hand out the same cursor on every page.
    pub fn with_stuck_cursor(mut self) -> Self {
        self.stuck_cursor = true;
        self
    }

    /// Insert a row directly, bypassing `create`. Returns its id.
    pub fn seed(&self, title: &str, added_at: Option<DateTime<Utc>>) -> String {
        let mut inner = self.inner.lock().unwrap();
        inner.next_seq += 1;
        let row = MemoryRow {
            seq: inner.next_seq,
            title: title.to_string(),
            source: None,
            category: None,
            url: None,
            published_at: None,
            added_at,
            archived: false,
        };
        let id = row.id();
        inner.rows.push(row);
        id
    }

    pub fn rows(&self) -> Vec<MemoryRow> {
        self.inner.lock().unwrap().rows.clone()
    }

    pub fn live_titles(&self) -> Vec<String> {
        self.rows()
            .into_iter()
            .filter(|r| !r.archived)
            .map(|r| r.title)
            .collect()
    }

    pub fn properties(&self) -> Vec<String> {
        self.inner.lock().unwrap().properties.iter().cloned().collect()
    }

    pub fn query_calls(&self) -> usize {
        self.inner.lock().unwrap().query_calls
    }

    pub fn create_calls(&self) -> usize {
        self.inner.lock().unwrap().create_calls
    }

    pub fn archive_calls(&self) -> usize {
        self.inner.lock().unwrap().archive_calls
    }

    pub fn schema_calls(&self) -> usize {
        self.inner.lock().unwrap().schema_calls
    }

    pub fn fail_schema(&self) {
        self.inner.lock().unwrap().fail_schema = true;
    }

    /// Let `n` more queries succeed, then fail every query after that.
    pub fn fail_queries_after(&self, n: usize) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_queries_after = Some(inner.query_calls + n);
    }

    pub fn fail_create_for(&self, title: &str) {
        self.inner
            .lock()
            .unwrap()
            .fail_create_titles
            .insert(title.to_string());
    }

    pub fn fail_archive_for(&self, id: &str) {
        self.inner
            .lock()
            .unwrap()
            .fail_archive_ids
            .insert(id.to_string());
    }

    fn rejected(message: &str) -> StoreError {
        StoreError::Api {
            status: 500,
            message: message.to_string(),
        }
    }
}

impl RecordStore for MemoryStore {
    async fn query_page(&self, filter: Option<&QueryFilter>, cursor: Option<&str>) -> Result<Page> {
        let mut inner = self.inner.lock().unwrap();
        inner.query_calls += 1;
        if let Some(limit) = inner.fail_queries_after {
            if inner.query_calls > limit {
                return Err(Error::StoreRead(Self::rejected("query unavailable")));
            }
        }

        if self.leading_empty_page && cursor.is_none() {
            return Ok(Page {
                records: Vec::new(),
                next_cursor: Some("0".to_string()),
            });
        }

        let matching: Vec<&MemoryRow> = inner
            .rows
            .iter()
            .filter(|r| !r.archived)
            .filter(|r| filter.is_none_or(|f| filter_matches(f, r.field_value(f.field))))
            .collect();

        if self.stuck_cursor {
            let start = inner.stuck_offset.min(matching.len());
            let records: Vec<StoredRecord> = matching[start..]
                .iter()
                .take(self.page_size)
                .map(|r| r.to_stored())
                .collect();
            inner.stuck_offset = start + records.len();
            return Ok(Page {
                records,
                next_cursor: Some("stuck".to_string()),
            });
        }

        let after: u64 = match cursor {
            Some(c) => c
                .parse()
                .map_err(|_| Error::StoreRead(StoreError::Malformed(format!("bad cursor {c}"))))?,
            None => 0,
        };
        let remaining: Vec<&MemoryRow> = matching.into_iter().filter(|r| r.seq > after).collect();
        let records: Vec<StoredRecord> = remaining
            .iter()
            .take(self.page_size)
            .map(|r| r.to_stored())
            .collect();
        let next_cursor = if remaining.len() > self.page_size {
            remaining.get(self.page_size - 1).map(|r| r.seq.to_string())
        } else {
            None
        };

        Ok(Page {
            records,
            next_cursor,
        })
    }

    async fn create(&self, record: &NewRecord) -> Result<StoredRecord> {
        let mut inner = self.inner.lock().unwrap();
        inner.create_calls += 1;
        if inner.fail_create_titles.contains(&record.title) {
            return Err(Error::create_failed(
                &record.title,
                Self::rejected("create rejected"),
            ));
        }
        inner.next_seq += 1;
        let row = MemoryRow {
            seq: inner.next_seq,
            title: record.title.clone(),
            source: Some(record.source),
            category: Some(record.category),
            url: Some(record.url.clone()),
            published_at: Some(record.published_at),
            added_at: Some(record.added_at),
            archived: false,
        };
        let stored = row.to_stored();
        inner.rows.push(row);
        Ok(stored)
    }

    async fn archive(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.archive_calls += 1;
        if inner.fail_archive_ids.contains(id) {
            return Err(Error::archive_failed(id, Self::rejected("archive rejected")));
        }
        match inner.rows.iter_mut().find(|r| r.id() == id) {
            Some(row) => {
                row.archived = true;
                Ok(())
            }
            None => Err(Error::archive_failed(
                id,
                StoreError::Api {
                    status: 404,
                    message: "object_not_found".to_string(),
                },
            )),
        }
    }

    async fn ensure_schema(&self, required: &[PropertySpec]) -> Result<Vec<String>> {
        let mut inner = self.inner.lock().unwrap();
        inner.schema_calls += 1;
        if inner.fail_schema {
            return Err(Error::SchemaSetup(Self::rejected("unauthorized")));
        }
        let mut added = Vec::new();
        for spec in required {
            if inner.properties.insert(spec.name().to_string()) {
                added.push(spec.name().to_string());
            }
        }
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::required_properties;
    use chrono::TimeZone;

    #[test]
    fn test_filter_matches() {
        let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let before = QueryFilter::added_before(t0);
        assert!(filter_matches(&before, Some(t0 - chrono::Duration::seconds(1))));
        assert!(!filter_matches(&before, Some(t0)));
        assert!(!filter_matches(&before, None));

        let after = QueryFilter::added_after(t0);
        assert!(filter_matches(&after, Some(t0 + chrono::Duration::seconds(1))));
        assert!(!filter_matches(&after, Some(t0)));
    }

    #[tokio::test]
    async fn test_ensure_schema_is_idempotent() {
        let store = MemoryStore::new();
        let added = store.ensure_schema(&required_properties()).await.unwrap();
        assert_eq!(added.len(), 5);
        let added_again = store.ensure_schema(&required_properties()).await.unwrap();
        assert!(added_again.is_empty());
        assert_eq!(store.properties().len(), 6);
    }

    #[tokio::test]
    async fn test_archived_rows_leave_query_results() {
        let store = MemoryStore::new();
        let t = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let id = store.seed("Gone soon", Some(t));
        store.seed("Stays", Some(t));
        store.archive(&id).await.unwrap();
        let rows = store.query_all(None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Stays");
    }

    #[tokio::test]
    async fn test_archive_unknown_id_fails() {
        let store = MemoryStore::new();
        let err = store.archive("page-99").await.unwrap_err();
        assert!(matches!(err, Error::StoreWrite { .. }));
    }
}
