//! Notion database client.
//!
//! Maps the [`RecordStore`] operations onto the Notion REST API:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | `query_page` | `POST /v1/databases/{id}/query` |
//! | `create` | `POST /v1/pages` |
//! | `archive` | `PATCH /v1/pages/{id}` with `archived: true` |
//! | `ensure_schema` | `GET` then `PATCH /v1/databases/{id}` |
//!
//! Each create/archive is followed by the fixed write delay from
//! [`Settings::write_delay`], whether it succeeded or not. Nothing is retried.

use chrono::{DateTime, SecondsFormat, Utc};
use itertools::Itertools;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::{Comparison, Field, Page, PropertyKind, PropertySpec, QueryFilter, RecordStore, StoredRecord};
use crate::config::{Credentials, Settings};
use crate::error::{Error, Result, StoreError};
use crate::models::{NewRecord, parse_timestamp};
use crate::utils::paced;

pub const NOTION_API_BASE: &str = "https://api.notion.com/v1";
pub const NOTION_VERSION: &str = "2022-06-28";
const PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DatabaseResponse {
    #[serde(default)]
    properties: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct NotionErrorBody {
    code: Option<String>,
    message: Option<String>,
}

pub struct NotionStore {
    client: Client,
    token: String,
    database_id: String,
    base_url: String,
    write_delay: Duration,
}

impl std::fmt::Debug for NotionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotionStore")
            .field("database_id", &self.database_id)
            .field("base_url", &self.base_url)
            .field("write_delay", &self.write_delay)
            .finish()
    }
}

impl NotionStore {
    pub fn new(credentials: &Credentials, settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            token: credentials.notion_token.clone(),
            database_id: credentials.database_id.clone(),
            base_url: NOTION_API_BASE.to_string(),
            write_delay: settings.write_delay(),
        })
    }

    fn database_url(&self) -> String {
        format!("{}/databases/{}", self.base_url, self.database_id)
    }

    /// Send an authenticated request and decode the JSON body.
    async fn send(&self, request: RequestBuilder) -> std::result::Result<Value, StoreError> {
        let response = request
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        Ok(response.json::<Value>().await?)
    }
}

impl RecordStore for NotionStore {
    #[instrument(level = "debug", skip_all, fields(cursor = ?cursor))]
    async fn query_page(&self, filter: Option<&QueryFilter>, cursor: Option<&str>) -> Result<Page> {
        let url = format!("{}/query", self.database_url());
        let body = query_body(filter, cursor);
        let value = self
            .send(self.client.post(&url).json(&body))
            .await
            .map_err(Error::StoreRead)?;
        let response: QueryResponse = serde_json::from_value(value)
            .map_err(|e| Error::StoreRead(StoreError::Malformed(e.to_string())))?;

        let mut records = Vec::with_capacity(response.results.len());
        for page in &response.results {
            match parse_page(page) {
                Some(record) => records.push(record),
                None => warn!(page = %page, "Skipping result without an id"),
            }
        }
        debug!(count = records.len(), has_more = response.has_more, "Fetched query page");

        let next_cursor = next_cursor(response.has_more, response.next_cursor);

        Ok(Page {
            records,
            next_cursor,
        })
    }

    #[instrument(level = "debug", skip_all, fields(title = %record.title))]
    async fn create(&self, record: &NewRecord) -> Result<StoredRecord> {
        let body = json!({
            "parent": { "database_id": self.database_id },
            "properties": page_properties(record),
        });
        let value = paced(
            self.write_delay,
            self.send(self.client.post(format!("{}/pages", self.base_url)).json(&body)),
        )
        .await
        .map_err(|e| Error::create_failed(&record.title, e))?;
        let id = value
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                Error::create_failed(
                    &record.title,
                    StoreError::Malformed("created page has no id".to_string()),
                )
            })?;

        Ok(StoredRecord {
            id: id.to_string(),
            title: record.title.clone(),
            url: Some(record.url.clone()),
            added_at: Some(record.added_at),
        })
    }

    #[instrument(level = "debug", skip_all, fields(%id))]
    async fn archive(&self, id: &str) -> Result<()> {
        paced(
            self.write_delay,
            self.send(
                self.client
                    .patch(format!("{}/pages/{}", self.base_url, id))
                    .json(&json!({ "archived": true })),
            ),
        )
        .await
        .map(|_| ())
        .map_err(|e| Error::archive_failed(id, e))
    }

    #[instrument(level = "info", skip_all, fields(database_id = %self.database_id))]
    async fn ensure_schema(&self, required: &[PropertySpec]) -> Result<Vec<String>> {
        let value = self
            .send(self.client.get(self.database_url()))
            .await
            .map_err(Error::SchemaSetup)?;
        let database: DatabaseResponse = serde_json::from_value(value)
            .map_err(|e| Error::SchemaSetup(StoreError::Malformed(e.to_string())))?;

        let existing: HashSet<&str> = database.properties.keys().map(String::as_str).collect();
        let missing = missing_properties(&existing, required);
        if missing.is_empty() {
            info!("All required properties exist");
            return Ok(Vec::new());
        }

        let added: Vec<String> = missing.keys().cloned().collect();
        self.send(
            self.client
                .patch(self.database_url())
                .json(&json!({ "properties": Value::Object(missing) })),
        )
        .await
        .map_err(Error::SchemaSetup)?;

        info!(properties = %added.iter().join(", "), "Added missing properties");
        Ok(added)
    }
}

/// Pull the human-readable message out of a Notion error body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<NotionErrorBody>(body) {
        Ok(NotionErrorBody {
            code: Some(code),
            message: Some(message),
        }) => format!("{code}: {message}"),
        Ok(NotionErrorBody {
            message: Some(message),
            ..
        }) => message,
        _ if body.is_empty() => "empty response body".to_string(),
        _ => body.to_string(),
    }
}

/// Cursor for the next page. More results without a cursor end the scan.
fn next_cursor(has_more: bool, cursor: Option<String>) -> Option<String> {
    match (has_more, cursor) {
        (true, Some(cursor)) => Some(cursor),
        (true, None) => {
            warn!("Store reported more results without a cursor; stopping pagination");
            None
        }
        (false, _) => None,
    }
}

fn format_date(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn query_body(filter: Option<&QueryFilter>, cursor: Option<&str>) -> Value {
    let mut body = Map::new();
    body.insert("page_size".to_string(), json!(PAGE_SIZE));
    if let Some(filter) = filter {
        body.insert("filter".to_string(), filter_json(filter));
    }
    if let Some(cursor) = cursor {
        body.insert("start_cursor".to_string(), json!(cursor));
    }
    Value::Object(body)
}

fn filter_json(filter: &QueryFilter) -> Value {
    let op = match filter.comparison {
        Comparison::Before => "before",
        Comparison::After => "after",
    };
    json!({
        "property": filter.field.property_name(),
        "date": { op: format_date(filter.value) },
    })
}

fn page_properties(record: &NewRecord) -> Value {
    let mut props = Map::new();
    props.insert(
        Field::Headline.property_name().to_string(),
        json!({ "title": [{ "text": { "content": record.title } }] }),
    );
    props.insert(
        Field::Source.property_name().to_string(),
        json!({ "select": { "name": record.source.as_str() } }),
    );
    props.insert(
        Field::Url.property_name().to_string(),
        json!({ "url": record.url }),
    );
    props.insert(
        Field::Category.property_name().to_string(),
        json!({ "select": { "name": record.category.as_str() } }),
    );
    props.insert(
        Field::PublishedAt.property_name().to_string(),
        json!({ "date": { "start": format_date(record.published_at) } }),
    );
    props.insert(
        Field::AddedAt.property_name().to_string(),
        json!({ "date": { "start": format_date(record.added_at) } }),
    );
    Value::Object(props)
}

fn property_schema(kind: &PropertyKind) -> Value {
    match kind {
        PropertyKind::Select(options) => {
            let options: Vec<Value> = options
                .iter()
                .map(|(name, color)| json!({ "name": name, "color": color }))
                .collect();
            json!({ "select": { "options": options } })
        }
        PropertyKind::Url => json!({ "url": {} }),
        PropertyKind::Date => json!({ "date": {} }),
    }
}

fn missing_properties(existing: &HashSet<&str>, required: &[PropertySpec]) -> Map<String, Value> {
    required
        .iter()
        .filter(|spec| !existing.contains(spec.name()))
        .map(|spec| (spec.name().to_string(), property_schema(&spec.kind)))
        .collect()
}

/// Read the fields newsbot cares about from a Notion page object.
fn parse_page(page: &Value) -> Option<StoredRecord> {
    let id = page.get("id")?.as_str()?.to_string();
    let props = page.get("properties");
    let prop = |field: Field| props.and_then(|p| p.get(field.property_name()));

    let title = prop(Field::Headline)
        .and_then(|p| p.get("title"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| {
                    part.get("plain_text")
                        .or_else(|| part.get("text").and_then(|t| t.get("content")))
                        .and_then(Value::as_str)
                })
                .collect::<String>()
        })
        .unwrap_or_default()
        .trim()
        .to_string();

    let url = prop(Field::Url)
        .and_then(|p| p.get("url"))
        .and_then(Value::as_str)
        .map(String::from);

    let added_at = prop(Field::AddedAt)
        .and_then(|p| p.get("date"))
        .and_then(|d| d.get("start"))
        .and_then(Value::as_str)
        .and_then(parse_timestamp);

    Some(StoredRecord {
        id,
        title,
        url,
        added_at,
    })
}
