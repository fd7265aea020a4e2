//! News feed adapters.
//!
//! Every provider is a JSON API returning an array of article objects, so a
//! single adapter ([`ApiFeed`]) covers them all. What differs per provider is
//! captured in a [`ProviderSpec`]: endpoint, array field and item field names.
//!
//! # Supported Providers
//!
//! | Provider | Array field | Categories | Notes |
//! |----------|-------------|------------|-------|
//! | GNews | `articles` | none, always General | `max` query parameter |
//! | MediaStack | `data` | mapped | plain HTTP endpoint |
//! | Currents | `news` | mapped | category is a list; first entry used |
//!
//! Fetching never fails outward: HTTP and decode errors are logged and the
//! feed contributes no articles, and malformed items are logged and dropped.

use once_cell::sync::Lazy;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{error, info, instrument, warn};

use crate::error::{Error, Result};
use crate::models::{Article, Category, RawArticle, Source};

pub mod providers;

pub use providers::configured_feeds;

/// A source of normalized articles.
pub trait FeedSource {
    fn name(&self) -> &str;

    /// Fetch the current articles. Failures are logged and yield an empty list.
    async fn fetch(&self) -> Vec<Article>;
}

/// How to call one provider and read its response.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSpec {
    pub name: &'static str,
    pub source: Source,
    /// URL with `{api_key}` and `{max}` placeholders.
    pub endpoint: &'static str,
    pub items_field: &'static str,
    pub title_field: &'static str,
    pub url_field: &'static str,
    pub published_field: &'static str,
    /// Field holding the provider's category. `None` means every article is
    /// filed under General.
    pub category_field: Option<&'static str>,
}

static CATEGORY_ALIASES: Lazy<HashMap<&'static str, Category>> = Lazy::new(|| {
    HashMap::from([
        ("sports", Category::Sports),
        ("politics", Category::Politics),
        ("business", Category::Business),
        ("technology", Category::Technology),
        ("tech", Category::Technology),
        ("entertainment", Category::Entertainment),
        ("health", Category::Health),
    ])
});

/// Case-insensitive provider category lookup; unknown names are General.
pub fn map_category(raw: &str) -> Category {
    CATEGORY_ALIASES
        .get(raw.trim().to_lowercase().as_str())
        .copied()
        .unwrap_or(Category::General)
}

/// Generic JSON API feed driven by a [`ProviderSpec`].
#[derive(Debug, Clone)]
pub struct ApiFeed {
    client: Client,
    spec: ProviderSpec,
    api_key: String,
    max_records: u32,
}

impl ApiFeed {
    pub fn new(client: Client, spec: ProviderSpec, api_key: String, max_records: u32) -> Self {
        Self {
            client,
            spec,
            api_key,
            max_records,
        }
    }

    pub fn render_endpoint(&self) -> String {
        self.spec
            .endpoint
            .replace("{api_key}", &urlencoding::encode(&self.api_key))
            .replace("{max}", &self.max_records.to_string())
    }

    async fn request(&self) -> Result<Value> {
        let feed_error = |reason: String| Error::FeedFetch {
            feed: self.spec.name.to_string(),
            reason,
        };

        let response = self
            .client
            .get(self.render_endpoint())
            .send()
            .await
            // reqwest errors carry the URL, which carries the key
            .map_err(|e| feed_error(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(feed_error(format!("HTTP {status}")));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| feed_error(format!("invalid JSON: {}", e.without_url())))
    }

    /// Turn a decoded response body into articles.
    ///
    /// A body without the items array yields nothing. Items that are not
    /// JSON objects are logged and dropped.
    pub fn parse_response(&self, body: &Value) -> Vec<Article> {
        let Some(items) = body.get(self.spec.items_field).and_then(Value::as_array) else {
            warn!(feed = self.spec.name, field = self.spec.items_field, "No articles in response");
            return Vec::new();
        };

        items
            .iter()
            .take(self.max_records as usize)
            .filter_map(|item| match self.parse_item(item) {
                Ok(article) => Some(article),
                Err(e) => {
                    warn!(error = %e, "Skipping article");
                    None
                }
            })
            .collect()
    }

    fn parse_item(&self, item: &Value) -> Result<Article> {
        if !item.is_object() {
            return Err(Error::RecordParse {
                feed: self.spec.name.to_string(),
                reason: format!("expected an object, got {}", json_kind(item)),
            });
        }

        let category = match self.spec.category_field {
            Some(field) => text_field(item, field)
                .map(|c| map_category(&c))
                .unwrap_or(Category::General),
            None => Category::General,
        };

        Ok(Article::normalize(RawArticle {
            title: text_field(item, self.spec.title_field),
            source: Some(self.spec.source.as_str().to_string()),
            url: text_field(item, self.spec.url_field),
            category: Some(category.as_str().to_string()),
            published_at: text_field(item, self.spec.published_field),
        }))
    }
}

impl FeedSource for ApiFeed {
    fn name(&self) -> &str {
        self.spec.name
    }

    #[instrument(level = "info", skip_all, fields(feed = self.spec.name))]
    async fn fetch(&self) -> Vec<Article> {
        info!("Fetching articles");
        match self.request().await {
            Ok(body) => {
                let articles = self.parse_response(&body);
                info!(count = articles.len(), "Fetched articles");
                articles
            }
            Err(e) => {
                error!(error = %e, "Feed fetch failed");
                Vec::new()
            }
        }
    }
}

/// A string field, or the first string of an array field.
fn text_field(item: &Value, field: &str) -> Option<String> {
    match item.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Array(values) => values.iter().find_map(Value::as_str).map(String::from),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NO_TITLE;
    use serde_json::json;

    fn spec() -> ProviderSpec {
        ProviderSpec {
            name: "TestWire",
            source: Source::MediaStack,
            endpoint: "https://news.example/v1?key={api_key}&limit={max}",
            items_field: "data",
            title_field: "title",
            url_field: "url",
            published_field: "published_at",
            category_field: Some("category"),
        }
    }

    fn feed(max: u32) -> ApiFeed {
        ApiFeed::new(Client::new(), spec(), "a b&c".into(), max)
    }

    #[test]
    fn test_map_category() {
        assert_eq!(map_category("sports"), Category::Sports);
        assert_eq!(map_category("TECH"), Category::Technology);
        assert_eq!(map_category(" Health "), Category::Health);
        assert_eq!(map_category("sci-fi"), Category::General);
        assert_eq!(map_category(""), Category::General);
    }

    #[test]
    fn test_render_endpoint_encodes_key() {
        assert_eq!(
            feed(25).render_endpoint(),
            "https://news.example/v1?key=a%20b%26c&limit=25"
        );
    }

    #[test]
    fn test_parse_response() {
        let body = json!({
            "pagination": { "total": 2 },
            "data": [
                {
                    "title": "CBN holds rates",
                    "url": "https://example.com/cbn",
                    "category": "business",
                    "published_at": "2025-05-02T09:15:00+00:00"
                },
                {
                    "title": null,
                    "url": "https://example.com/untitled",
                    "category": "general"
                }
            ]
        });
        let articles = feed(50).parse_response(&body);
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "CBN holds rates");
        assert_eq!(articles[0].source, "MediaStack");
        assert_eq!(articles[0].category, "Business");
        assert!(articles[0].is_valid());
        assert_eq!(articles[1].title, NO_TITLE);
        assert_eq!(articles[1].category, "General");
        assert!(!articles[1].is_valid());
    }

    #[test]
    fn test_parse_response_missing_array() {
        let body = json!({ "error": { "code": "invalid_access_key" } });
        assert!(feed(50).parse_response(&body).is_empty());
    }

    #[test]
    fn test_parse_response_drops_non_objects_and_caps() {
        let body = json!({
            "data": [
                "just a string",
                { "title": "One", "url": "https://example.com/1" },
                { "title": "Two", "url": "https://example.com/2" },
                { "title": "Three", "url": "https://example.com/3" }
            ]
        });
        let articles = feed(3).parse_response(&body);
        let titles: Vec<_> = articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["One", "Two"]);
    }

    #[test]
    fn test_parse_item_error_variant() {
        let err = feed(5).parse_item(&json!(42)).unwrap_err();
        match err {
            Error::RecordParse { feed, reason } => {
                assert_eq!(feed, "TestWire");
                assert!(reason.contains("a number"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_text_field_takes_first_array_entry() {
        let item = json!({ "category": ["politics", "world"], "n": 3 });
        assert_eq!(text_field(&item, "category").as_deref(), Some("politics"));
        assert_eq!(text_field(&item, "n"), None);
        assert_eq!(text_field(&item, "missing"), None);
    }
}
