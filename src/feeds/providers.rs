//! The concrete news APIs, all scoped to Nigerian English-language news.

use reqwest::Client;
use tracing::{info, warn};

use super::{ApiFeed, ProviderSpec};
use crate::config::{Credentials, Settings};
use crate::error::{Error, Result};
use crate::models::Source;

pub const GNEWS: ProviderSpec = ProviderSpec {
    name: "GNews",
    source: Source::GNews,
    endpoint: "https://gnews.io/api/v4/top-headlines?country=ng&lang=en&token={api_key}&max={max}",
    items_field: "articles",
    title_field: "title",
    url_field: "url",
    published_field: "publishedAt",
    category_field: None,
};

pub const MEDIASTACK: ProviderSpec = ProviderSpec {
    name: "MediaStack",
    source: Source::MediaStack,
    endpoint: "http://api.mediastack.com/v1/news?access_key={api_key}&countries=ng&languages=en&limit={max}",
    items_field: "data",
    title_field: "title",
    url_field: "url",
    published_field: "published_at",
    category_field: Some("category"),
};

pub const CURRENTS: ProviderSpec = ProviderSpec {
    name: "Currents",
    source: Source::Currents,
    endpoint: "https://api.currentsapi.services/v1/latest-news?apiKey={api_key}&language=en&region=ng",
    items_field: "news",
    title_field: "title",
    url_field: "url",
    published_field: "published",
    category_field: Some("category"),
};

/// One feed per provider that has an API key. Providers without a key are
/// skipped with a warning.
pub fn configured_feeds(credentials: &Credentials, settings: &Settings) -> Result<Vec<ApiFeed>> {
    let client = Client::builder()
        .timeout(settings.request_timeout())
        .build()
        .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;

    let keyed = [
        (GNEWS, &credentials.gnews_api_key),
        (MEDIASTACK, &credentials.mediastack_api_key),
        (CURRENTS, &credentials.currents_api_key),
    ];

    let mut feeds = Vec::new();
    for (spec, key) in keyed {
        match key {
            Some(key) => feeds.push(ApiFeed::new(
                client.clone(),
                spec,
                key.clone(),
                settings.max_records_per_feed,
            )),
            None => warn!(feed = spec.name, "No API key configured; skipping feed"),
        }
    }

    info!(count = feeds.len(), "Configured news feeds");
    Ok(feeds)
}
