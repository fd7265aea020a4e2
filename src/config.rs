//! Run configuration.
//!
//! [`Settings`] holds the tuning knobs and is built once at start-up:
//! built-in defaults, then the optional YAML file given with `--config`,
//! then CLI overrides. [`Credentials`] carries the tokens and keys from the
//! CLI/environment. Both are passed by reference to whatever needs them.
//!
//! ```yaml
//! # newsbot.yaml
//! request_timeout_secs: 30
//! write_delay_ms: 100
//! max_records_per_feed: 50
//! retention_days: 3
//! auto_delete: true
//! ```

use serde::Deserialize;
use std::time::Duration;
use tracing::{info, instrument};

use crate::cli::Cli;
use crate::error::{Error, Result};

/// Longest accepted retention period (about a century).
pub const MAX_RETENTION_DAYS: i64 = 36_500;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Timeout applied to every HTTP request, feeds and store alike.
    pub request_timeout_secs: u64,
    /// Fixed pause after each store write. Pacing only; nothing is retried.
    pub write_delay_ms: u64,
    /// Upper bound on articles taken from one feed response.
    pub max_records_per_feed: u32,
    /// Rows older than this many days are archived.
    pub retention_days: i64,
    /// When false the retention sweep is skipped entirely.
    pub auto_delete: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            write_delay_ms: 100,
            max_records_per_feed: 50,
            retention_days: 3,
            auto_delete: true,
        }
    }
}

impl Settings {
    /// Build settings from defaults, the optional YAML file and CLI flags.
    #[instrument(level = "info", skip_all, fields(config = ?cli.config))]
    pub async fn load(cli: &Cli) -> Result<Self> {
        let base = match &cli.config {
            Some(path) => {
                let text = tokio::fs::read_to_string(path).await.map_err(|e| {
                    Error::Config(format!("cannot read settings file {path}: {e}"))
                })?;
                info!(path = %path, "Loaded settings file");
                Self::from_yaml_str(&text)?
            }
            None => Self::default(),
        };
        base.with_overrides(cli.retention_days, cli.no_auto_delete)
            .validate()
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    fn with_overrides(mut self, retention_days: Option<i64>, no_auto_delete: bool) -> Self {
        if let Some(days) = retention_days {
            self.retention_days = days;
        }
        if no_auto_delete {
            self.auto_delete = false;
        }
        self
    }

    fn validate(self) -> Result<Self> {
        if !(1..=MAX_RETENTION_DAYS).contains(&self.retention_days) {
            return Err(Error::Config(format!(
                "retention_days must be between 1 and {MAX_RETENTION_DAYS}, got {}",
                self.retention_days
            )));
        }
        if self.max_records_per_feed < 1 {
            return Err(Error::Config(
                "max_records_per_feed must be at least 1".to_string(),
            ));
        }
        Ok(self)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn write_delay(&self) -> Duration {
        Duration::from_millis(self.write_delay_ms)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_days)
    }
}

/// Secrets needed for one run.
#[derive(Clone)]
pub struct Credentials {
    pub notion_token: String,
    pub database_id: String,
    pub gnews_api_key: Option<String>,
    pub mediastack_api_key: Option<String>,
    pub currents_api_key: Option<String>,
}

impl Credentials {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let notion_token = cli.notion_token.trim().to_string();
        let database_id = cli.database_id.trim().to_string();
        if notion_token.is_empty() {
            return Err(Error::Config("NOTION_TOKEN is empty".to_string()));
        }
        if database_id.is_empty() {
            return Err(Error::Config("DATABASE_ID is empty".to_string()));
        }
        Ok(Self {
            notion_token,
            database_id,
            gnews_api_key: non_blank(&cli.gnews_api_key),
            mediastack_api_key: non_blank(&cli.mediastack_api_key),
            currents_api_key: non_blank(&cli.currents_api_key),
        })
    }
}

// Keys must never reach the logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("database_id", &self.database_id)
            .field("gnews_api_key", &self.gnews_api_key.is_some())
            .field("mediastack_api_key", &self.mediastack_api_key.is_some())
            .field("currents_api_key", &self.currents_api_key.is_some())
            .finish()
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}
