//! Run orchestration.
//!
//! A [`Pipeline`] drives one run through a fixed sequence of states:
//!
//! ```text
//! Init -> SchemaEnsured -> Swept -> Fetched -> Deduplicated -> Reported -> Done
//!   \
//!    `-> Aborted   (schema setup failed; nothing fetched or written)
//! ```
//!
//! Transitions only move forward. In [`RunMode::CleanupOnly`] the fetch and
//! dedup states are passed through without doing any work.
//!
//! Only a schema failure ends the run with an error. Feed, parse, read and
//! write failures are logged where they happen and show up in the counters
//! of the returned [`RunReport`].

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::config::Settings;
use crate::dedup::DedupIndex;
use crate::error::Result;
use crate::feeds::FeedSource;
use crate::models::{Article, NewRecord};
use crate::report::RunReport;
use crate::store::{RecordStore, database_stats, required_properties};
use crate::sweeper::{SweepOutcome, sweep};
use crate::utils::truncate_for_log;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunState {
    Init,
    SchemaEnsured,
    Swept,
    Fetched,
    Deduplicated,
    Reported,
    Done,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Sweep, fetch, deduplicate and insert.
    Full,
    /// Sweep only.
    CleanupOnly,
}

#[derive(Debug, Default)]
struct InsertCounts {
    added: usize,
    skipped: usize,
    errors: usize,
}

pub struct Pipeline<'a, S, F> {
    store: &'a S,
    feeds: &'a [F],
    settings: &'a Settings,
    mode: RunMode,
    state: RunState,
    index: Option<DedupIndex>,
}

impl<'a, S: RecordStore, F: FeedSource> Pipeline<'a, S, F> {
    pub fn new(store: &'a S, feeds: &'a [F], settings: &'a Settings, mode: RunMode) -> Self {
        Self {
            store,
            feeds,
            settings,
            mode,
            state: RunState::Init,
            index: None,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn advance(&mut self, next: RunState) {
        assert!(
            next > self.state,
            "invalid run state transition {:?} -> {next:?}",
            self.state
        );
        debug!(from = ?self.state, to = ?next, "Run state");
        self.state = next;
    }

    #[instrument(level = "info", skip_all, fields(mode = ?self.mode))]
    pub async fn run(&mut self) -> Result<RunReport> {
        let started_at = Utc::now();

        if let Err(e) = self.store.ensure_schema(&required_properties()).await {
            error!(error = %e, "Failed to set up database; aborting run");
            self.advance(RunState::Aborted);
            return Err(e);
        }
        self.advance(RunState::SchemaEnsured);

        let stats_before = database_stats(self.store, Utc::now()).await;
        info!(total = stats_before.total_articles, "Database contains articles");

        let swept = if self.settings.auto_delete {
            sweep(self.store, self.settings.retention(), Utc::now()).await
        } else {
            info!("Auto-delete disabled; skipping cleanup");
            SweepOutcome::default()
        };
        self.advance(RunState::Swept);

        let (fetched, counts) = match self.mode {
            RunMode::Full => {
                let articles = self.fetch_all().await;
                self.advance(RunState::Fetched);
                let fetched = articles.len();
                let counts = self.insert_new(articles).await;
                self.advance(RunState::Deduplicated);
                (fetched, counts)
            }
            RunMode::CleanupOnly => {
                self.advance(RunState::Fetched);
                self.advance(RunState::Deduplicated);
                (0, InsertCounts::default())
            }
        };

        let stats_after = database_stats(self.store, Utc::now()).await;
        let report = RunReport {
            mode: self.mode,
            started_at,
            finished_at: Utc::now(),
            feeds: match self.mode {
                RunMode::Full => self.feeds.len(),
                RunMode::CleanupOnly => 0,
            },
            fetched,
            added: counts.added,
            skipped: counts.skipped,
            errors: counts.errors,
            sweep: swept,
            stats_before,
            stats_after,
            retention_days: self.settings.retention_days,
            auto_delete: self.settings.auto_delete,
        };
        self.advance(RunState::Reported);

        info!(
            added = report.added,
            skipped = report.skipped,
            errors = report.errors,
            deleted = report.sweep.archived,
            "Run complete"
        );
        self.advance(RunState::Done);
        Ok(report)
    }

    /// Query every feed in order and concatenate the results.
    async fn fetch_all(&self) -> Vec<Article> {
        if self.feeds.is_empty() {
            warn!("No news feeds configured");
        }
        let batches: Vec<Vec<Article>> = stream::iter(self.feeds)
            .then(|feed| feed.fetch())
            .collect()
            .await;
        let articles: Vec<Article> = batches.concat();
        info!(count = articles.len(), feeds = self.feeds.len(), "Fetched articles from all feeds");
        articles
    }

    /// Insert every valid article whose headline is not already known.
    async fn insert_new(&mut self, articles: Vec<Article>) -> InsertCounts {
        let mut counts = InsertCounts::default();
        if articles.is_empty() {
            return counts;
        }

        let mut index = match self.index.take() {
            Some(index) => index,
            None => DedupIndex::load(self.store).await,
        };

        for article in articles {
            let title = truncate_for_log(&article.title, 50);
            if !article.is_valid() {
                counts.skipped += 1;
                warn!(%title, url = %article.url, "Skipping invalid article");
                continue;
            }
            if index.contains(&article.title) {
                counts.skipped += 1;
                debug!(%title, "Skipping duplicate");
                continue;
            }

            let record = NewRecord::from_article(&article, Utc::now());
            match self.store.create(&record).await {
                Ok(stored) => {
                    counts.added += 1;
                    index.add(&article.title);
                    info!(%title, id = %stored.id, "Added article");
                }
                Err(e) => {
                    counts.errors += 1;
                    error!(%title, error = %e, "Error adding article");
                }
            }
        }

        self.index = Some(index);
        counts
    }
}
