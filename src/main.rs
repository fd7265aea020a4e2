//! # newsbot
//!
//! Pulls Nigerian headlines from several news APIs into a Notion database,
//! skipping headlines the database already holds and archiving rows older
//! than the retention period.
//!
//! ## Usage
//!
//! ```sh
//! NOTION_TOKEN=... DATABASE_ID=... GNEWS_API_KEY=... newsbot
//! newsbot --cleanup-only
//! ```
//!
//! ## Architecture
//!
//! One run is a fixed sequence (see [`pipeline`]):
//! 1. **Schema**: add any missing database properties; failure ends the run
//! 2. **Sweep**: archive rows older than the retention period
//! 3. **Fetch**: query every configured feed in turn
//! 4. **Insert**: skip invalid and already-known headlines, create the rest
//! 5. **Report**: print the summary and optionally write it as JSON

use clap::Parser;
use itertools::Itertools;
use std::error::Error as StdError;
use std::path::Path;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod dedup;
mod error;
mod feeds;
mod models;
mod pipeline;
mod report;
mod store;
mod sweeper;
mod utils;

use cli::Cli;
use config::{Credentials, Settings};
use error::Error;
use feeds::{FeedSource, configured_feeds};
use pipeline::{Pipeline, RunMode};
use store::notion::NotionStore;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn StdError>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("newsbot starting up");

    let args = Cli::parse();
    debug!(cleanup_only = args.cleanup_only, config = ?args.config, "Parsed CLI arguments");

    let settings = Settings::load(&args).await?;
    let credentials = Credentials::from_cli(&args)?;
    info!(
        retention_days = settings.retention_days,
        auto_delete = settings.auto_delete,
        write_delay_ms = settings.write_delay_ms,
        "Loaded settings"
    );
    debug!(?credentials, "Loaded credentials");

    // Check the summary path before doing any work against the database.
    if let Some(parent) = args
        .summary_json
        .as_deref()
        .and_then(|p| Path::new(p).parent())
        .filter(|p| !p.as_os_str().is_empty())
    {
        if let Err(e) = utils::ensure_writable_dir(parent).await {
            error!(path = %parent.display(), error = %e, "Summary directory is not writable");
            return Err(e.into());
        }
    }

    let store = NotionStore::new(&credentials, &settings)?;
    let mode = if args.cleanup_only {
        info!("Running cleanup-only mode");
        RunMode::CleanupOnly
    } else {
        RunMode::Full
    };
    let feeds = match mode {
        RunMode::Full => configured_feeds(&credentials, &settings)?,
        RunMode::CleanupOnly => Vec::new(),
    };
    if !feeds.is_empty() {
        info!(feeds = %feeds.iter().map(|f| f.name()).join(", "), "Feeds enabled");
    }

    let mut pipeline = Pipeline::new(&store, &feeds, &settings, mode);
    let outcome = tokio::select! {
        result = pipeline.run() => result,
        _ = tokio::signal::ctrl_c() => Err(Error::Interrupted),
    };
    debug!(state = ?pipeline.state(), "Pipeline stopped");

    let report = match outcome {
        Ok(report) => report,
        Err(Error::Interrupted) => {
            warn!("Process interrupted by user");
            eprintln!("\nProcess interrupted by user");
            return Err(Error::Interrupted.into());
        }
        Err(e) => {
            error!(error = %e, "Run failed");
            return Err(e.into());
        }
    };

    println!("\n{report}");

    if let Some(path) = &args.summary_json {
        if let Err(e) = report::write_json(&report, Path::new(path)).await {
            error!(path = %path, error = %e, "Failed to write JSON summary");
        }
    }

    let elapsed = start_time.elapsed();
    info!(elapsed_secs = elapsed.as_secs_f64(), "newsbot finished");

    Ok(())
}
