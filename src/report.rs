//! Run summary output.
//!
//! The summary is printed to stdout at the end of every run (see the
//! [`Display`](std::fmt::Display) impl on [`RunReport`]) and can also be
//! written as JSON with [`write_json`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

use crate::error::Result;
use crate::pipeline::RunMode;
use crate::store::DatabaseStats;
use crate::sweeper::SweepOutcome;
use crate::utils::ensure_writable_dir;

const RULE_WIDTH: usize = 60;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Feeds that were queried.
    pub feeds: usize,
    /// Articles returned by all feeds together.
    pub fetched: usize,
    pub added: usize,
    /// Invalid articles plus duplicates.
    pub skipped: usize,
    /// Articles whose insert failed.
    pub errors: usize,
    pub sweep: SweepOutcome,
    pub stats_before: DatabaseStats,
    pub stats_after: DatabaseStats,
    pub retention_days: i64,
    pub auto_delete: bool,
}

impl RunReport {
    /// Percentage of fetched articles that were inserted.
    pub fn success_rate(&self) -> f64 {
        self.added as f64 / self.fetched.max(1) as f64 * 100.0
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let heavy = "=".repeat(RULE_WIDTH);
        let light = "-".repeat(RULE_WIDTH);

        writeln!(f, "{heavy}")?;
        match self.mode {
            RunMode::Full => {
                writeln!(f, "EXECUTION SUMMARY")?;
                writeln!(f, "{heavy}")?;
                writeln!(f, "Old articles deleted: {}", self.sweep.archived)?;
                if self.sweep.failed > 0 {
                    writeln!(f, "Old articles not deleted (errors): {}", self.sweep.failed)?;
                }
                writeln!(f, "Total articles fetched: {}", self.fetched)?;
                writeln!(f, "Articles added: {}", self.added)?;
                writeln!(f, "Articles skipped (duplicates/invalid): {}", self.skipped)?;
                writeln!(f, "Articles with errors: {}", self.errors)?;
                writeln!(f, "Success rate: {:.1}%", self.success_rate())?;
            }
            RunMode::CleanupOnly => {
                writeln!(f, "CLEANUP SUMMARY")?;
                writeln!(f, "{heavy}")?;
                writeln!(f, "Articles deleted: {}", self.sweep.archived)?;
                if self.sweep.failed > 0 {
                    writeln!(f, "Articles not deleted (errors): {}", self.sweep.failed)?;
                }
                writeln!(f, "Articles before cleanup: {}", self.stats_before.total_articles)?;
            }
        }
        writeln!(f, "{light}")?;
        writeln!(f, "Total articles in database: {}", self.stats_after.total_articles)?;
        writeln!(f, "Recent articles (24h): {}", self.stats_after.recent_articles)?;
        writeln!(f, "Retention period: {} days", self.retention_days)?;
        writeln!(
            f,
            "Auto-delete: {}",
            if self.auto_delete { "Enabled" } else { "Disabled" }
        )?;
        write!(f, "{heavy}")
    }
}

#[derive(Serialize)]
struct ReportJson<'a> {
    #[serde(flatten)]
    report: &'a RunReport,
    success_rate: f64,
}

/// Write the report as pretty JSON, creating the parent directory if needed.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_json(report: &RunReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&ReportJson {
        report,
        success_rate: report.success_rate(),
    })?;

    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_writable_dir(dir).await?;
    }

    fs::write(path, json).await?;
    info!("Wrote JSON summary");
    Ok(())
}
