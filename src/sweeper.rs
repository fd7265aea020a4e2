//! Retention sweep: archive rows older than the retention period.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::store::{Pages, QueryFilter, RecordStore};
use crate::utils::truncate_for_log;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepOutcome {
    pub archived: usize,
    pub failed: usize,
}

/// Archive every live row whose `Added At` is before `now - retention`.
///
/// Rows are archived page by page as they are read. A failed archive is
/// logged and counted; a failed read ends the sweep with what was done so
/// far.
///
/// # Arguments
///
/// * `store` - Store to scan and archive in
/// * `retention` - How long rows are kept
/// * `now` - Reference time for the cutoff
///
/// # Returns
///
/// A [`SweepOutcome`] with the archived and failed counts. Rows without an
/// `Added At` date are never archived.
#[instrument(level = "info", skip_all, fields(retention_days = retention.num_days()))]
pub async fn sweep<S: RecordStore>(
    store: &S,
    retention: Duration,
    now: DateTime<Utc>,
) -> SweepOutcome {
    let cutoff = now - retention;
    info!(cutoff = %cutoff.to_rfc3339(), "Archiving articles added before cutoff");

    let mut outcome = SweepOutcome::default();
    let mut pages = Pages::new(store, Some(QueryFilter::added_before(cutoff)));

    while let Some(page) = pages.next_page().await {
        let records = match page {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, pages = pages.pages_fetched(), "Error reading old articles; sweep ends early");
                break;
            }
        };

        for record in records {
            match store.archive(&record.id).await {
                Ok(()) => {
                    outcome.archived += 1;
                    info!(
                        id = %record.id,
                        title = %truncate_for_log(&record.title, 50),
                        added = ?record.added_at.map(|t| t.date_naive()),
                        url = record.url.as_deref().unwrap_or(""),
                        "Archived old article"
                    );
                }
                Err(e) => {
                    outcome.failed += 1;
                    error!(id = %record.id, error = %e, "Error archiving article");
                }
            }
        }
    }

    info!(
        archived = outcome.archived,
        failed = outcome.failed,
        pages = pages.pages_fetched(),
        "Cleanup complete"
    );
    outcome
}
