//! Per-run index of headlines already in the store.

use std::collections::HashSet;
use tracing::{error, info, instrument};

use crate::store::RecordStore;

/// Set of known headlines, compared by exact match after trimming.
///
/// Loaded once from the store and then only grown in memory; [`DedupIndex::add`]
/// never writes through.
#[derive(Debug, Default)]
pub struct DedupIndex {
    titles: HashSet<String>,
}

impl DedupIndex {
    /// Scan every stored row and index its headline.
    ///
    /// A read failure is logged and yields an empty index, so the run can
    /// still insert (possibly duplicating rows) instead of stopping.
    ///
    /// # Arguments
    ///
    /// * `store` - Store whose live rows are scanned, following every cursor
    ///
    /// # Returns
    ///
    /// An index holding each non-blank, trimmed headline once.
    #[instrument(level = "info", skip_all)]
    pub async fn load<S: RecordStore>(store: &S) -> Self {
        let mut index = Self::default();
        match store.query_all(None).await {
            Ok(records) => {
                for record in records {
                    index.add(&record.title);
                }
                info!(titles = index.len(), "Loaded existing headlines");
            }
            Err(e) => error!(error = %e, "Error fetching existing headlines; continuing with an empty index"),
        }
        index
    }

    pub fn contains(&self, title: &str) -> bool {
        self.titles.contains(title.trim())
    }

    pub fn add(&mut self, title: &str) {
        let title = title.trim();
        if !title.is_empty() {
            self.titles.insert(title.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }
}
