//! Small helpers shared across the pipeline.

use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, instrument};

use crate::error::Result;

/// Shorten a headline (or any string) for a log line.
///
/// Strings longer than `max` characters are cut on a character boundary and
/// suffixed with an ellipsis and the number of bytes dropped.
///
/// # Arguments
///
/// * `s` - The string to shorten
/// * `max` - Maximum number of characters kept
///
/// # Returns
///
/// `s` unchanged when it fits, otherwise the cut prefix plus a byte count.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("Naira steadies", 5), "Naira…(+9 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Sleep for the configured write delay. A zero delay returns immediately.
pub async fn pace(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Await a store write, then sleep for `delay` whatever its outcome.
///
/// The pause is pacing between writes, not a retry: the write's result is
/// returned as-is once the delay has elapsed.
///
/// # Arguments
///
/// * `delay` - Fixed pause after the write (`Settings::write_delay`)
/// * `write` - The write request future
pub async fn paced<T, E>(
    delay: Duration,
    write: impl Future<Output = std::result::Result<T, E>>,
) -> std::result::Result<T, E> {
    let result = write.await;
    pace(delay).await;
    result
}

/// Create `path` if needed and check that a file can be written inside it.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).await?;
    let probe = path.join(".newsbot-write-probe");
    fs::write(&probe, b"").await?;
    let _ = fs::remove_file(&probe).await;
    debug!("Directory is writable");
    Ok(())
}
