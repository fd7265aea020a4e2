//! Command-line interface definitions for newsbot.
//!
//! Arguments are declared with `clap` derive.
//! Credentials can be provided via command-line flags or environment
//! variables; tuning knobs live in an optional YAML file (see
//! [`crate::config::Settings`]) and a few of them can be overridden here.

use clap::Parser;

/// Command-line arguments for newsbot.
///
/// # Examples
///
/// ```sh
/// # Full run: archive old rows, fetch, deduplicate, insert
/// NOTION_TOKEN=... DATABASE_ID=... newsbot
///
/// # Only archive rows older than the retention period
/// newsbot --cleanup-only
///
/// # Keep a week of articles and write a JSON summary
/// newsbot --retention-days 7 --summary-json ./runs/latest.json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Only archive old articles; do not fetch or insert new ones
    #[arg(long)]
    pub cleanup_only: bool,

    /// Optional path to a YAML settings file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Days to keep articles before archiving them
    #[arg(long)]
    pub retention_days: Option<i64>,

    /// Never archive old articles
    #[arg(long)]
    pub no_auto_delete: bool,

    /// Also write the run summary as JSON to this file
    #[arg(long)]
    pub summary_json: Option<String>,

    /// Notion integration token
    #[arg(long, env = "NOTION_TOKEN", hide_env_values = true)]
    pub notion_token: String,

    /// Id of the Notion database holding the articles
    #[arg(long, env = "DATABASE_ID")]
    pub database_id: String,

    /// GNews API key (feed skipped when absent)
    #[arg(long, env = "GNEWS_API_KEY", hide_env_values = true)]
    pub gnews_api_key: Option<String>,

    /// MediaStack API key (feed skipped when absent)
    #[arg(long, env = "MEDIASTACK_API_KEY", hide_env_values = true)]
    pub mediastack_api_key: Option<String>,

    /// Currents API key (feed skipped when absent)
    #[arg(long, env = "CURRENTS_API_KEY", hide_env_values = true)]
    pub currents_api_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "newsbot",
            "--notion-token",
            "secret",
            "--database-id",
            "db123",
        ]);

        assert_eq!(cli.notion_token, "secret");
        assert_eq!(cli.database_id, "db123");
        assert!(!cli.cleanup_only);
        assert!(!cli.no_auto_delete);
        assert_eq!(cli.retention_days, None);
    }

    #[test]
    fn test_cli_cleanup_only_and_overrides() {
        let cli = Cli::parse_from([
            "newsbot",
            "--cleanup-only",
            "--retention-days",
            "7",
            "--no-auto-delete",
            "-c",
            "/etc/newsbot.yaml",
            "--summary-json",
            "/tmp/run.json",
            "--notion-token",
            "secret",
            "--database-id",
            "db123",
            "--gnews-api-key",
            "g-key",
        ]);

        assert!(cli.cleanup_only);
        assert!(cli.no_auto_delete);
        assert_eq!(cli.retention_days, Some(7));
        assert_eq!(cli.config.as_deref(), Some("/etc/newsbot.yaml"));
        assert_eq!(cli.summary_json.as_deref(), Some("/tmp/run.json"));
        assert_eq!(cli.gnews_api_key.as_deref(), Some("g-key"));
    }
}
