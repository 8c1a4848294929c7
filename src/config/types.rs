use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Immutable crawl configuration, threaded through every constructor
///
/// Built from CLI arguments plus an optional TOML tuning overlay; nothing in
/// here changes after startup.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Newline-separated seed URLs or bare domains
    pub seed_file: PathBuf,

    /// Contact address baked into the User-Agent string
    pub email: String,

    /// Optional newline-separated manual exclusion list
    pub exclude_file: Option<PathBuf>,

    /// Root for the index, frontier files, and content
    pub data_dir: PathBuf,

    /// Concurrent logical workers in this process
    pub max_workers: usize,

    /// Floor on the per-domain delay between fetches
    pub min_crawl_delay: Duration,

    /// Treat existing data dir state as authoritative
    pub resume: bool,

    /// Refuse all non-seed URLs at ingest
    pub seeded_urls_only: bool,

    /// Stop after this many pages have been fetched
    pub max_pages: Option<u64>,

    /// Stop after this much wall-clock time
    pub max_duration: Option<Duration>,

    /// Tunables from the optional TOML overlay
    pub tuning: Tuning,
}

impl CrawlConfig {
    /// The full User-Agent header value
    pub fn user_agent(&self) -> String {
        format!(
            "driftnet/{} (+mailto:{})",
            env!("CARGO_PKG_VERSION"),
            self.email
        )
    }

    /// The product token matched against robots.txt user-agent groups
    pub fn user_agent_token(&self) -> &'static str {
        "driftnet"
    }
}

/// Tunables most deployments never touch
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Tuning {
    /// Seen-set capacity (expected corpus size)
    pub seen_capacity: usize,

    /// Seen-set false-positive rate at capacity
    pub seen_fpr: f64,

    /// How long fetched robots.txt rules stay fresh (seconds)
    pub robots_success_ttl_secs: u64,

    /// How long an assumed allow-all after a failed fetch stays fresh (seconds)
    pub robots_failure_ttl_secs: u64,

    /// Per-request fetch timeout (seconds)
    pub fetch_timeout_secs: u64,

    /// Retries for transient fetch failures
    pub fetch_max_retries: u32,

    /// Retries for transient index failures
    pub index_max_retries: u32,

    /// Base backoff between index retries (milliseconds)
    pub index_backoff_ms: u64,

    /// Seconds between seen-set checkpoints
    pub checkpoint_interval_secs: u64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            seen_capacity: 160_000_000,
            seen_fpr: 0.001,
            robots_success_ttl_secs: 24 * 60 * 60,
            robots_failure_ttl_secs: 60 * 60,
            fetch_timeout_secs: 30,
            fetch_max_retries: 3,
            index_max_retries: 5,
            index_backoff_ms: 50,
            checkpoint_interval_secs: 300,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_format() {
        let config = CrawlConfig {
            seed_file: PathBuf::from("seeds.txt"),
            email: "ops@example.com".to_string(),
            exclude_file: None,
            data_dir: PathBuf::from("./data"),
            max_workers: 4,
            min_crawl_delay: Duration::from_secs(70),
            resume: false,
            seeded_urls_only: false,
            max_pages: None,
            max_duration: None,
            tuning: Tuning::default(),
        };

        let ua = config.user_agent();
        assert!(ua.starts_with("driftnet/"));
        assert!(ua.contains("+mailto:ops@example.com"));
    }

    #[test]
    fn test_tuning_defaults() {
        let tuning = Tuning::default();
        assert_eq!(tuning.seen_capacity, 160_000_000);
        assert_eq!(tuning.seen_fpr, 0.001);
        assert_eq!(tuning.robots_success_ttl_secs, 86_400);
        assert_eq!(tuning.robots_failure_ttl_secs, 3_600);
    }
}
