//! Index statistics reporting
//!
//! Loads aggregate figures from the shared index for the `--stats` mode and
//! the end-of-crawl summary.

use crate::index::{IndexResult, SharedIndex};
use crate::output::CounterSnapshot;

/// Aggregate figures from the shared index
#[derive(Debug, Clone)]
pub struct IndexStatistics {
    /// URLs actually fetched (or definitively failed)
    pub visited: u64,

    /// Domains the index has metadata for
    pub domains: u64,

    /// Domains currently eligible for claiming
    pub ready: u64,

    /// Domains currently claimed by a worker
    pub active: u64,

    /// Manually excluded domains
    pub excluded: u64,
}

/// Loads statistics from the index
pub async fn load_statistics(index: &SharedIndex) -> IndexResult<IndexStatistics> {
    Ok(IndexStatistics {
        visited: index.visited_count().await?,
        domains: index.domain_count().await?,
        ready: index.ready_len().await?,
        active: index.active_len().await?,
        excluded: index.excluded_count().await?,
    })
}

/// Prints statistics to stdout (used by the `--stats` mode)
pub fn print_statistics(stats: &IndexStatistics) {
    println!("=== Driftnet Index Statistics ===\n");
    println!("Visited URLs:      {}", stats.visited);
    println!("Known domains:     {}", stats.domains);
    println!("Ready domains:     {}", stats.ready);
    println!("Active domains:    {}", stats.active);
    println!("Excluded domains:  {}", stats.excluded);
}

/// Logs the end-of-crawl summary
pub fn log_summary(stats: &IndexStatistics, counters: &CounterSnapshot) {
    tracing::info!(
        "Crawl summary: {} pages fetched ({} errors), {} URLs returned, \
         {} skipped by robots, {} skipped by exclusion, {} enqueued, {} deduplicated",
        counters.pages_fetched,
        counters.fetch_errors,
        counters.urls_returned,
        counters.skipped_robots,
        counters.skipped_excluded,
        counters.urls_enqueued,
        counters.urls_deduplicated,
    );
    tracing::info!(
        "Index totals: {} visited, {} domains ({} excluded)",
        stats.visited,
        stats.domains,
        stats.excluded,
    );
}
