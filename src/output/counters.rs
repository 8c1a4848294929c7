//! Runtime crawl counters
//!
//! Shared atomic counters updated by the scheduler, writer, and workers and
//! read by the progress logger and the metrics exporter.

use std::sync::atomic::{AtomicU64, Ordering};

/// Aggregated crawl counters, shared across all workers
#[derive(Debug, Default)]
pub struct CrawlCounters {
    pages_fetched: AtomicU64,
    fetch_errors: AtomicU64,
    urls_returned: AtomicU64,
    skipped_robots: AtomicU64,
    skipped_excluded: AtomicU64,
    frontier_exhausted: AtomicU64,
    urls_enqueued: AtomicU64,
    urls_deduplicated: AtomicU64,
}

/// A point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub pages_fetched: u64,
    pub fetch_errors: u64,
    pub urls_returned: u64,
    pub skipped_robots: u64,
    pub skipped_excluded: u64,
    pub frontier_exhausted: u64,
    pub urls_enqueued: u64,
    pub urls_deduplicated: u64,
}

impl CrawlCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_pages_fetched(&self) {
        self.pages_fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_fetch_errors(&self) {
        self.fetch_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_urls_returned(&self) {
        self.urls_returned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_skipped_robots(&self) {
        self.skipped_robots.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_skipped_excluded(&self) {
        self.skipped_excluded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_frontier_exhausted(&self) {
        self.frontier_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_enqueued(&self, n: u64) {
        self.urls_enqueued.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_deduplicated(&self) {
        self.urls_deduplicated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pages_fetched(&self) -> u64 {
        self.pages_fetched.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            pages_fetched: self.pages_fetched.load(Ordering::Relaxed),
            fetch_errors: self.fetch_errors.load(Ordering::Relaxed),
            urls_returned: self.urls_returned.load(Ordering::Relaxed),
            skipped_robots: self.skipped_robots.load(Ordering::Relaxed),
            skipped_excluded: self.skipped_excluded.load(Ordering::Relaxed),
            frontier_exhausted: self.frontier_exhausted.load(Ordering::Relaxed),
            urls_enqueued: self.urls_enqueued.load(Ordering::Relaxed),
            urls_deduplicated: self.urls_deduplicated.load(Ordering::Relaxed),
        }
    }
}
