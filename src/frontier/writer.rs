//! Frontier ingest path
//!
//! Takes newly discovered URLs through normalization, dedup against the seen
//! set, grouping by domain, file append, and the index update, in that
//! order. Because the seen set is checked before any append,
//! repeat submissions of a URL are no-ops after the first; a crash between
//! the seen insert and the file append only loses that URL (acceptable), and
//! a crash between append and index update at worst re-reads a duplicate,
//! which the reader advances past harmlessly.

use crate::frontier::record::FrontierRecord;
use crate::frontier::store::FrontierStore;
use crate::index::{now_ms, SharedIndex};
use crate::output::CrawlCounters;
use crate::url::{normalize_url, registrable_domain};
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;

/// Default priority for newly discovered URLs
const DEFAULT_PRIORITY: f32 = 1.0;

/// Ingests discovered URLs into the per-domain frontier files
pub struct FrontierWriter {
    index: SharedIndex,
    store: Arc<FrontierStore>,
    counters: Arc<CrawlCounters>,

    /// When set, only depth-0 (seed) records are accepted
    seeded_only: bool,
}

impl FrontierWriter {
    pub fn new(
        index: SharedIndex,
        store: Arc<FrontierStore>,
        counters: Arc<CrawlCounters>,
        seeded_only: bool,
    ) -> Self {
        Self {
            index,
            store,
            counters,
            seeded_only,
        }
    }

    /// Adds URLs discovered on a page fetched at `source_depth`
    ///
    /// Records are enqueued at `source_depth + 1`. Returns the number of
    /// survivors: URLs that were valid, newly seen, and enqueued.
    pub async fn add_urls(&self, discovered: Vec<(String, u32)>) -> Result<usize> {
        let items = discovered
            .into_iter()
            .map(|(url, source_depth)| (url, source_depth.saturating_add(1)))
            .collect();
        self.enqueue(items).await
    }

    /// Ingests seed lines at depth 0
    ///
    /// Bare domains are expanded to `http://{domain}/`; blank lines and
    /// `#` comments are ignored.
    pub async fn ingest_seeds(&self, lines: &[String]) -> Result<usize> {
        let items = lines
            .iter()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| (expand_seed(line), 0))
            .collect();
        self.enqueue(items).await
    }

    /// Core ingest: items carry their final record depth
    async fn enqueue(&self, items: Vec<(String, u32)>) -> Result<usize> {
        let added_at = now_ms() / 1000;
        let mut by_domain: HashMap<String, Vec<FrontierRecord>> = HashMap::new();

        for (raw, depth) in items {
            if self.seeded_only && depth > 0 {
                continue;
            }

            let url = match normalize_url(&raw) {
                Ok(url) => url,
                Err(e) => {
                    tracing::debug!("Dropping unusable URL {:?}: {}", raw, e);
                    continue;
                }
            };

            let Some(domain) = registrable_domain(&url) else {
                continue;
            };

            if !self.index.seen_check_and_set(url.as_str()).await {
                self.counters.inc_deduplicated();
                continue;
            }

            by_domain
                .entry(domain)
                .or_default()
                .push(FrontierRecord::new(url, depth, DEFAULT_PRIORITY, added_at));
        }

        let mut added = 0;
        for (domain, records) in by_domain {
            let (path, bytes) = self.store.append(&domain, &records).await?;
            self.index
                .record_frontier_append(&domain, &path.to_string_lossy(), bytes, now_ms())
                .await?;

            added += records.len();
            self.counters.add_enqueued(records.len() as u64);
            tracing::debug!("Enqueued {} URLs for {}", records.len(), domain);
        }

        Ok(added)
    }
}

/// Expands a seed line into a URL (bare domains become `http://{domain}/`)
fn expand_seed(line: &str) -> String {
    if line.contains("://") {
        line.to_string()
    } else {
        format!("http://{}/", line)
    }
}
