//! Frontier scheduler
//!
//! Implements `get_next_url`: atomically claim one eligible domain, stream
//! its next frontier record, consult the politeness oracle, and release the
//! claim with the appropriate next-eligible time. The active-set invariant
//! guarantees that between claim and release no other worker can touch the
//! domain, which is what makes the per-domain politeness spacing hold.

use crate::crawler::claim::ClaimGuard;
use crate::frontier::{FrontierStore, ReadNext};
use crate::index::{now_ms, SharedIndex};
use crate::output::CrawlCounters;
use crate::robots::{Decision, RobotsOracle};
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// How many empty claims to absorb before reporting "no work right now"
const CLAIM_ATTEMPTS: u32 = 3;

/// Back-off between empty claims
const CLAIM_BACKOFF: Duration = Duration::from_millis(100);

/// A URL handed to a worker for fetching
#[derive(Debug, Clone)]
pub struct NextUrl {
    pub url: Url,
    pub domain: String,
    pub depth: u32,
}

/// Selects the next URL for any worker that asks
pub struct Scheduler {
    index: SharedIndex,
    store: Arc<FrontierStore>,
    oracle: Arc<RobotsOracle>,
    counters: Arc<CrawlCounters>,
}

impl Scheduler {
    pub fn new(
        index: SharedIndex,
        store: Arc<FrontierStore>,
        oracle: Arc<RobotsOracle>,
        counters: Arc<CrawlCounters>,
    ) -> Self {
        Self {
            index,
            store,
            oracle,
            counters,
        }
    }

    /// Gets the next URL some worker should fetch
    ///
    /// Returns `Ok(None)` when no domain is currently eligible (the worker
    /// loop treats that as "idle, try again") or when a claimed domain turned
    /// out to be exhausted. Skipped URLs (robots, exclusion, corrupt records)
    /// are consumed internally: the domain is released with `next = now`,
    /// since nothing was fetched no politeness delay is spent, and the loop
    /// moves on to whichever domain is eligible next.
    ///
    /// Errors are fatal index failures only; the claim guard releases the
    /// domain on every early exit.
    pub async fn get_next_url(&self, worker_id: usize) -> Result<Option<NextUrl>> {
        let mut empty_claims = 0;

        loop {
            let Some(domain) = self.index.claim_eligible_domain(now_ms()).await? else {
                empty_claims += 1;
                if empty_claims >= CLAIM_ATTEMPTS {
                    return Ok(None);
                }
                tokio::time::sleep(CLAIM_BACKOFF).await;
                continue;
            };

            let guard = ClaimGuard::new(domain, self.index.clone());

            let Some(meta) = self.index.get_domain(guard.domain()).await? else {
                // A ready entry without metadata should not exist; drop it.
                tracing::warn!("Claimed domain {} has no metadata", guard.domain());
                guard.release_exhausted().await?;
                continue;
            };

            if meta.is_exhausted() {
                tracing::debug!("Domain {} is exhausted", guard.domain());
                self.counters.inc_frontier_exhausted();
                guard.release_exhausted().await?;
                return Ok(None);
            }

            match self
                .store
                .read_next(guard.domain(), meta.frontier_offset)
                .await?
            {
                ReadNext::End => {
                    // Size said more bytes existed; trust the file.
                    self.counters.inc_frontier_exhausted();
                    guard.release_exhausted().await?;
                    return Ok(None);
                }

                ReadNext::Corrupt(new_offset) => {
                    self.index
                        .set_frontier_offset(guard.domain(), new_offset)
                        .await?;
                    guard.release_at(now_ms()).await?;
                    continue;
                }

                ReadNext::Record(record, new_offset) => {
                    match self.oracle.check(&record.url).await {
                        Decision::Allowed => {
                            let delay = self.oracle.effective_delay(guard.domain()).await;
                            self.index
                                .set_frontier_offset(guard.domain(), new_offset)
                                .await?;

                            let domain = guard.domain().to_string();
                            guard.release_at(now_ms() + delay.as_millis() as i64).await?;

                            self.counters.inc_urls_returned();
                            tracing::debug!(
                                "Worker {} gets {} (depth {})",
                                worker_id,
                                record.url,
                                record.depth
                            );
                            return Ok(Some(NextUrl {
                                url: record.url,
                                domain,
                                depth: record.depth,
                            }));
                        }

                        denied => {
                            match denied {
                                Decision::DeniedExcluded => self.counters.inc_skipped_excluded(),
                                _ => self.counters.inc_skipped_robots(),
                            }
                            tracing::debug!("Skipping {} ({:?})", record.url, denied);

                            self.index
                                .set_frontier_offset(guard.domain(), new_offset)
                                .await?;
                            // No request was issued, so the domain is
                            // immediately eligible again.
                            guard.release_at(now_ms()).await?;
                            continue;
                        }
                    }
                }
            }
        }
    }
}
