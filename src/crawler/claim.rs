//! Scoped domain claims
//!
//! A claim is the exclusive, transient right of one worker to fetch one URL
//! from one domain. [`ClaimGuard`] ties that right to a value: every exit
//! path from the scheduler, including cancellation and errors between claim
//! and release, releases the domain, so a crashed worker can never wedge a
//! domain in the active set.

use crate::index::{now_ms, IndexResult, SharedIndex};

/// Holds a claimed domain and guarantees its release
///
/// Explicit release (with a chosen next-eligible time) is the normal path;
/// if the guard is dropped without one, the domain is released with
/// `next = now` so other workers may immediately attempt it.
pub struct ClaimGuard {
    domain: String,
    index: SharedIndex,
    released: bool,
}

impl ClaimGuard {
    pub fn new(domain: String, index: SharedIndex) -> Self {
        Self {
            domain,
            index,
            released: false,
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Releases the claim, rescheduling the domain at `next_ms`
    pub async fn release_at(mut self, next_ms: i64) -> IndexResult<()> {
        self.released = true;
        self.index.release_domain(&self.domain, next_ms).await
    }

    /// Releases the claim without rescheduling (frontier exhausted)
    pub async fn release_exhausted(mut self) -> IndexResult<()> {
        self.released = true;
        self.index.release_exhausted(&self.domain).await
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let index = self.index.clone();
        let domain = std::mem::take(&mut self.domain);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = index.release_domain(&domain, now_ms()).await {
                        tracing::warn!("Failed to release claim on {} at teardown: {}", domain, e);
                    } else {
                        tracing::debug!("Released abandoned claim on {}", domain);
                    }
                });
            }
            Err(_) => {
                tracing::warn!("No runtime available to release claim on {}", domain);
            }
        }
    }
}
