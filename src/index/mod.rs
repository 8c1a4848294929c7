//! Shared index module
//!
//! The authoritative store for domain metadata, the ready queue, the active
//! set, the approximate seen set, and exact visited records. All mutations
//! go through atomic single-statement updates or transactions; workers share
//! one [`SharedIndex`] handle and never hold a lock across multiple
//! operations.

mod retry;
mod schema;
mod seen;
mod sqlite;

pub use retry::RetryPolicy;
pub use schema::{initialize_schema, SCHEMA_SQL};
pub use seen::SeenSet;
pub use sqlite::SqliteIndex;

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Errors that can occur during index operations
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Seen-set checkpoint error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Retry budget exhausted: {0}")]
    RetryExhausted(String),
}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Per-domain metadata held by the index
#[derive(Debug, Clone)]
pub struct DomainMeta {
    pub domain: String,

    /// Location of the append-only frontier file (None before first write)
    pub frontier_path: Option<PathBuf>,

    /// Byte offset up to which frontier records have been consumed
    pub frontier_offset: u64,

    /// Total bytes appended to the frontier file
    pub frontier_size: u64,

    /// Unix ms; the domain is eligible when now >= this value
    pub next_fetch_time: i64,

    /// Raw robots.txt body ("" = assumed allow-all, None = never fetched)
    pub robots_rules: Option<String>,

    /// Unix ms after which the cached rules must be refreshed
    pub robots_expires: Option<i64>,

    /// Effective per-domain delay (max of site Crawl-delay and config floor)
    pub crawl_delay_ms: Option<i64>,

    /// Manual exclusion flag
    pub is_excluded: bool,
}

impl DomainMeta {
    /// Whether every appended record has been consumed
    pub fn is_exhausted(&self) -> bool {
        self.frontier_offset >= self.frontier_size
    }

    /// Whether cached robots rules exist and are unexpired at `now_ms`
    pub fn robots_fresh(&self, now_ms: i64) -> bool {
        self.robots_rules.is_some() && self.robots_expires.map_or(false, |e| e > now_ms)
    }
}

/// Exact record of a URL that was fetched or definitively failed
#[derive(Debug, Clone)]
pub struct VisitedRecord {
    pub url: String,
    pub status_code: Option<u16>,
    pub fetched_at: i64,
    pub content_path: Option<String>,
    pub error: Option<String>,
}

/// Truncated hash of a normalized URL, used as the visited-record key
pub fn hash16(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// Current wall-clock time as unix milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Process-wide handle to the shared index
///
/// Cheap to clone; all workers share the underlying connection and seen set.
/// SQLite operations are retried on transient lock contention with
/// exponential backoff; budget exhaustion escalates as
/// [`IndexError::RetryExhausted`], which callers treat as fatal.
#[derive(Clone)]
pub struct SharedIndex {
    store: Arc<Mutex<SqliteIndex>>,
    seen: Arc<Mutex<SeenSet>>,
    seen_path: Option<PathBuf>,
    retry: RetryPolicy,
}

impl SharedIndex {
    /// Opens the index database and seen-set checkpoint under `data_dir`
    ///
    /// An existing checkpoint at `seen_path` is restored (resume); a missing
    /// or unreadable one starts an empty filter of the configured size.
    pub fn open(
        db_path: &Path,
        seen_path: &Path,
        seen_capacity: usize,
        seen_fpr: f64,
        retry: RetryPolicy,
    ) -> IndexResult<Self> {
        let store = SqliteIndex::open(db_path)?;

        let seen = match SeenSet::load(seen_path) {
            Ok(seen) => {
                tracing::info!("Restored seen set from {}", seen_path.display());
                seen
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                SeenSet::new(seen_capacity, seen_fpr)
            }
            Err(e) => {
                tracing::warn!(
                    "Seen-set checkpoint {} unreadable ({}), starting empty",
                    seen_path.display(),
                    e
                );
                SeenSet::new(seen_capacity, seen_fpr)
            }
        };

        Ok(Self {
            store: Arc::new(Mutex::new(store)),
            seen: Arc::new(Mutex::new(seen)),
            seen_path: Some(seen_path.to_path_buf()),
            retry,
        })
    }

    /// Creates a fully in-memory index (for testing)
    pub fn in_memory(seen_capacity: usize, seen_fpr: f64) -> IndexResult<Self> {
        Ok(Self {
            store: Arc::new(Mutex::new(SqliteIndex::open_in_memory()?)),
            seen: Arc::new(Mutex::new(SeenSet::new(seen_capacity, seen_fpr))),
            seen_path: None,
            retry: RetryPolicy::default(),
        })
    }

    /// Runs an index operation, retrying transient failures
    async fn with_retry<T, F>(&self, op: F) -> IndexResult<T>
    where
        F: Fn(&mut SqliteIndex) -> IndexResult<T>,
    {
        let mut attempt = 0;
        loop {
            let result = {
                let mut store = self.store.lock().await;
                op(&mut store)
            };

            match result {
                Err(e) if e.is_transient() => {
                    if attempt >= self.retry.max_retries {
                        tracing::error!("Index retry budget exhausted: {}", e);
                        return Err(IndexError::RetryExhausted(e.to_string()));
                    }
                    let delay = self.retry.delay_for_attempt(attempt);
                    tracing::warn!("Transient index error ({}), retrying in {:?}", e, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    // ===== Claim protocol =====

    pub async fn claim_eligible_domain(&self, now_ms: i64) -> IndexResult<Option<String>> {
        self.with_retry(|store| store.claim_eligible_domain(now_ms))
            .await
    }

    pub async fn release_domain(&self, domain: &str, next_ms: i64) -> IndexResult<()> {
        self.with_retry(|store| store.release_domain(domain, next_ms))
            .await
    }

    pub async fn release_exhausted(&self, domain: &str) -> IndexResult<()> {
        self.with_retry(|store| store.release_exhausted(domain))
            .await
    }

    // ===== Domain metadata =====

    pub async fn get_domain(&self, domain: &str) -> IndexResult<Option<DomainMeta>> {
        self.with_retry(|store| store.get_domain(domain)).await
    }

    pub async fn set_frontier_offset(&self, domain: &str, offset: u64) -> IndexResult<()> {
        self.with_retry(|store| store.set_frontier_offset(domain, offset))
            .await
    }

    pub async fn record_frontier_append(
        &self,
        domain: &str,
        path: &str,
        bytes: u64,
        now_ms: i64,
    ) -> IndexResult<()> {
        self.with_retry(|store| store.record_frontier_append(domain, path, bytes, now_ms))
            .await
    }

    pub async fn set_robots(
        &self,
        domain: &str,
        rules: Option<&str>,
        expires_ms: i64,
        crawl_delay_ms: i64,
    ) -> IndexResult<()> {
        self.with_retry(|store| store.set_robots(domain, rules, expires_ms, crawl_delay_ms))
            .await
    }

    pub async fn set_excluded(&self, domain: &str) -> IndexResult<()> {
        self.with_retry(|store| store.set_excluded(domain)).await
    }

    // ===== Seen set =====

    /// Records a URL in the seen set; returns whether it was new
    pub async fn seen_check_and_set(&self, url: &str) -> bool {
        self.seen.lock().await.check_and_set(url)
    }

    /// Checks (approximate) membership of a URL in the seen set
    pub async fn seen_contains(&self, url: &str) -> bool {
        self.seen.lock().await.contains(url)
    }

    // ===== Visited records =====

    /// Writes a visited record and adds the URL to the seen set
    pub async fn mark_visited(&self, record: &VisitedRecord) -> IndexResult<()> {
        self.with_retry(|store| store.mark_visited(record)).await?;
        self.seen.lock().await.insert(&record.url);
        Ok(())
    }

    pub async fn get_visited(&self, url: &str) -> IndexResult<Option<VisitedRecord>> {
        self.with_retry(|store| store.get_visited(url)).await
    }

    // ===== Introspection =====

    pub async fn ready_len(&self) -> IndexResult<u64> {
        self.with_retry(|store| store.ready_len()).await
    }

    pub async fn active_len(&self) -> IndexResult<u64> {
        self.with_retry(|store| store.active_len()).await
    }

    pub async fn visited_count(&self) -> IndexResult<u64> {
        self.with_retry(|store| store.visited_count()).await
    }

    pub async fn domain_count(&self) -> IndexResult<u64> {
        self.with_retry(|store| store.domain_count()).await
    }

    pub async fn excluded_count(&self) -> IndexResult<u64> {
        self.with_retry(|store| store.excluded_count()).await
    }

    pub async fn is_ready(&self, domain: &str) -> IndexResult<bool> {
        self.with_retry(|store| store.is_ready(domain)).await
    }

    pub async fn is_active(&self, domain: &str) -> IndexResult<bool> {
        self.with_retry(|store| store.is_active(domain)).await
    }

    // ===== Persistence =====

    /// Checkpoints the seen set to disk (no-op for in-memory indexes)
    pub async fn checkpoint(&self) -> IndexResult<()> {
        if let Some(path) = &self.seen_path {
            let seen = self.seen.lock().await;
            seen.save(path)?;
            tracing::debug!("Checkpointed seen set to {}", path.display());
        }
        Ok(())
    }
}
