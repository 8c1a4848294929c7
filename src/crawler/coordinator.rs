//! Crawl coordination
//!
//! Wires the shared index, frontier, oracle, and scheduler together, then
//! runs the worker pool. Each worker loops: get the next URL, fetch it,
//! record the visit, enqueue discovered links. A supervisor loop watches the
//! stop conditions (page budget, duration budget, empty frontier) and fatal
//! worker errors.

use crate::config::{read_seed_lines, CrawlConfig};
use crate::content::ContentWriter;
use crate::crawler::fetcher::{build_http_client, fetch_url, FetchOutcome, FetchRetryPolicy};
use crate::crawler::parser::parse_html;
use crate::crawler::scheduler::{NextUrl, Scheduler};
use crate::frontier::{FrontierStore, FrontierWriter};
use crate::index::{now_ms, RetryPolicy, SharedIndex, VisitedRecord};
use crate::output::{load_statistics, log_summary, CrawlCounters};
use crate::robots::{apply_exclusions, load_exclusions, OracleConfig, RobotsOracle};
use crate::{CrawlError, Result};
use reqwest::Client;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Sleep between worker polls when no domain is eligible
const IDLE_BACKOFF: Duration = Duration::from_millis(500);

/// Supervisor poll interval
const SUPERVISE_INTERVAL: Duration = Duration::from_millis(500);

/// Owns every long-lived component of one crawl
pub struct Coordinator {
    config: Arc<CrawlConfig>,
    index: SharedIndex,
    scheduler: Arc<Scheduler>,
    writer: Arc<FrontierWriter>,
    content: Arc<ContentWriter>,
    client: Client,
    counters: Arc<CrawlCounters>,
}

impl Coordinator {
    /// Prepares the data directory and builds all components
    ///
    /// Fatal here: unwritable data dir, unopenable index, unreadable
    /// exclusion file.
    pub async fn new(config: CrawlConfig) -> Result<Self> {
        prepare_data_dir(&config).await?;

        let index = SharedIndex::open(
            &config.data_dir.join("index.db"),
            &config.data_dir.join("seen.bloom"),
            config.tuning.seen_capacity,
            config.tuning.seen_fpr,
            RetryPolicy {
                max_retries: config.tuning.index_max_retries,
                base_delay: Duration::from_millis(config.tuning.index_backoff_ms),
            },
        )?;

        if let Some(exclude_file) = &config.exclude_file {
            let domains = load_exclusions(exclude_file)?;
            apply_exclusions(&index, &domains).await?;
        }

        let client = build_http_client(
            &config.user_agent(),
            Duration::from_secs(config.tuning.fetch_timeout_secs),
        )?;

        let store = Arc::new(FrontierStore::new(&config.data_dir));
        let counters = Arc::new(CrawlCounters::new());
        let oracle = Arc::new(RobotsOracle::new(
            index.clone(),
            client.clone(),
            OracleConfig {
                user_agent: config.user_agent_token().to_string(),
                min_delay: config.min_crawl_delay,
                success_ttl: Duration::from_secs(config.tuning.robots_success_ttl_secs),
                failure_ttl: Duration::from_secs(config.tuning.robots_failure_ttl_secs),
            },
        ));
        let writer = Arc::new(FrontierWriter::new(
            index.clone(),
            store.clone(),
            counters.clone(),
            config.seeded_urls_only,
        ));
        let scheduler = Arc::new(Scheduler::new(
            index.clone(),
            store,
            oracle,
            counters.clone(),
        ));
        let content = Arc::new(ContentWriter::new(&config.data_dir));

        Ok(Self {
            config: Arc::new(config),
            index,
            scheduler,
            writer,
            content,
            client,
            counters,
        })
    }

    /// Runs the crawl to completion
    ///
    /// Returns Ok on any normal stop condition (page budget, duration
    /// budget, empty frontier); returns the first fatal error otherwise.
    pub async fn run(&self) -> Result<()> {
        let lines = read_seed_lines(&self.config.seed_file)?;
        let seeded = self.writer.ingest_seeds(&lines).await?;
        tracing::info!("Ingested {} seed URLs", seeded);

        let shutdown = Arc::new(AtomicBool::new(false));
        let busy = Arc::new(AtomicUsize::new(0));
        let started = Instant::now();

        let mut handles = Vec::with_capacity(self.config.max_workers);
        for worker_id in 0..self.config.max_workers {
            handles.push(tokio::spawn(worker_loop(
                worker_id,
                self.scheduler.clone(),
                self.writer.clone(),
                self.content.clone(),
                self.index.clone(),
                self.client.clone(),
                self.counters.clone(),
                self.config.clone(),
                shutdown.clone(),
                busy.clone(),
            )));
        }
        tracing::info!("Started {} workers", self.config.max_workers);

        let mut fatal: Option<CrawlError> = None;
        let mut drained_polls = 0;
        let mut last_checkpoint = Instant::now();
        let checkpoint_interval =
            Duration::from_secs(self.config.tuning.checkpoint_interval_secs);

        loop {
            tokio::time::sleep(SUPERVISE_INTERVAL).await;

            if shutdown.load(Ordering::Relaxed) {
                break;
            }

            if let Some(max) = self.config.max_pages {
                if self.counters.pages_fetched() >= max {
                    tracing::info!("Reached page budget ({})", max);
                    break;
                }
            }

            if let Some(max) = self.config.max_duration {
                if started.elapsed() >= max {
                    tracing::info!("Reached duration budget ({:?})", max);
                    break;
                }
            }

            match self.frontier_drained(&busy).await {
                Ok(true) => {
                    // A worker mid-page holds no claim, so require two
                    // consecutive drained observations before stopping.
                    drained_polls += 1;
                    if drained_polls >= 2 {
                        tracing::info!("Frontier empty and no work in flight; crawl complete");
                        break;
                    }
                }
                Ok(false) => drained_polls = 0,
                Err(e) => {
                    fatal = Some(e);
                    break;
                }
            }

            if last_checkpoint.elapsed() >= checkpoint_interval {
                if let Err(e) = self.index.checkpoint().await {
                    tracing::warn!("Seen-set checkpoint failed: {}", e);
                }
                last_checkpoint = Instant::now();
            }
        }

        shutdown.store(true, Ordering::Relaxed);
        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    if fatal.is_none() {
                        fatal = Some(e);
                    }
                }
                Err(e) => tracing::error!("Worker task panicked: {}", e),
            }
        }

        if let Err(e) = self.index.checkpoint().await {
            tracing::warn!("Final seen-set checkpoint failed: {}", e);
        }

        match load_statistics(&self.index).await {
            Ok(stats) => log_summary(&stats, &self.counters.snapshot()),
            Err(e) => tracing::warn!("Could not load final statistics: {}", e),
        }

        match fatal {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Whether no domain has pending work now or scheduled for later, and
    /// no worker is mid-page (a fetched page may still enqueue links)
    async fn frontier_drained(&self, busy: &AtomicUsize) -> Result<bool> {
        let ready = self.index.ready_len().await?;
        let active = self.index.active_len().await?;
        Ok(ready == 0 && active == 0 && busy.load(Ordering::Relaxed) == 0)
    }
}

/// Creates the data directory, probes writability, and (without `--resume`)
/// clears previous crawl state
async fn prepare_data_dir(config: &CrawlConfig) -> Result<()> {
    let dir = &config.data_dir;

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| CrawlError::DataDirUnwritable(format!("{}: {}", dir.display(), e)))?;

    let probe = dir.join(".write-probe");
    tokio::fs::write(&probe, b"probe")
        .await
        .map_err(|e| CrawlError::DataDirUnwritable(format!("{}: {}", dir.display(), e)))?;
    let _ = tokio::fs::remove_file(&probe).await;

    if !config.resume {
        for file in ["index.db", "index.db-wal", "index.db-shm", "seen.bloom"] {
            let _ = tokio::fs::remove_file(dir.join(file)).await;
        }
        let _ = tokio::fs::remove_dir_all(dir.join("frontiers")).await;
        tracing::info!("Starting fresh crawl in {}", dir.display());
    } else {
        tracing::info!("Resuming crawl from {}", dir.display());
    }

    Ok(())
}

/// One logical worker: get URL, fetch, record, enqueue discoveries
#[allow(clippy::too_many_arguments)]
async fn worker_loop(
    worker_id: usize,
    scheduler: Arc<Scheduler>,
    writer: Arc<FrontierWriter>,
    content: Arc<ContentWriter>,
    index: SharedIndex,
    client: Client,
    counters: Arc<CrawlCounters>,
    config: Arc<CrawlConfig>,
    shutdown: Arc<AtomicBool>,
    busy: Arc<AtomicUsize>,
) -> Result<()> {
    let retry = FetchRetryPolicy {
        max_retries: config.tuning.fetch_max_retries,
        ..FetchRetryPolicy::default()
    };

    while !shutdown.load(Ordering::Relaxed) {
        if let Some(max) = config.max_pages {
            if counters.pages_fetched() >= max {
                break;
            }
        }

        match scheduler.get_next_url(worker_id).await {
            Ok(Some(next)) => {
                busy.fetch_add(1, Ordering::Relaxed);
                let result =
                    process_url(&next, &writer, &content, &index, &client, &counters, &retry)
                        .await;
                busy.fetch_sub(1, Ordering::Relaxed);

                if let Err(e) = result {
                    tracing::error!("Worker {} fatal error on {}: {}", worker_id, next.url, e);
                    shutdown.store(true, Ordering::Relaxed);
                    return Err(e);
                }
            }
            Ok(None) => {
                tokio::time::sleep(IDLE_BACKOFF).await;
            }
            Err(e) => {
                tracing::error!("Worker {}: scheduler failed: {}", worker_id, e);
                shutdown.store(true, Ordering::Relaxed);
                return Err(e);
            }
        }
    }

    tracing::debug!("Worker {} exiting", worker_id);
    Ok(())
}

/// Fetches one URL, persists its outcome, and enqueues discovered links
async fn process_url(
    next: &NextUrl,
    writer: &FrontierWriter,
    content: &ContentWriter,
    index: &SharedIndex,
    client: &Client,
    counters: &CrawlCounters,
    retry: &FetchRetryPolicy,
) -> Result<()> {
    let outcome = fetch_url(client, next.url.as_str(), retry).await;
    let fetched_at = now_ms();

    match outcome {
        FetchOutcome::Success {
            status_code,
            content_type,
            body,
            ..
        } => {
            counters.inc_pages_fetched();

            let mut content_path = None;
            let mut links = Vec::new();

            if content_type.is_empty() || content_type.contains("text/html") {
                let parsed = parse_html(&body, &next.url);
                if !parsed.text.is_empty() {
                    match content.write(next.url.as_str(), &parsed.text).await {
                        Ok(path) => content_path = Some(path.to_string_lossy().into_owned()),
                        Err(e) => {
                            tracing::warn!("Content write failed for {}: {}", next.url, e)
                        }
                    }
                }
                links = parsed.links;
            }

            index
                .mark_visited(&VisitedRecord {
                    url: next.url.to_string(),
                    status_code: Some(status_code),
                    fetched_at,
                    content_path,
                    error: None,
                })
                .await?;

            if !links.is_empty() {
                let discovered = links.into_iter().map(|link| (link, next.depth)).collect();
                writer.add_urls(discovered).await?;
            }
        }

        FetchOutcome::HttpFailure { status_code } => {
            counters.inc_fetch_errors();
            tracing::debug!("HTTP {} for {}", status_code, next.url);
            index
                .mark_visited(&VisitedRecord {
                    url: next.url.to_string(),
                    status_code: Some(status_code),
                    fetched_at,
                    content_path: None,
                    error: Some(format!("http {}", status_code)),
                })
                .await?;
        }

        FetchOutcome::NetworkFailure { error } => {
            counters.inc_fetch_errors();
            tracing::debug!("Fetch failed for {}: {}", next.url, error);
            index
                .mark_visited(&VisitedRecord {
                    url: next.url.to_string(),
                    status_code: None,
                    fetched_at,
                    content_path: None,
                    error: Some(error),
                })
                .await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tuning;
    use tempfile::tempdir;

    fn config_for(dir: &std::path::Path, resume: bool) -> CrawlConfig {
        CrawlConfig {
            seed_file: dir.join("seeds.txt"),
            email: "ops@example.com".to_string(),
            exclude_file: None,
            data_dir: dir.to_path_buf(),
            max_workers: 2,
            min_crawl_delay: Duration::from_secs(70),
            resume,
            seeded_urls_only: false,
            max_pages: None,
            max_duration: None,
            tuning: Tuning::default(),
        }
    }

    #[tokio::test]
    async fn test_prepare_fresh_wipes_state() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("index.db"), b"old").unwrap();
        std::fs::write(dir.path().join("seen.bloom"), b"old").unwrap();
        std::fs::create_dir_all(dir.path().join("frontiers/ab")).unwrap();

        prepare_data_dir(&config_for(dir.path(), false)).await.unwrap();

        assert!(!dir.path().join("index.db").exists());
        assert!(!dir.path().join("seen.bloom").exists());
        assert!(!dir.path().join("frontiers").exists());
    }

    #[tokio::test]
    async fn test_prepare_resume_keeps_state() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("index.db"), b"old").unwrap();

        prepare_data_dir(&config_for(dir.path(), true)).await.unwrap();

        assert!(dir.path().join("index.db").exists());
    }

    #[tokio::test]
    async fn test_prepare_rejects_unwritable_dir() {
        let result = prepare_data_dir(&config_for(
            std::path::Path::new("/proc/definitely-not-writable"),
            false,
        ))
        .await;
        assert!(matches!(result, Err(CrawlError::DataDirUnwritable(_))));
    }
}
