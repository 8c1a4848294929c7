//! Driftnet main entry point
//!
//! Command-line interface for the driftnet web crawler.

use anyhow::bail;
use clap::Parser;
use driftnet::config::{load_tuning, validate, CrawlConfig, Tuning};
use driftnet::crawler::Coordinator;
use driftnet::index::{RetryPolicy, SharedIndex};
use driftnet::output::{load_statistics, print_statistics};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Driftnet: a polite, resumable web crawler
///
/// Starting from a seed list of domains, driftnet fetches HTML pages,
/// extracts links and text, and persists content while respecting
/// robots.txt, per-domain crawl delays, and manual exclusions.
#[derive(Parser, Debug)]
#[command(name = "driftnet")]
#[command(version)]
#[command(about = "A polite, resumable web crawler", long_about = None)]
struct Cli {
    /// Newline-separated seed URLs or bare domains
    #[arg(long, value_name = "PATH", required_unless_present = "stats")]
    seed_file: Option<PathBuf>,

    /// Contact address for the User-Agent string
    #[arg(long, value_name = "ADDR", required_unless_present = "stats")]
    email: Option<String>,

    /// Newline-separated domains to exclude from crawling
    #[arg(long, value_name = "PATH")]
    exclude_file: Option<PathBuf>,

    /// Root directory for frontier files, content, and the index
    #[arg(long, value_name = "PATH", default_value = "./driftnet-data")]
    data_dir: PathBuf,

    /// Concurrent logical workers in this process
    #[arg(long, value_name = "N", default_value_t = 128)]
    max_workers: usize,

    /// Floor on the per-domain delay between fetches
    #[arg(long, value_name = "S", default_value_t = 70)]
    min_crawl_delay_seconds: u64,

    /// Treat an existing data dir as authoritative; do not re-seed seen URLs
    #[arg(long)]
    resume: bool,

    /// After seed ingestion, do not enqueue newly discovered URLs
    #[arg(long)]
    seeded_urls_only: bool,

    /// Stop after fetching this many pages
    #[arg(long, value_name = "N")]
    max_pages: Option<u64>,

    /// Stop after this much wall-clock time
    #[arg(long, value_name = "S")]
    max_duration_seconds: Option<u64>,

    /// Optional TOML tuning overlay
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Show statistics from the index and exit
    #[arg(long)]
    stats: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    if cli.stats {
        return handle_stats(&cli).await;
    }

    let tuning = match &cli.config {
        Some(path) => load_tuning(path)?,
        None => Tuning::default(),
    };

    // clap enforces both unless --stats was given
    let (Some(seed_file), Some(email)) = (cli.seed_file.clone(), cli.email.clone()) else {
        bail!("--seed-file and --email are required");
    };

    let config = CrawlConfig {
        seed_file,
        email,
        exclude_file: cli.exclude_file.clone(),
        data_dir: cli.data_dir.clone(),
        max_workers: cli.max_workers,
        min_crawl_delay: Duration::from_secs(cli.min_crawl_delay_seconds),
        resume: cli.resume,
        seeded_urls_only: cli.seeded_urls_only,
        max_pages: cli.max_pages,
        max_duration: cli.max_duration_seconds.map(Duration::from_secs),
        tuning,
    };

    validate(&config)?;

    tracing::info!(
        "Starting crawl: {} workers, {}s minimum delay, data dir {}",
        config.max_workers,
        config.min_crawl_delay.as_secs(),
        config.data_dir.display()
    );

    let coordinator = Coordinator::new(config).await?;
    match coordinator.run().await {
        Ok(()) => {
            tracing::info!("Crawl completed");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

/// Sets up the tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("driftnet=info,warn"),
            1 => EnvFilter::new("driftnet=debug,info"),
            2 => EnvFilter::new("driftnet=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --stats mode: prints index statistics and exits
async fn handle_stats(cli: &Cli) -> anyhow::Result<()> {
    let db_path = cli.data_dir.join("index.db");
    if !db_path.exists() {
        bail!("no index at {}", db_path.display());
    }

    let index = SharedIndex::open(
        &db_path,
        &cli.data_dir.join("seen.bloom"),
        1,
        0.01,
        RetryPolicy::default(),
    )?;

    let stats = load_statistics(&index).await?;
    print_statistics(&stats);

    Ok(())
}
