//! Frontier and resume integration tests
//!
//! Cover seed deduplication, manual exclusions, and offset preservation
//! across a process restart (file-backed index + frontier tree).

use driftnet::crawler::Scheduler;
use driftnet::frontier::{FrontierStore, FrontierWriter, ReadNext};
use driftnet::index::{now_ms, RetryPolicy, SharedIndex};
use driftnet::output::CrawlCounters;
use driftnet::robots::{apply_exclusions, parse_exclusions, OracleConfig, RobotsOracle};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn open_index(dir: &Path) -> SharedIndex {
    SharedIndex::open(
        &dir.join("index.db"),
        &dir.join("seen.bloom"),
        10_000,
        0.001,
        RetryPolicy::default(),
    )
    .unwrap()
}

fn build_stack(
    dir: &Path,
    index: &SharedIndex,
) -> (Scheduler, FrontierWriter, Arc<FrontierStore>) {
    let store = Arc::new(FrontierStore::new(dir));
    let counters = Arc::new(CrawlCounters::new());
    let oracle = Arc::new(RobotsOracle::new(
        index.clone(),
        reqwest::Client::new(),
        OracleConfig {
            min_delay: Duration::ZERO,
            ..OracleConfig::default()
        },
    ));
    let writer = FrontierWriter::new(index.clone(), store.clone(), counters.clone(), false);
    let scheduler = Scheduler::new(index.clone(), store.clone(), oracle, counters);
    (scheduler, writer, store)
}

async fn cache_allow_all(index: &SharedIndex, domain: &str) {
    index
        .set_robots(domain, None, now_ms() + 3_600_000, 0)
        .await
        .unwrap();
}

#[tokio::test]
async fn duplicate_seed_is_deduplicated() {
    let dir = TempDir::new().unwrap();
    let index = SharedIndex::in_memory(10_000, 0.001).unwrap();
    let (_, writer, store) = build_stack(dir.path(), &index);

    // The seed file lists the same URL twice
    let seeds = vec![
        "http://a.example/1".to_string(),
        "http://a.example/1".to_string(),
    ];
    let added = writer.ingest_seeds(&seeds).await.unwrap();
    assert_eq!(added, 1);

    assert!(index.seen_contains("http://a.example/1").await);

    // The frontier file holds exactly one line
    let mut lines = 0;
    let mut offset = 0;
    while let ReadNext::Record(_, next) = store.read_next("a.example", offset).await.unwrap() {
        lines += 1;
        offset = next;
    }
    assert_eq!(lines, 1);
}

#[tokio::test]
async fn exclusion_takes_precedence_over_robots() {
    let dir = TempDir::new().unwrap();
    let index = SharedIndex::in_memory(10_000, 0.001).unwrap();
    let (scheduler, writer, _) = build_stack(dir.path(), &index);

    let excluded = parse_exclusions("# manual exclusions\nblocked.example\n");
    apply_exclusions(&index, &excluded).await.unwrap();

    // Robots would allow everything; exclusion must still win
    cache_allow_all(&index, "blocked.example").await;

    let added = writer
        .add_urls(vec![("http://blocked.example/x".to_string(), 0)])
        .await
        .unwrap();
    assert_eq!(added, 1);

    // Accepted into the frontier and the seen set...
    assert!(index.seen_contains("http://blocked.example/x").await);
    // ...but never in ready, and never returned
    assert!(!index.is_ready("blocked.example").await.unwrap());
    assert!(scheduler.get_next_url(0).await.unwrap().is_none());
}

#[tokio::test]
async fn resume_preserves_read_offset() {
    let dir = TempDir::new().unwrap();

    // First process: enqueue three URLs, consume one, then "die"
    {
        let index = open_index(dir.path());
        let (scheduler, writer, _) = build_stack(dir.path(), &index);
        cache_allow_all(&index, "a.example").await;

        writer
            .add_urls(vec![
                ("http://a.example/1".to_string(), 0),
                ("http://a.example/2".to_string(), 0),
                ("http://a.example/3".to_string(), 0),
            ])
            .await
            .unwrap();

        let first = scheduler.get_next_url(0).await.unwrap().unwrap();
        assert_eq!(first.url.path(), "/1");

        index.checkpoint().await.unwrap();
        // Everything dropped here: simulated crash after one fetch
    }

    // Second process: resume from the same data dir
    {
        let index = open_index(dir.path());
        let (scheduler, _, _) = build_stack(dir.path(), &index);

        let next = scheduler.get_next_url(0).await.unwrap().unwrap();
        assert_eq!(next.url.path(), "/2", "resume must continue at the 2nd URL");

        let after = scheduler.get_next_url(0).await.unwrap().unwrap();
        assert_eq!(after.url.path(), "/3");

        // And nothing invents a 4th record
        assert!(scheduler.get_next_url(0).await.unwrap().is_none());
    }
}

#[tokio::test]
async fn resume_does_not_reseed_seen_urls() {
    let dir = TempDir::new().unwrap();

    {
        let index = open_index(dir.path());
        let (_, writer, _) = build_stack(dir.path(), &index);

        let added = writer
            .ingest_seeds(&["http://a.example/1".to_string()])
            .await
            .unwrap();
        assert_eq!(added, 1);

        index.checkpoint().await.unwrap();
    }

    {
        let index = open_index(dir.path());
        let (_, writer, store) = build_stack(dir.path(), &index);

        // Re-ingesting the same seed file is a no-op thanks to the
        // restored seen set
        let added = writer
            .ingest_seeds(&["http://a.example/1".to_string()])
            .await
            .unwrap();
        assert_eq!(added, 0);

        let mut lines = 0;
        let mut offset = 0;
        while let ReadNext::Record(_, next) =
            store.read_next("a.example", offset).await.unwrap()
        {
            lines += 1;
            offset = next;
        }
        assert_eq!(lines, 1);
    }
}

#[tokio::test]
async fn reading_whole_file_reaches_frontier_size_exactly() {
    let dir = TempDir::new().unwrap();
    let index = SharedIndex::in_memory(10_000, 0.001).unwrap();
    let (_, writer, store) = build_stack(dir.path(), &index);

    writer
        .add_urls(vec![
            ("http://a.example/alpha".to_string(), 0),
            ("http://a.example/beta".to_string(), 1),
            ("http://a.example/a-much-longer-path/than/the/others".to_string(), 2),
        ])
        .await
        .unwrap();

    let meta = index.get_domain("a.example").await.unwrap().unwrap();

    let mut offset = 0;
    while let ReadNext::Record(_, next) = store.read_next("a.example", offset).await.unwrap() {
        offset = next;
    }
    assert_eq!(offset, meta.frontier_size);
    assert!(meta.frontier_offset <= meta.frontier_size);
}

#[tokio::test]
async fn add_urls_makes_seen_contain_url() {
    let dir = TempDir::new().unwrap();
    let index = SharedIndex::in_memory(10_000, 0.001).unwrap();
    let (_, writer, _) = build_stack(dir.path(), &index);

    writer
        .add_urls(vec![("http://a.example/page".to_string(), 0)])
        .await
        .unwrap();

    assert!(index.seen_contains("http://a.example/page").await);
}
