//! SQLite implementation of the shared index
//!
//! All multi-key updates (claiming, releasing, recording appends) run inside
//! a single transaction so they are atomic with respect to every other
//! worker on the shared connection.

use crate::index::schema::initialize_schema;
use crate::index::{DomainMeta, IndexError, IndexResult, VisitedRecord};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite-backed shared index
pub struct SqliteIndex {
    conn: Connection,
}

impl SqliteIndex {
    /// Opens (or creates) the index database at `path`
    pub fn open(path: &Path) -> IndexResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory index (for testing)
    pub fn open_in_memory() -> IndexResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    // ===== Claim protocol =====

    /// Atomically pops one eligible domain from ready and moves it to active
    ///
    /// A domain is eligible when its ready-queue score (next-eligible time,
    /// unix ms) is at or before `now_ms`. The earliest-scored domain wins.
    /// Returns `None` when no domain is currently eligible.
    pub fn claim_eligible_domain(&mut self, now_ms: i64) -> IndexResult<Option<String>> {
        let tx = self.conn.transaction()?;

        let claimed: Option<String> = tx
            .query_row(
                "SELECT domain FROM ready_domains
                 WHERE next_fetch_time <= ?1
                 ORDER BY next_fetch_time
                 LIMIT 1",
                params![now_ms],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(domain) = &claimed {
            tx.execute(
                "DELETE FROM ready_domains WHERE domain = ?1",
                params![domain],
            )?;
            tx.execute(
                "INSERT OR IGNORE INTO active_domains (domain) VALUES (?1)",
                params![domain],
            )?;
        }

        tx.commit()?;
        Ok(claimed)
    }

    /// Releases a claimed domain, rescheduling it at `next_ms`
    ///
    /// The domain re-enters the ready queue only if it still has unconsumed
    /// frontier bytes and is not excluded; otherwise it simply leaves the
    /// active set.
    pub fn release_domain(&mut self, domain: &str, next_ms: i64) -> IndexResult<()> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "DELETE FROM active_domains WHERE domain = ?1",
            params![domain],
        )?;

        let row: Option<(i64, i64, bool)> = tx
            .query_row(
                "SELECT frontier_offset, frontier_size, is_excluded
                 FROM domains WHERE domain = ?1",
                params![domain],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        if let Some((offset, size, excluded)) = row {
            if offset < size && !excluded {
                tx.execute(
                    "INSERT INTO ready_domains (domain, next_fetch_time) VALUES (?1, ?2)
                     ON CONFLICT(domain) DO UPDATE SET next_fetch_time = excluded.next_fetch_time",
                    params![domain, next_ms],
                )?;
                tx.execute(
                    "UPDATE domains SET next_fetch_time = ?2 WHERE domain = ?1",
                    params![domain, next_ms],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Releases a claimed domain without rescheduling (frontier exhausted)
    pub fn release_exhausted(&mut self, domain: &str) -> IndexResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM active_domains WHERE domain = ?1",
            params![domain],
        )?;
        tx.execute(
            "DELETE FROM ready_domains WHERE domain = ?1",
            params![domain],
        )?;
        tx.commit()?;
        Ok(())
    }

    // ===== Domain metadata =====

    /// Gets the full metadata row for a domain
    pub fn get_domain(&self, domain: &str) -> IndexResult<Option<DomainMeta>> {
        let meta = self
            .conn
            .query_row(
                "SELECT domain, frontier_path, frontier_offset, frontier_size,
                        next_fetch_time, robots_rules, robots_expires,
                        crawl_delay_ms, is_excluded
                 FROM domains WHERE domain = ?1",
                params![domain],
                |row| {
                    Ok(DomainMeta {
                        domain: row.get(0)?,
                        frontier_path: row.get::<_, Option<String>>(1)?.map(Into::into),
                        frontier_offset: row.get::<_, i64>(2)? as u64,
                        frontier_size: row.get::<_, i64>(3)? as u64,
                        next_fetch_time: row.get(4)?,
                        robots_rules: row.get(5)?,
                        robots_expires: row.get(6)?,
                        crawl_delay_ms: row.get(7)?,
                        is_excluded: row.get(8)?,
                    })
                },
            )
            .optional()?;
        Ok(meta)
    }

    /// Advances a domain's frontier read offset
    ///
    /// Offsets only move forward; a stale smaller value is ignored.
    pub fn set_frontier_offset(&mut self, domain: &str, offset: u64) -> IndexResult<()> {
        self.conn.execute(
            "UPDATE domains SET frontier_offset = MAX(frontier_offset, ?2) WHERE domain = ?1",
            params![domain, offset as i64],
        )?;
        Ok(())
    }

    /// Records an append to a domain's frontier file
    ///
    /// Transactionally bumps `frontier_size`, sets the file path on first
    /// write, and inserts the domain into the ready queue (score = now)
    /// unless it is excluded, already ready, or currently claimed.
    pub fn record_frontier_append(
        &mut self,
        domain: &str,
        path: &str,
        bytes: u64,
        now_ms: i64,
    ) -> IndexResult<()> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO domains (domain, frontier_path, frontier_size)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(domain) DO UPDATE SET
                 frontier_size = frontier_size + ?3,
                 frontier_path = COALESCE(domains.frontier_path, ?2)",
            params![domain, path, bytes as i64],
        )?;

        let excluded: bool = tx.query_row(
            "SELECT is_excluded FROM domains WHERE domain = ?1",
            params![domain],
            |row| row.get(0),
        )?;

        let active: bool = tx
            .query_row(
                "SELECT 1 FROM active_domains WHERE domain = ?1",
                params![domain],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);

        if !excluded && !active {
            // INSERT OR IGNORE keeps an existing (earlier) score
            tx.execute(
                "INSERT OR IGNORE INTO ready_domains (domain, next_fetch_time) VALUES (?1, ?2)",
                params![domain, now_ms],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Stores fetched robots.txt rules and the effective crawl delay
    ///
    /// `rules` of `None` means "allow all" was assumed (fetch failed or 4xx);
    /// the empty-string sentinel is stored so the cache still counts as
    /// populated until `expires_ms`.
    pub fn set_robots(
        &mut self,
        domain: &str,
        rules: Option<&str>,
        expires_ms: i64,
        crawl_delay_ms: i64,
    ) -> IndexResult<()> {
        let stored = rules.unwrap_or("");
        self.conn.execute(
            "INSERT INTO domains (domain, robots_rules, robots_expires, crawl_delay_ms)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(domain) DO UPDATE SET
                 robots_rules = ?2,
                 robots_expires = ?3,
                 crawl_delay_ms = ?4",
            params![domain, stored, expires_ms, crawl_delay_ms],
        )?;
        Ok(())
    }

    /// Marks a domain as manually excluded and removes it from ready
    pub fn set_excluded(&mut self, domain: &str) -> IndexResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO domains (domain, is_excluded) VALUES (?1, 1)
             ON CONFLICT(domain) DO UPDATE SET is_excluded = 1",
            params![domain],
        )?;
        tx.execute(
            "DELETE FROM ready_domains WHERE domain = ?1",
            params![domain],
        )?;
        tx.commit()?;
        Ok(())
    }

    // ===== Visited records =====

    /// Writes (or overwrites) the visited record for a URL
    pub fn mark_visited(&mut self, record: &VisitedRecord) -> IndexResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO visited
                 (url_hash, url, status_code, fetched_at, content_path, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                crate::index::hash16(&record.url),
                record.url,
                record.status_code,
                record.fetched_at,
                record.content_path,
                record.error,
            ],
        )?;
        Ok(())
    }

    /// Looks up the visited record for a URL
    pub fn get_visited(&self, url: &str) -> IndexResult<Option<VisitedRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT url, status_code, fetched_at, content_path, error
                 FROM visited WHERE url_hash = ?1",
                params![crate::index::hash16(url)],
                |row| {
                    Ok(VisitedRecord {
                        url: row.get(0)?,
                        status_code: row.get(1)?,
                        fetched_at: row.get(2)?,
                        content_path: row.get(3)?,
                        error: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    // ===== Introspection =====

    pub fn ready_len(&self) -> IndexResult<u64> {
        self.count("SELECT COUNT(*) FROM ready_domains")
    }

    pub fn active_len(&self) -> IndexResult<u64> {
        self.count("SELECT COUNT(*) FROM active_domains")
    }

    pub fn visited_count(&self) -> IndexResult<u64> {
        self.count("SELECT COUNT(*) FROM visited")
    }

    pub fn domain_count(&self) -> IndexResult<u64> {
        self.count("SELECT COUNT(*) FROM domains")
    }

    pub fn excluded_count(&self) -> IndexResult<u64> {
        self.count("SELECT COUNT(*) FROM domains WHERE is_excluded = 1")
    }

    pub fn is_ready(&self, domain: &str) -> IndexResult<bool> {
        let present = self
            .conn
            .query_row(
                "SELECT 1 FROM ready_domains WHERE domain = ?1",
                params![domain],
                |_| Ok(true),
            )
            .optional()?;
        Ok(present.unwrap_or(false))
    }

    pub fn is_active(&self, domain: &str) -> IndexResult<bool> {
        let present = self
            .conn
            .query_row(
                "SELECT 1 FROM active_domains WHERE domain = ?1",
                params![domain],
                |_| Ok(true),
            )
            .optional()?;
        Ok(present.unwrap_or(false))
    }

    fn count(&self, sql: &str) -> IndexResult<u64> {
        let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(n as u64)
    }
}

impl IndexError {
    /// Whether this error is worth retrying (SQLite lock contention)
    pub fn is_transient(&self) -> bool {
        match self {
            IndexError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_index() -> SqliteIndex {
        let mut index = SqliteIndex::open_in_memory().unwrap();
        index
            .record_frontier_append("a.example", "/tmp/a.frontier", 100, 1_000)
            .unwrap();
        index
            .record_frontier_append("b.example", "/tmp/b.frontier", 100, 2_000)
            .unwrap();
        index
    }

    #[test]
    fn test_claim_pops_earliest_eligible() {
        let mut index = seeded_index();

        let claimed = index.claim_eligible_domain(5_000).unwrap();
        assert_eq!(claimed.as_deref(), Some("a.example"));
    }

    #[test]
    fn test_claim_respects_score() {
        let mut index = seeded_index();

        // Only a.example (score 1000) is eligible at t=1500
        let first = index.claim_eligible_domain(1_500).unwrap();
        assert_eq!(first.as_deref(), Some("a.example"));

        let second = index.claim_eligible_domain(1_500).unwrap();
        assert_eq!(second, None);
    }

    #[test]
    fn test_claimed_domain_not_in_ready() {
        let mut index = seeded_index();

        index.claim_eligible_domain(5_000).unwrap();

        assert!(!index.is_ready("a.example").unwrap());
        assert!(index.is_active("a.example").unwrap());
    }

    #[test]
    fn test_two_claims_never_return_same_domain() {
        let mut index = seeded_index();

        let first = index.claim_eligible_domain(5_000).unwrap().unwrap();
        let second = index.claim_eligible_domain(5_000).unwrap().unwrap();
        assert_ne!(first, second);

        let third = index.claim_eligible_domain(5_000).unwrap();
        assert_eq!(third, None);
    }

    #[test]
    fn test_release_reschedules() {
        let mut index = seeded_index();

        let domain = index.claim_eligible_domain(5_000).unwrap().unwrap();
        index.release_domain(&domain, 70_000).unwrap();

        assert!(!index.is_active(&domain).unwrap());
        assert!(index.is_ready(&domain).unwrap());

        // Not eligible before its new score
        assert_eq!(index.claim_eligible_domain(60_000).unwrap(), None);
        assert_eq!(
            index.claim_eligible_domain(70_000).unwrap().as_deref(),
            Some(domain.as_str())
        );
    }

    #[test]
    fn test_release_drops_consumed_domain() {
        let mut index = seeded_index();

        let domain = index.claim_eligible_domain(5_000).unwrap().unwrap();
        // Consume the whole file
        index.set_frontier_offset(&domain, 100).unwrap();
        index.release_domain(&domain, 70_000).unwrap();

        assert!(!index.is_active(&domain).unwrap());
        assert!(!index.is_ready(&domain).unwrap());
    }

    #[test]
    fn test_release_exhausted_clears_both_sets() {
        let mut index = seeded_index();

        let domain = index.claim_eligible_domain(5_000).unwrap().unwrap();
        index.release_exhausted(&domain).unwrap();

        assert!(!index.is_active(&domain).unwrap());
        assert!(!index.is_ready(&domain).unwrap());
    }

    #[test]
    fn test_excluded_domain_never_ready() {
        let mut index = SqliteIndex::open_in_memory().unwrap();

        index.set_excluded("blocked.example").unwrap();
        index
            .record_frontier_append("blocked.example", "/tmp/blocked.frontier", 50, 1_000)
            .unwrap();

        assert!(!index.is_ready("blocked.example").unwrap());
        assert_eq!(index.claim_eligible_domain(5_000).unwrap(), None);
    }

    #[test]
    fn test_exclusion_purges_existing_ready_entry() {
        let mut index = seeded_index();

        index.set_excluded("a.example").unwrap();
        assert!(!index.is_ready("a.example").unwrap());
    }

    #[test]
    fn test_append_while_active_defers_ready_insert() {
        let mut index = seeded_index();

        let domain = index.claim_eligible_domain(5_000).unwrap().unwrap();
        index
            .record_frontier_append(&domain, "/tmp/a.frontier", 40, 6_000)
            .unwrap();

        // Still only active; release puts it back
        assert!(!index.is_ready(&domain).unwrap());
        index.release_domain(&domain, 7_000).unwrap();
        assert!(index.is_ready(&domain).unwrap());
    }

    #[test]
    fn test_append_accumulates_size() {
        let mut index = SqliteIndex::open_in_memory().unwrap();

        index
            .record_frontier_append("a.example", "/tmp/a.frontier", 60, 1_000)
            .unwrap();
        index
            .record_frontier_append("a.example", "/tmp/other-path", 40, 2_000)
            .unwrap();

        let meta = index.get_domain("a.example").unwrap().unwrap();
        assert_eq!(meta.frontier_size, 100);
        // First-write path wins
        assert_eq!(
            meta.frontier_path.as_deref(),
            Some(std::path::Path::new("/tmp/a.frontier"))
        );
    }

    #[test]
    fn test_offset_only_moves_forward() {
        let mut index = seeded_index();

        index.set_frontier_offset("a.example", 60).unwrap();
        index.set_frontier_offset("a.example", 30).unwrap();

        let meta = index.get_domain("a.example").unwrap().unwrap();
        assert_eq!(meta.frontier_offset, 60);
    }

    #[test]
    fn test_offset_never_exceeds_size_after_normal_flow() {
        let mut index = seeded_index();

        index.set_frontier_offset("a.example", 100).unwrap();
        let meta = index.get_domain("a.example").unwrap().unwrap();
        assert!(meta.frontier_offset <= meta.frontier_size);
        assert!(meta.is_exhausted());
    }

    #[test]
    fn test_visited_round_trip() {
        let mut index = SqliteIndex::open_in_memory().unwrap();

        let record = VisitedRecord {
            url: "http://example.com/page".to_string(),
            status_code: Some(200),
            fetched_at: 1_700_000_000_000,
            content_path: Some("content/ab/abcdef.txt".to_string()),
            error: None,
        };
        index.mark_visited(&record).unwrap();

        let loaded = index.get_visited("http://example.com/page").unwrap().unwrap();
        assert_eq!(loaded.url, record.url);
        assert_eq!(loaded.status_code, Some(200));
        assert_eq!(loaded.content_path, record.content_path);

        assert_eq!(index.visited_count().unwrap(), 1);
    }

    #[test]
    fn test_get_domain_missing() {
        let index = SqliteIndex::open_in_memory().unwrap();
        assert!(index.get_domain("nope.example").unwrap().is_none());
    }

    #[test]
    fn test_set_robots_round_trip() {
        let mut index = SqliteIndex::open_in_memory().unwrap();

        index
            .set_robots(
                "a.example",
                Some("User-agent: *\nDisallow: /private"),
                1_000_000,
                70_000,
            )
            .unwrap();

        let meta = index.get_domain("a.example").unwrap().unwrap();
        assert_eq!(
            meta.robots_rules.as_deref(),
            Some("User-agent: *\nDisallow: /private")
        );
        assert_eq!(meta.robots_expires, Some(1_000_000));
        assert_eq!(meta.crawl_delay_ms, Some(70_000));
    }
}
