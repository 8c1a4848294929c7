//! Index schema definitions
//!
//! All SQL schema for the shared index. The ready queue and active set are
//! plain tables so that claiming a domain can be a single transaction.

use rusqlite::Connection;

/// SQL schema for the shared index
pub const SCHEMA_SQL: &str = r#"
-- Per-domain metadata: frontier file bookkeeping, politeness state,
-- cached robots.txt rules, and the manual exclusion flag.
CREATE TABLE IF NOT EXISTS domains (
    domain TEXT PRIMARY KEY,
    frontier_path TEXT,
    frontier_offset INTEGER NOT NULL DEFAULT 0,
    frontier_size INTEGER NOT NULL DEFAULT 0,
    next_fetch_time INTEGER NOT NULL DEFAULT 0,
    robots_rules TEXT,
    robots_expires INTEGER,
    crawl_delay_ms INTEGER,
    is_excluded INTEGER NOT NULL DEFAULT 0
);

-- Domains eligible for claiming, scored by next-eligible time (unix ms).
CREATE TABLE IF NOT EXISTS ready_domains (
    domain TEXT PRIMARY KEY,
    next_fetch_time INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_ready_next ON ready_domains(next_fetch_time);

-- Domains currently claimed by a worker.
CREATE TABLE IF NOT EXISTS active_domains (
    domain TEXT PRIMARY KEY
);

-- Exact record of every URL actually fetched (or definitively failed),
-- keyed by a truncated hash of the normalized URL.
CREATE TABLE IF NOT EXISTS visited (
    url_hash TEXT PRIMARY KEY,
    url TEXT NOT NULL,
    status_code INTEGER,
    fetched_at INTEGER NOT NULL,
    content_path TEXT,
    error TEXT
);

CREATE INDEX IF NOT EXISTS idx_visited_time ON visited(fetched_at);
"#;

/// Initializes the index schema, creating all tables and indexes
///
/// Safe to call on an existing database: all statements are idempotent.
pub fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}
