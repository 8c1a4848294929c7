//! Frontier file record format
//!
//! One record per line, UTF-8: `{url}|{depth}|{priority}|{added_timestamp}`.
//! No escaping of `|` is attempted; normalized URLs never contain an
//! unencoded pipe. Records are immutable once written; consumption advances
//! the domain's read offset past them.

use thiserror::Error;
use url::Url;

/// Lines longer than this are considered corrupt and skipped
pub const MAX_RECORD_BYTES: usize = 8192;

/// Errors produced while parsing a frontier record line
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Malformed frontier record: {0}")]
    Malformed(String),

    #[error("Frontier record exceeds {MAX_RECORD_BYTES} bytes")]
    OverLength,
}

/// A single pending-URL record in a domain's frontier file
#[derive(Debug, Clone, PartialEq)]
pub struct FrontierRecord {
    /// The normalized URL to fetch
    pub url: Url,

    /// Link depth from the seed that discovered it (seeds are depth 0)
    pub depth: u32,

    /// Fetch priority (currently always the default 1.0)
    pub priority: f32,

    /// Unix seconds when the record was enqueued
    pub added_at: i64,
}

impl FrontierRecord {
    pub fn new(url: Url, depth: u32, priority: f32, added_at: i64) -> Self {
        Self {
            url,
            depth,
            priority,
            added_at,
        }
    }

    /// Serializes the record as a single newline-terminated line
    pub fn to_line(&self) -> String {
        format!(
            "{}|{}|{}|{}\n",
            self.url, self.depth, self.priority, self.added_at
        )
    }

    /// Parses one line (with or without its trailing newline)
    pub fn parse_line(line: &str) -> Result<Self, RecordError> {
        if line.len() > MAX_RECORD_BYTES {
            return Err(RecordError::OverLength);
        }

        let line = line.trim_end_matches('\n');
        let parts: Vec<&str> = line.split('|').collect();
        if parts.len() != 4 {
            return Err(RecordError::Malformed(format!(
                "expected 4 fields, got {}",
                parts.len()
            )));
        }

        let url = Url::parse(parts[0])
            .map_err(|e| RecordError::Malformed(format!("bad url: {}", e)))?;
        let depth = parts[1]
            .parse::<u32>()
            .map_err(|e| RecordError::Malformed(format!("bad depth: {}", e)))?;
        let priority = parts[2]
            .parse::<f32>()
            .map_err(|e| RecordError::Malformed(format!("bad priority: {}", e)))?;
        let added_at = parts[3]
            .parse::<i64>()
            .map_err(|e| RecordError::Malformed(format!("bad timestamp: {}", e)))?;

        Ok(Self {
            url,
            depth,
            priority,
            added_at,
        })
    }
}
