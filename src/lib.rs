//! Driftnet: a polite, resumable web crawler
//!
//! This crate implements a single-machine web crawler built around a hybrid
//! file+index frontier: per-domain append-only URL files on disk, a shared
//! SQLite index holding domain metadata and the ready/active queues, a
//! bloom-filter seen set for at-most-once enqueue, and a robots.txt oracle
//! enforcing per-domain crawl delays. Hundreds of concurrent workers claim
//! domains atomically so no two workers ever fetch from the same domain at
//! the same time.

pub mod config;
pub mod content;
pub mod crawler;
pub mod frontier;
pub mod index;
pub mod output;
pub mod robots;
pub mod url;

use thiserror::Error;

/// Main error type for driftnet operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Index error: {0}")]
    Index(#[from] index::IndexError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("HTTP error for {url}: {source}")]
    Http {
        url: String,
        source: reqwest::Error,
    },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Data directory not writable: {0}")]
    DataDirUnwritable(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Seed file unreadable: {0}")]
    SeedFile(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("URL exceeds maximum length ({0} bytes)")]
    TooLong(usize),
}

/// Result type alias for driftnet operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::CrawlConfig;
pub use index::SharedIndex;
pub use url::{normalize_url, registrable_domain};
