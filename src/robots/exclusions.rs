//! Manual domain exclusion list
//!
//! A newline-delimited file of domains that must never be fetched,
//! independent of robots.txt. Loaded once at startup and flagged into the
//! shared index, which also purges any ready-queue entries.

use crate::index::{IndexResult, SharedIndex};
use crate::ConfigError;
use std::path::Path;

/// Parses exclusion-file content into domain strings
///
/// Blank lines and lines starting with `#` are ignored; domains are
/// lowercased.
pub fn parse_exclusions(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_lowercase)
        .collect()
}

/// Loads an exclusion file from disk
pub fn load_exclusions(path: &Path) -> Result<Vec<String>, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_exclusions(&content))
}

/// Marks every listed domain as excluded in the index
pub async fn apply_exclusions(index: &SharedIndex, domains: &[String]) -> IndexResult<()> {
    for domain in domains {
        index.set_excluded(domain).await?;
        tracing::debug!("Excluded domain: {}", domain);
    }
    if !domains.is_empty() {
        tracing::info!("Applied {} manual exclusions", domains.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_blanks_and_comments() {
        let content = "blocked.example\n\n# a comment\nother.example\n   \n";
        assert_eq!(
            parse_exclusions(content),
            vec!["blocked.example", "other.example"]
        );
    }

    #[test]
    fn test_parse_lowercases() {
        assert_eq!(parse_exclusions("Blocked.EXAMPLE"), vec!["blocked.example"]);
    }

    #[test]
    fn test_parse_trims_whitespace() {
        assert_eq!(parse_exclusions("  blocked.example  "), vec!["blocked.example"]);
    }

    #[tokio::test]
    async fn test_apply_marks_excluded() {
        let index = SharedIndex::in_memory(100, 0.01).unwrap();

        apply_exclusions(&index, &["blocked.example".to_string()])
            .await
            .unwrap();

        let meta = index.get_domain("blocked.example").await.unwrap().unwrap();
        assert!(meta.is_excluded);
        assert_eq!(index.excluded_count().await.unwrap(), 1);
    }
}
