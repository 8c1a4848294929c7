use crate::config::types::Tuning;
use crate::ConfigError;
use std::path::Path;

/// Loads the optional TOML tuning overlay
///
/// Missing keys fall back to their defaults, so a partial file is fine.
pub fn load_tuning(path: &Path) -> Result<Tuning, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let tuning: Tuning = toml::from_str(&content)?;
    Ok(tuning)
}

/// Reads the seed file into lines
///
/// Blank lines and `#` comments survive here; the frontier writer filters
/// them during ingest.
pub fn read_seed_lines(path: &Path) -> Result<Vec<String>, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::SeedFile(format!("{}: {}", path.display(), e)))?;
    Ok(content.lines().map(str::to_string).collect())
}
