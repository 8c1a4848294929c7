//! Configuration module
//!
//! The immutable [`CrawlConfig`] assembled from CLI arguments, the optional
//! TOML tuning overlay, and the seed-file reader.

mod parser;
mod types;
mod validation;

pub use parser::{load_tuning, read_seed_lines};
pub use types::{CrawlConfig, Tuning};
pub use validation::validate;
