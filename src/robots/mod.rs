//! Robots.txt handling module
//!
//! Fetching, parsing, and caching of robots.txt files, plus the manual
//! exclusion list. The [`RobotsOracle`] is the politeness authority the
//! scheduler consults before returning any URL to a worker.

mod exclusions;
mod oracle;
mod parser;

pub use exclusions::{apply_exclusions, load_exclusions, parse_exclusions};
pub use oracle::{Decision, OracleConfig, RobotsOracle};
pub use parser::ParsedRobots;
