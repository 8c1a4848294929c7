//! Retry policy for transient index failures
//!
//! SQLite reports lock contention as SQLITE_BUSY / SQLITE_LOCKED; both are
//! transient and worth retrying with exponential backoff. Anything else is
//! treated as permanent and escalates to the caller.

use std::time::Duration;

/// Exponential-backoff retry policy for index operations
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries before the error escalates
    pub max_retries: u32,

    /// Base delay between retries (doubled each attempt)
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    /// Calculates the delay for a given retry attempt
    ///
    /// Uses exponential backoff: delay = base_delay * 2^attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt);
        self.base_delay * multiplier
    }
}
