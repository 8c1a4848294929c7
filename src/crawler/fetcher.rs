//! Page fetcher
//!
//! GET requests with bounded exponential-backoff retries. Redirects are
//! delegated to reqwest's default policy (10 hops). Outcomes are classified
//! rather than raised: the worker records a visited row either way.

use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchOutcome {
    /// Successfully fetched the page body
    Success {
        /// Final URL after redirects
        final_url: String,
        /// HTTP status code
        status_code: u16,
        /// Content-Type header value ("" when absent)
        content_type: String,
        /// Response body
        body: String,
    },

    /// Terminal HTTP failure (4xx, or 5xx after retries)
    HttpFailure {
        /// The HTTP status code
        status_code: u16,
    },

    /// Network failure (DNS, connect, timeout) after retries
    NetworkFailure {
        /// Error description
        error: String,
    },
}

/// Retry policy for page fetches
#[derive(Debug, Clone)]
pub struct FetchRetryPolicy {
    /// Maximum number of retries
    pub max_retries: u32,
    /// Base delay between retries (exponential backoff)
    pub base_delay: Duration,
}

impl Default for FetchRetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(5),
        }
    }
}

impl FetchRetryPolicy {
    /// Delay for a retry attempt: base_delay * 2^attempt
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }

    /// Whether an error class is worth retrying
    fn is_retryable(status: Option<StatusCode>, is_timeout: bool, is_connect: bool) -> bool {
        if is_timeout || is_connect {
            return true;
        }
        match status {
            Some(status) => status.is_server_error(),
            None => false,
        }
    }
}

/// Builds the HTTP client all fetches share
///
/// The user agent carries the crawler name, version, and contact address so
/// site operators can reach us.
pub fn build_http_client(user_agent: &str, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL, retrying transient failures per the policy
pub async fn fetch_url(client: &Client, url: &str, policy: &FetchRetryPolicy) -> FetchOutcome {
    let mut attempt = 0;

    loop {
        let outcome = fetch_url_once(client, url).await;

        let retryable = match &outcome {
            FetchOutcome::HttpFailure { status_code } => {
                FetchRetryPolicy::is_retryable(StatusCode::from_u16(*status_code).ok(), false, false)
            }
            FetchOutcome::NetworkFailure { .. } => true,
            FetchOutcome::Success { .. } => false,
        };

        if !retryable || attempt >= policy.max_retries {
            return outcome;
        }

        let delay = policy.delay_for_attempt(attempt);
        tracing::debug!("Retry {} for {} in {:?}", attempt + 1, url, delay);
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

async fn fetch_url_once(client: &Client, url: &str) -> FetchOutcome {
    match client.get(url).send().await {
        Ok(response) => {
            let status = response.status();
            let final_url = response.url().to_string();

            if !status.is_success() {
                return FetchOutcome::HttpFailure {
                    status_code: status.as_u16(),
                };
            }

            let content_type = response
                .headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();

            match response.text().await {
                Ok(body) => FetchOutcome::Success {
                    final_url,
                    status_code: status.as_u16(),
                    content_type,
                    body,
                },
                Err(e) => FetchOutcome::NetworkFailure {
                    error: e.to_string(),
                },
            }
        }
        Err(e) => {
            if e.is_timeout() {
                FetchOutcome::NetworkFailure {
                    error: "Request timeout".to_string(),
                }
            } else if e.is_connect() {
                FetchOutcome::NetworkFailure {
                    error: "Connection failed".to_string(),
                }
            } else {
                FetchOutcome::NetworkFailure {
                    error: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_http_client() {
        let client = build_http_client("driftnet/1.0 (+mailto:ops@example.com)", Duration::from_secs(30));
        assert!(client.is_ok());
    }

    #[test]
    fn test_retry_policy_delays() {
        let policy = FetchRetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(5));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(10));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(20));
    }

    #[test]
    fn test_5xx_is_retryable() {
        assert!(FetchRetryPolicy::is_retryable(
            Some(StatusCode::INTERNAL_SERVER_ERROR),
            false,
            false
        ));
        assert!(FetchRetryPolicy::is_retryable(
            Some(StatusCode::SERVICE_UNAVAILABLE),
            false,
            false
        ));
    }

    #[test]
    fn test_4xx_is_not_retryable() {
        assert!(!FetchRetryPolicy::is_retryable(
            Some(StatusCode::NOT_FOUND),
            false,
            false
        ));
        assert!(!FetchRetryPolicy::is_retryable(
            Some(StatusCode::FORBIDDEN),
            false,
            false
        ));
    }

    #[test]
    fn test_timeout_and_connect_are_retryable() {
        assert!(FetchRetryPolicy::is_retryable(None, true, false));
        assert!(FetchRetryPolicy::is_retryable(None, false, true));
    }
}
