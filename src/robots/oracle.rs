//! Politeness oracle
//!
//! Answers "may this URL be fetched?" and "what delay applies to this
//! domain?" quickly, fetching and caching robots.txt on demand. The oracle
//! never raises to the scheduler: every failure path degrades to a cached
//! allow/deny decision.

use crate::index::{now_ms, SharedIndex};
use crate::robots::ParsedRobots;
use crate::url::registrable_domain;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

/// Outcome of a politeness check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The URL may be fetched
    Allowed,

    /// The URL's domain is on the manual exclusion list
    DeniedExcluded,

    /// robots.txt disallows this path for our user agent
    DeniedRobots,
}

/// Tunables for robots.txt acquisition and politeness delays
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// User-agent token matched against robots.txt groups
    pub user_agent: String,

    /// Floor on the per-domain delay between fetches
    pub min_delay: Duration,

    /// How long fetched rules stay fresh
    pub success_ttl: Duration,

    /// How long an assumed allow-all after a failed fetch stays fresh
    pub failure_ttl: Duration,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            user_agent: "driftnet".to_string(),
            min_delay: Duration::from_secs(70),
            success_ttl: Duration::from_secs(24 * 60 * 60),
            failure_ttl: Duration::from_secs(60 * 60),
        }
    }
}

/// Caching robots.txt oracle shared by all workers
pub struct RobotsOracle {
    index: SharedIndex,
    client: reqwest::Client,
    config: OracleConfig,

    /// Per-domain locks so only one robots fetch per refresh window is in
    /// flight; concurrent callers block on the lock and then hit the cache.
    fetch_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl RobotsOracle {
    pub fn new(index: SharedIndex, client: reqwest::Client, config: OracleConfig) -> Self {
        Self {
            index,
            client,
            config,
            fetch_locks: DashMap::new(),
        }
    }

    /// Decides whether a URL may be fetched
    ///
    /// Exclusion takes precedence over robots.txt. Cached rules are used
    /// when fresh; otherwise robots.txt is fetched (once per domain across
    /// all concurrent callers) and cached in the index.
    pub async fn check(&self, url: &Url) -> Decision {
        let Some(domain) = registrable_domain(url) else {
            return Decision::DeniedRobots;
        };

        match self.index.get_domain(&domain).await {
            Ok(Some(meta)) => {
                if meta.is_excluded {
                    return Decision::DeniedExcluded;
                }
                if meta.robots_fresh(now_ms()) {
                    let rules = meta.robots_rules.unwrap_or_default();
                    return self.decide(&rules, url);
                }
            }
            Ok(None) => {}
            Err(e) => {
                // The index is the scheduler's next stop anyway; don't veto
                // the URL over a read that will fail loudly there.
                tracing::warn!("Index read failed during politeness check: {}", e);
                return Decision::Allowed;
            }
        }

        let rules = self.ensure_rules(&domain).await;
        self.decide(&rules, url)
    }

    /// Convenience wrapper over [`RobotsOracle::check`]
    pub async fn is_allowed(&self, url: &Url) -> bool {
        self.check(url).await == Decision::Allowed
    }

    /// The effective delay for a domain: max of its declared Crawl-delay
    /// and the configured floor, as cached at rules-fetch time
    pub async fn effective_delay(&self, domain: &str) -> Duration {
        match self.index.get_domain(domain).await {
            Ok(Some(meta)) => meta
                .crawl_delay_ms
                .map(|ms| Duration::from_millis(ms.max(0) as u64))
                .unwrap_or(self.config.min_delay),
            _ => self.config.min_delay,
        }
    }

    /// Fetches, caches, and returns the rules text for a domain
    ///
    /// Holds the domain's fetch lock for the duration; callers that lose the
    /// race re-read the cache instead of fetching again.
    async fn ensure_rules(&self, domain: &str) -> String {
        let lock = self
            .fetch_locks
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Another caller may have refreshed while we waited
        if let Ok(Some(meta)) = self.index.get_domain(domain).await {
            if meta.robots_fresh(now_ms()) {
                return meta.robots_rules.unwrap_or_default();
            }
        }

        let (rules, ttl) = self.fetch_rules(domain).await;
        let delay_ms = self.effective_delay_ms(rules.as_deref());
        let expires = now_ms() + ttl.as_millis() as i64;

        if let Err(e) = self
            .index
            .set_robots(domain, rules.as_deref(), expires, delay_ms)
            .await
        {
            tracing::warn!("Failed to cache robots rules for {}: {}", domain, e);
        }

        rules.unwrap_or_default()
    }

    /// Fetches robots.txt: http first, https on 5xx/network failure
    ///
    /// Returns the body (None = assume allow-all) and how long to cache it.
    async fn fetch_rules(&self, domain: &str) -> (Option<String>, Duration) {
        for scheme in ["http", "https"] {
            let robots_url = format!("{}://{}/robots.txt", scheme, domain);

            match self.client.get(&robots_url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        match response.text().await {
                            Ok(body) => {
                                tracing::debug!("Fetched robots.txt for {} ({})", domain, status);
                                return (Some(body), self.config.success_ttl);
                            }
                            Err(e) => {
                                tracing::debug!(
                                    "Failed to read robots.txt body from {}: {}",
                                    robots_url,
                                    e
                                );
                            }
                        }
                    } else if status.is_client_error() {
                        // No robots.txt at all: everything is allowed
                        tracing::debug!("robots.txt for {} returned {}", domain, status);
                        return (None, self.config.success_ttl);
                    } else {
                        tracing::debug!("robots.txt for {} returned {}", domain, status);
                    }
                }
                Err(e) => {
                    tracing::debug!("robots.txt fetch from {} failed: {}", robots_url, e);
                }
            }
        }

        tracing::debug!(
            "Assuming allow-all robots for {} (short expiry) after failed fetches",
            domain
        );
        (None, self.config.failure_ttl)
    }

    fn decide(&self, rules: &str, url: &Url) -> Decision {
        let parsed = if rules.is_empty() {
            ParsedRobots::allow_all()
        } else {
            ParsedRobots::from_content(rules)
        };

        if parsed.is_allowed(url.as_str(), &self.config.user_agent) {
            Decision::Allowed
        } else {
            Decision::DeniedRobots
        }
    }

    fn effective_delay_ms(&self, rules: Option<&str>) -> i64 {
        let robots_delay = rules
            .map(ParsedRobots::from_content)
            .and_then(|parsed| parsed.crawl_delay(&self.config.user_agent))
            .map(Duration::from_secs_f64)
            .unwrap_or(Duration::ZERO);

        robots_delay.max(self.config.min_delay).as_millis() as i64
    }
}
