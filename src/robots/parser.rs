//! Robots.txt parsing
//!
//! Allow/disallow matching is delegated to the robotstxt crate. Crawl-delay
//! extraction is done by hand: the crate does not expose the directive, and
//! a specific user-agent group must take precedence over the `*` group.

use robotstxt::DefaultMatcher;

/// Parsed robots.txt data
///
/// A thin wrapper over the raw robots.txt body. Matching is performed
/// on demand; an empty body or the explicit allow-all sentinel permits
/// everything.
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    /// Raw robots.txt content (empty string means allow all)
    content: String,
    /// Whether to allow all without consulting the content
    allow_all: bool,
}

impl ParsedRobots {
    /// Creates a ParsedRobots from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            allow_all: false,
        }
    }

    /// Creates a permissive ParsedRobots that allows everything
    ///
    /// Used when robots.txt could not be fetched (or returned 4xx).
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: true,
        }
    }

    /// Checks if a URL is allowed for the given user agent
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.allow_all || self.content.is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// Extracts the Crawl-delay (in seconds) that applies to a user agent
    ///
    /// A group naming the agent specifically beats the `*` group; among
    /// specific matches the longest agent token wins. Returns None when no
    /// applicable group declares a delay.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        if self.allow_all || self.content.is_empty() {
            return None;
        }

        let ua = user_agent.to_lowercase();
        // (matched agent-token length, delay); the wildcard matches at length 0
        let mut best: Option<(usize, f64)> = None;
        let mut group_agents: Vec<String> = Vec::new();
        let mut last_line_was_agent = false;

        for line in self.content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    // A run of user-agent lines starts a new group
                    if !last_line_was_agent {
                        group_agents.clear();
                    }
                    group_agents.push(value.to_lowercase());
                    last_line_was_agent = true;
                }
                "crawl-delay" => {
                    last_line_was_agent = false;
                    let Ok(delay) = value.parse::<f64>() else {
                        continue;
                    };
                    for agent in &group_agents {
                        let match_len = if agent == "*" {
                            Some(0)
                        } else if ua.contains(agent.as_str()) {
                            Some(agent.len())
                        } else {
                            None
                        };
                        if let Some(len) = match_len {
                            match best {
                                Some((best_len, _)) if best_len >= len => {}
                                _ => best = Some((len, delay)),
                            }
                        }
                    }
                }
                _ => {
                    last_line_was_agent = false;
                }
            }
        }

        best.map(|(_, delay)| delay)
    }
}
