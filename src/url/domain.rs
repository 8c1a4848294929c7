use url::Url;

/// Extracts the registrable domain from a URL
///
/// The registrable domain is the public-suffix-aware effective domain: for
/// `https://a.b.foo.co.uk/x` it is `foo.co.uk`, not `a.b.foo.co.uk`. This is
/// the unit all politeness accounting is keyed on, so two subdomains of one
/// site share a single crawl-delay budget.
///
/// Hosts with no registrable domain (IP addresses, `localhost`, single-label
/// hosts) fall back to the lowercased host itself. A non-default port is part
/// of the key: `host:8080` is a different server, and robots.txt must be
/// fetched from it, not from port 80.
///
/// # Arguments
///
/// * `url` - The URL to extract the domain from
///
/// # Returns
///
/// * `Some(String)` - The lowercase registrable domain (or host fallback)
/// * `None` - If the URL has no host
pub fn registrable_domain(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    let base = psl::domain_str(host).unwrap_or(host).to_lowercase();

    match url.port() {
        Some(port) => Some(format!("{}:{}", base, port)),
        None => Some(base),
    }
}
