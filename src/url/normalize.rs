use crate::UrlError;
use url::Url;

/// URLs longer than this are rejected at ingest. Keeps every frontier file
/// line comfortably under the 8 KiB corruption threshold.
pub const MAX_URL_LEN_BYTES: usize = 4096;

/// Normalizes a URL string into its canonical form
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed or over-length
/// 2. Require an http or https scheme (lowercased by the parser)
/// 3. Require a host (lowercased by the parser)
/// 4. Remove default ports (80 for http, 443 for https)
/// 5. Drop the fragment
/// 6. Percent-decode unreserved characters in the path
///
/// An empty path serializes as `/`, so `http://a.example` and
/// `http://a.example/` normalize to the same string. Normalization is
/// idempotent: applying it twice yields the same URL.
///
/// # Arguments
///
/// * `url_str` - The URL string to normalize
///
/// # Returns
///
/// * `Ok(Url)` - Normalized URL
/// * `Err(UrlError)` - Failed to parse or normalize the URL
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let url_str = url_str.trim();

    if url_str.len() > MAX_URL_LEN_BYTES {
        return Err(UrlError::TooLong(url_str.len()));
    }

    let mut url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingDomain);
    }

    // The url crate already lowercases scheme and host, strips default
    // ports, and removes dot segments during parsing.

    url.set_fragment(None);

    let decoded = decode_unreserved(url.path());
    if decoded != url.path() {
        url.set_path(&decoded);
    }

    Ok(url)
}

/// Decodes percent-encoded unreserved characters (ALPHA / DIGIT / - . _ ~)
///
/// Other percent-encodings are left untouched: decoding them could change
/// the URL's meaning or reintroduce delimiters.
fn decode_unreserved(path: &str) -> String {
    let bytes = path.as_bytes();
    let mut out = String::with_capacity(path.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hi = (bytes[i + 1] as char).to_digit(16);
            let lo = (bytes[i + 2] as char).to_digit(16);
            if let (Some(hi), Some(lo)) = (hi, lo) {
                let byte = (hi * 16 + lo) as u8;
                if is_unreserved(byte) {
                    out.push(byte as char);
                    i += 3;
                    continue;
                }
            }
        }
        out.push(bytes[i] as char);
        i += 1;
    }

    out
}

fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase_scheme_and_host() {
        let result = normalize_url("HTTP://EXAMPLE.COM/Page").unwrap();
        assert_eq!(result.as_str(), "http://example.com/Page");
    }

    #[test]
    fn test_remove_default_port_http() {
        let result = normalize_url("http://example.com:80/page").unwrap();
        assert_eq!(result.as_str(), "http://example.com/page");
    }

    #[test]
    fn test_remove_default_port_https() {
        let result = normalize_url("https://example.com:443/page").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_keep_nondefault_port() {
        let result = normalize_url("http://example.com:8080/page").unwrap();
        assert_eq!(result.as_str(), "http://example.com:8080/page");
    }

    #[test]
    fn test_bare_authority_gets_root_path() {
        let with_slash = normalize_url("http://example.com/").unwrap();
        let without_slash = normalize_url("http://example.com").unwrap();
        assert_eq!(with_slash.as_str(), without_slash.as_str());
        assert_eq!(with_slash.as_str(), "http://example.com/");
    }

    #[test]
    fn test_remove_fragment() {
        let result = normalize_url("https://example.com/page#section").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_decode_unreserved_percent_encoding() {
        let result = normalize_url("https://example.com/%61%62%63").unwrap();
        assert_eq!(result.as_str(), "https://example.com/abc");
    }

    #[test]
    fn test_keep_reserved_percent_encoding() {
        // %2F is an encoded slash; decoding it would change path structure
        let result = normalize_url("https://example.com/a%2Fb").unwrap();
        assert_eq!(result.as_str(), "https://example.com/a%2Fb");
    }

    #[test]
    fn test_decode_unreserved_tilde() {
        let result = normalize_url("https://example.com/%7Euser").unwrap();
        assert_eq!(result.as_str(), "https://example.com/~user");
    }

    #[test]
    fn test_query_preserved() {
        let result = normalize_url("https://example.com/page?b=2&a=1").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page?b=2&a=1");
    }

    #[test]
    fn test_idempotent() {
        let once = normalize_url("HTTP://Example.COM:80/%7Ea/b%2Fc#frag").unwrap();
        let twice = normalize_url(once.as_str()).unwrap();
        assert_eq!(once.as_str(), twice.as_str());
    }

    #[test]
    fn test_invalid_scheme() {
        let result = normalize_url("ftp://example.com/page");
        assert!(matches!(result.unwrap_err(), UrlError::InvalidScheme(_)));
    }

    #[test]
    fn test_malformed_url() {
        let result = normalize_url("not a url");
        assert!(result.is_err());
    }

    #[test]
    fn test_over_length_url_rejected() {
        let long = format!("http://example.com/{}", "a".repeat(MAX_URL_LEN_BYTES));
        let result = normalize_url(&long);
        assert!(matches!(result.unwrap_err(), UrlError::TooLong(_)));
    }

    #[test]
    fn test_whitespace_trimmed() {
        let result = normalize_url("  https://example.com/page \n").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page");
    }
}
