//! HTML parsing for link and text extraction
//!
//! Pulls outgoing links from `<a href>` tags (absolute http(s) URLs only)
//! and a whitespace-normalized text rendering of the body for the content
//! writer.

use scraper::{Html, Selector};
use url::Url;

/// Extracted information from a fetched HTML page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// The page title, if present
    pub title: Option<String>,

    /// Absolute outgoing links found on the page
    pub links: Vec<String>,

    /// Whitespace-normalized page text
    pub text: String,
}

/// Parses HTML content into links and text
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        links: extract_links(&document, base_url),
        text: extract_text(&document),
    }
}

fn extract_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())
}

fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut links = Vec::new();

    if let Ok(selector) = Selector::parse("a[href]") {
        for element in document.select(&selector) {
            if element.value().attr("download").is_some() {
                continue;
            }
            if let Some(href) = element.value().attr("href") {
                if let Some(absolute) = resolve_link(href, base_url) {
                    links.push(absolute);
                }
            }
        }
    }

    links
}

fn extract_text(document: &Html) -> String {
    let Ok(selector) = Selector::parse("body") else {
        return String::new();
    };

    let raw: String = match document.select(&selector).next() {
        Some(body) => body.text().collect::<Vec<_>>().join(" "),
        None => return String::new(),
    };

    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolves an href to an absolute URL, filtering non-fetchable links
///
/// Returns None for javascript:/mailto:/tel:/data: schemes, fragment-only
/// anchors, unresolvable hrefs, and anything that is not http(s).
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute) if absolute.scheme() == "http" || absolute.scheme() == "https" => {
            Some(absolute.to_string())
        }
        _ => None,
    }
}
