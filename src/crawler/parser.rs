//! HTML parser for extracting links
//!
//! Links come out as [`LinkCandidate`]s carrying their anchor text, since the
//! logout check looks at what a link says as well as where it points.

use crate::auth::LinkCandidate;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// All followable links found on the page
    pub links: Vec<LinkCandidate>,
}

/// Parses HTML content and extracts links and the title
///
/// # Link Extraction Rules
///
/// **Include:** `<a href="...">` anywhere in the document.
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links and data URIs
/// - Fragment-only links
/// - Anything that does not resolve to HTTP(S)
///
/// # Example
///
/// ```
/// use autologin_crawl::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Home</title></head><body><a href="/hidden">Hidden page</a></body></html>"#;
/// let base_url = Url::parse("http://127.0.0.1:8000/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Home".to_string()));
/// assert_eq!(parsed.links[0].target_url.as_str(), "http://127.0.0.1:8000/hidden");
/// assert_eq!(parsed.links[0].link_text, "Hidden page");
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        links: extract_links(&document, base_url),
    }
}

fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_links(document: &Html, base_url: &Url) -> Vec<LinkCandidate> {
    let Ok(a_selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&a_selector)
        .filter(|element| element.value().attr("download").is_none())
        .filter_map(|element| {
            let href = element.value().attr("href")?;
            let target = resolve_link(href, base_url)?;
            Some(LinkCandidate::new(target, anchor_text(&element)).with_origin(base_url.clone()))
        })
        .collect()
}

/// Visible text of an anchor with whitespace collapsed
fn anchor_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolves a link href to an absolute URL
///
/// Returns None if the link should be excluded.
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
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

    base_url
        .join(href)
        .ok()
        .filter(|url| url.scheme() == "http" || url.scheme() == "https")
}
