//! HTML parser for extracting links and metadata
//!
//! This module handles parsing fetched HTML content to extract:
//! - Page links to follow (from `<a>` tags)
//! - Image sources and linked stylesheets
//! - Page title
//!
//! Every extracted reference is returned in canonical form.

use crate::url::normalize_url;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// The page title (from `<title>` tag)
    pub title: Option<String>,

    /// Page links found on the page, canonical and in document order
    pub links: Vec<Url>,

    /// `<img src>` references
    pub images: Vec<Url>,

    /// `<link rel="stylesheet" href>` references
    pub stylesheets: Vec<Url>,
}

/// Parses HTML content and extracts links and metadata
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document
/// - `<img src="...">` as image references
/// - `<link rel="stylesheet" href="...">` as stylesheet references
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs and fragment-only references
///
/// Relative references resolve against `<base href>` when the page declares
/// one, otherwise against `page_url`.
///
/// # Example
///
/// ```
/// use site_ferry::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page/">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links[0].as_str(), "https://example.com/page");
/// ```
pub fn parse_html(html: &str, page_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);
    let base_url = extract_base(&document, page_url);

    ParsedPage {
        title: extract_title(&document),
        links: collect(&document, "a[href]", "href", &base_url, |el| {
            el.attr("download").is_none()
        }),
        images: collect(&document, "img[src]", "src", &base_url, |_| true),
        stylesheets: collect(&document, "link[href]", "href", &base_url, |el| {
            el.attr("rel").map_or(false, |rel| {
                rel.split_ascii_whitespace()
                    .any(|token| token.eq_ignore_ascii_case("stylesheet"))
            })
        }),
    }
}

/// Extracts the page title from the HTML document
pub(crate) fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_base(document: &Html, page_url: &Url) -> Url {
    let Ok(selector) = Selector::parse("base[href]") else {
        return page_url.clone();
    };

    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .unwrap_or_else(|| page_url.clone())
}

fn collect(
    document: &Html,
    selector: &str,
    attr: &str,
    base_url: &Url,
    keep: impl Fn(&scraper::node::Element) -> bool,
) -> Vec<Url> {
    let Ok(selector) = Selector::parse(selector) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    document
        .select(&selector)
        .filter(|element| keep(element.value()))
        .filter_map(|element| element.value().attr(attr))
        .filter_map(|href| resolve_link(href, base_url))
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// Resolves a reference to a canonical absolute URL
///
/// Returns None if the reference should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only anchors
/// - anything that fails normalization
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    normalize_url(href, Some(base_url)).ok()
}
