//! URL handling module for Site-Ferry
//!
//! This module provides URL normalization, origin helpers, the crawl-unique
//! path keys used for pages and assets, and the crawl policy checks.

mod domain;
mod normalize;
pub mod policy;

use url::Url;

// Re-export main functions
pub use domain::{origin_key, same_origin};
pub use normalize::normalize_url;
pub use policy::is_allowed;

/// Prefix under which assets from other origins are keyed
pub const EXTERNAL_ASSET_PREFIX: &str = "/_ext/";

/// Crawl-unique key for a page: its path plus query, if any
///
/// ```
/// use site_ferry::url::{normalize_url, page_path};
///
/// let url = normalize_url("https://example.com/docs/?b=2&a=1", None).unwrap();
/// assert_eq!(page_path(&url), "/docs?a=1&b=2");
/// ```
pub fn page_path(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

/// Crawl-unique key for an asset
///
/// Same-origin assets use their page-style path; assets from another origin
/// are namespaced by host (and port) so keys never collide.
pub fn asset_path(url: &Url, seed: &Url) -> String {
    if same_origin(url, seed) {
        return page_path(url);
    }

    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => "unknown".to_string(),
    };
    format!("{}{}{}", EXTERNAL_ASSET_PREFIX, host, page_path(url))
}
