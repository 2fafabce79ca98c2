use url::Url;

/// Serializes the origin (scheme, host, port) of a URL
///
/// Used as the key for per-origin politeness state and robots.txt caching.
///
/// ```
/// use url::Url;
/// use site_ferry::url::origin_key;
///
/// let url = Url::parse("https://example.com:8443/a/b").unwrap();
/// assert_eq!(origin_key(&url), "https://example.com:8443");
/// ```
pub fn origin_key(url: &Url) -> String {
    url.origin().ascii_serialization()
}

/// Returns true when both URLs share scheme, host and port
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}
