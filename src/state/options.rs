use serde::{Deserialize, Serialize};

/// Per-crawl switches, fixed once the crawl starts
///
/// Stored as a JSON document on the crawl row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlOptions {
    /// Fetch and store `<img>` sources
    pub download_images: bool,
    /// Fetch linked stylesheets and keep inline styles when converting
    pub preserve_css: bool,
    /// Extract shared navigation when converting
    pub preserve_nav: bool,
    /// Consult robots.txt before fetching pages
    pub respect_robots: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            download_images: false,
            preserve_css: true,
            preserve_nav: true,
            respect_robots: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_shape() {
        let options = CrawlOptions {
            download_images: true,
            preserve_css: false,
            preserve_nav: true,
            respect_robots: false,
        };
        let json = serde_json::to_value(options).unwrap();
        assert_eq!(json["downloadImages"], true);
        assert_eq!(json["preserveCss"], false);
        assert_eq!(json["preserveNav"], true);
        assert_eq!(json["respectRobots"], false);

        let parsed: CrawlOptions = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, options);
    }
}
