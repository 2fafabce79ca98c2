use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Site-Ferry
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub converter: ConverterConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerConfig {
    /// Number of concurrent workers per crawl
    pub workers: u32,

    /// Largest max depth a caller may request
    pub max_depth_limit: u32,

    /// Minimum time between requests to the same origin (milliseconds)
    pub min_request_interval: u64,

    /// Per-request timeout (seconds)
    pub request_timeout_secs: u64,

    /// Total attempts per URL, including the first one
    pub max_attempts: u32,

    /// First retry delay (milliseconds), doubled on every further retry
    pub backoff_base_ms: u64,

    /// Upper bound on a single retry delay (milliseconds)
    pub backoff_max_ms: u64,

    /// Wall-clock budget for a whole crawl (seconds); unset means unbounded
    pub crawl_timeout_secs: Option<u64>,
}

impl CrawlerConfig {
    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn crawl_timeout(&self) -> Option<Duration> {
        self.crawl_timeout_secs.map(Duration::from_secs)
    }

    /// Delay before retry number `retry` (1-based): base * 2^(retry-1), capped
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let factor = 1u64 << retry.saturating_sub(1).min(20);
        let delay = self.backoff_base_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.backoff_max_ms))
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            max_depth_limit: 10,
            min_request_interval: 250,
            request_timeout_secs: 30,
            max_attempts: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 8_000,
            crawl_timeout_secs: None,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler, also used as the robots.txt product token
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Full User-Agent header: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "SiteFerry".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.com/site-ferry".to_string(),
            contact_email: "crawler@example.com".to_string(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "./site-ferry.db".to_string(),
        }
    }
}

/// Converter target configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ConverterConfig {
    /// Target framework recorded on converted sites
    pub framework: String,

    /// React version recorded when the framework is React
    pub react_version: Option<String>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            framework: "react".to_string(),
            react_version: Some("18.2.0".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = CrawlerConfig::default();
        assert_eq!(config.backoff_delay(1), Duration::from_millis(500));
        assert_eq!(config.backoff_delay(2), Duration::from_millis(1000));
        assert_eq!(config.backoff_delay(3), Duration::from_millis(2000));
        assert_eq!(config.backoff_delay(10), Duration::from_millis(8000));
    }

    #[test]
    fn test_user_agent_header() {
        let ua = UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/bot".to_string(),
            contact_email: "bot@example.com".to_string(),
        };
        assert_eq!(
            ua.header_value(),
            "TestBot/1.0 (+https://example.com/bot; bot@example.com)"
        );
    }
}
