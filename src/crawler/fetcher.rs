//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for a crawl, including:
//! - Building HTTP clients with proper user agent strings
//! - Per-origin rate limiting
//! - Retry logic with exponential backoff for transient failures
//! - Redirect handling
//! - Error classification

use crate::config::{Config, CrawlerConfig};
use crate::state::{CrawlOptions, DomainState};
use crate::storage::AssetType;
use crate::url::origin_key;
use reqwest::{header, redirect::Policy, Client, StatusCode};
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;
use url::Url;

/// Redirect hops followed before a fetch gives up
const MAX_REDIRECTS: usize = 10;

/// Why a fetch produced no content
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("HTTP status {status}")]
    HttpStatus { status: u16 },

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected content type '{content_type}' for a page")]
    ContentMismatch { content_type: String },
}

impl FetchError {
    /// Timeouts, connection failures, 429 and 5xx are worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Network(_) => true,
            Self::HttpStatus { status } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
            }
            Self::ContentMismatch { .. } => false,
        }
    }

    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// What is being fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchKind {
    Page,
    Image,
    Stylesheet,
}

impl FetchKind {
    /// Whether the crawl options allow fetching this kind at all
    pub fn is_enabled(&self, options: &CrawlOptions) -> bool {
        match self {
            Self::Page => true,
            Self::Image => options.download_images,
            Self::Stylesheet => options.preserve_css,
        }
    }

    /// The stored asset type, for asset kinds
    pub fn asset_type(&self) -> Option<AssetType> {
        match self {
            Self::Page => None,
            Self::Image => Some(AssetType::Image),
            Self::Stylesheet => Some(AssetType::Stylesheet),
        }
    }
}

impl From<AssetType> for FetchKind {
    fn from(asset_type: AssetType) -> Self {
        match asset_type {
            AssetType::Image => Self::Image,
            AssetType::Stylesheet => Self::Stylesheet,
        }
    }
}

impl fmt::Display for FetchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Page => "page",
            Self::Image => "image",
            Self::Stylesheet => "stylesheet",
        })
    }
}

/// Content returned by a successful fetch
#[derive(Debug, Clone)]
pub struct Fetched {
    /// Final URL after redirects
    pub final_url: Url,

    /// HTTP status code
    pub status: u16,

    /// Content-Type header value
    pub content_type: String,

    /// Response body
    pub body: Vec<u8>,

    /// Attempts used, including the successful one
    pub attempts: u32,
}

impl Fetched {
    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The crawler configuration (user agent and timeouts)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use site_ferry::config::Config;
/// use site_ferry::crawler::build_http_client;
///
/// let client = build_http_client(&Config::default()).unwrap();
/// ```
pub fn build_http_client(config: &Config) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.header_value())
        .timeout(config.crawler.request_timeout())
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Polite fetcher shared by the workers of one crawl
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 2xx | Success (pages must be HTML) |
/// | HTTP 429 | Retry with backoff, origin slot pushed out |
/// | HTTP 5xx | Retry with backoff |
/// | Timeout / connection error | Retry with backoff |
/// | Other HTTP status | Immediate failure |
/// | Non-HTML page | Immediate failure |
pub struct Fetcher {
    client: Client,
    config: CrawlerConfig,
    domains: Mutex<HashMap<String, DomainState>>,
}

impl Fetcher {
    pub fn new(client: Client, config: CrawlerConfig) -> Self {
        Self {
            client,
            config,
            domains: Mutex::new(HashMap::new()),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Applies a robots.txt Crawl-delay to the origin of `url`
    pub fn set_crawl_delay(&self, url: &Url, delay: Option<Duration>) {
        self.with_domain(url, |state| state.crawl_delay = delay);
    }

    /// Requests reserved so far against the origin of `url`
    pub fn request_count(&self, url: &Url) -> u32 {
        self.with_domain(url, |state| state.request_count)
    }

    fn with_domain<T>(&self, url: &Url, f: impl FnOnce(&mut DomainState) -> T) -> T {
        let mut domains = self
            .domains
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(domains.entry(origin_key(url)).or_default())
    }

    /// Fetches `url`, retrying transient failures
    pub async fn fetch(&self, url: &Url, kind: FetchKind) -> Result<Fetched, FetchError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let wait = self.with_domain(url, |state| {
                state.reserve(self.config.min_request_interval(), Instant::now())
            });
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }

            match self.attempt(url, kind).await {
                Ok(mut fetched) => {
                    fetched.attempts = attempt;
                    return Ok(fetched);
                }
                Err(FetchErrorWithHint { error, retry_after })
                    if error.is_retryable() && attempt < max_attempts =>
                {
                    let delay = retry_after
                        .unwrap_or_else(|| self.config.backoff_delay(attempt))
                        .min(Duration::from_millis(self.config.backoff_max_ms));
                    if error == (FetchError::HttpStatus { status: 429 }) {
                        self.with_domain(url, |state| state.back_off(delay, Instant::now()));
                    }

                    tracing::debug!(
                        "Retrying {} {} in {:?} (attempt {}/{}): {}",
                        kind,
                        url,
                        delay,
                        attempt,
                        max_attempts,
                        error
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(FetchErrorWithHint { error, .. }) => return Err(error),
            }
        }
    }

    async fn attempt(&self, url: &Url, kind: FetchKind) -> Result<Fetched, FetchErrorWithHint> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| FetchErrorWithHint::from(FetchError::from_reqwest(e)))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(FetchErrorWithHint {
                error: FetchError::HttpStatus {
                    status: status.as_u16(),
                },
                retry_after,
            });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if kind == FetchKind::Page && !is_html(&content_type) {
            return Err(FetchError::ContentMismatch { content_type }.into());
        }

        let final_url = response.url().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchErrorWithHint::from(FetchError::from_reqwest(e)))?;

        Ok(Fetched {
            final_url,
            status: status.as_u16(),
            content_type,
            body: body.to_vec(),
            attempts: 1,
        })
    }
}

/// A failed attempt plus the server's Retry-After, if it sent one
struct FetchErrorWithHint {
    error: FetchError,
    retry_after: Option<Duration>,
}

impl From<FetchError> for FetchErrorWithHint {
    fn from(error: FetchError) -> Self {
        Self {
            error,
            retry_after: None,
        }
    }
}

/// Missing Content-Type is treated as HTML
fn is_html(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime.is_empty() || mime == "text/html" || mime == "application/xhtml+xml"
}
