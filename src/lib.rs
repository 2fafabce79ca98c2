//! Site-Ferry: crawl a website and ferry it into a component model
//!
//! This crate crawls a seed site to a bounded depth, politely and concurrently,
//! stores its pages and assets, and converts a completed crawl into a
//! framework-ready page/component description.

pub mod config;
pub mod converter;
pub mod crawler;
pub mod output;
pub mod robots;
pub mod service;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Site-Ferry operations
#[derive(Debug, Error)]
pub enum FerryError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] UrlError),

    #[error("Max depth {depth} is out of range (allowed 0..={limit})")]
    DepthOutOfRange { depth: u32, limit: u32 },

    #[error("Invalid crawl transition: {from} -> {to}")]
    InvalidTransition {
        from: state::CrawlStatus,
        to: state::CrawlStatus,
    },

    #[error("Crawl {crawl_id} is {status}, expected completed")]
    InvalidState {
        crawl_id: i64,
        status: state::CrawlStatus,
    },

    #[error("Crawl not found: {0}")]
    CrawlNotFound(i64),

    #[error("Policy violation for {url}: {reason}")]
    PolicyViolation { url: String, reason: String },

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Conversion failed: {0}")]
    ConversionFailure(String),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Site-Ferry operations
pub type Result<T> = std::result::Result<T, FerryError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use converter::{convert, ConvertedSite};
pub use service::CrawlService;
pub use state::{CrawlOptions, CrawlStatus};
pub use url::{normalize_url, same_origin};
