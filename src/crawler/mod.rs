//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with rate limiting and retry logic
//! - HTML parsing and link extraction
//! - The frontier and visited set
//! - Crawl lifecycle control and the audit log
//! - Overall crawl coordination

mod control;
mod coordinator;
mod fetcher;
mod frontier;
mod log;
mod parser;

pub use control::CrawlControl;
pub use coordinator::{CrawlJob, Coordinator};
pub use fetcher::{build_http_client, FetchError, FetchKind, Fetched, Fetcher};
pub use frontier::{EnqueueOutcome, Frontier, QueuedUrl};
pub use log::CrawlLogger;
pub use parser::{parse_html, resolve_link, ParsedPage};
