//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlStatus`: the crawl lifecycle state machine
//! - `CrawlOptions`: per-crawl switches fixed at start
//! - `DomainState`: per-origin request spacing

mod crawl_status;
mod domain_state;
mod options;

// Re-export main types
pub use crawl_status::CrawlStatus;
pub use domain_state::DomainState;
pub use options::CrawlOptions;
