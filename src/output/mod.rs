//! Output module for crawl reports and conversion exports
//!
//! This module handles:
//! - Per-crawl statistics read back from storage
//! - Human-readable status reports
//! - Writing converted-site manifests to disk

mod report;
pub mod stats;

pub use report::{format_status_report, write_manifest};
pub use stats::{load_statistics, print_statistics, CrawlStatistics};
