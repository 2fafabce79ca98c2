//! Statistics generation from crawl database
//!
//! This module provides functionality for extracting and displaying
//! per-crawl statistics from the storage layer.

use crate::state::CrawlStatus;
use crate::storage::{AssetType, LogStatus, Storage};
use crate::Result;
use chrono::{DateTime, FixedOffset};
use std::collections::{BTreeMap, HashMap};

/// Statistics of a single crawl
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    pub crawl_id: i64,

    pub seed_url: String,

    pub status: CrawlStatus,

    /// Configured depth bound
    pub max_depth: u32,

    /// Number of stored pages
    pub total_pages: u64,

    /// Count of stored pages by depth from the seed
    pub pages_by_depth: BTreeMap<u32, u64>,

    /// Count of stored assets by type
    pub assets_by_type: BTreeMap<AssetType, u64>,

    /// Total bytes of stored asset bodies
    pub asset_bytes: u64,

    /// Count of log entries by status
    pub logs_by_status: HashMap<LogStatus, u64>,

    /// Wall time between start and completion, when the crawl has ended
    pub duration_seconds: Option<i64>,

    pub error: Option<String>,
}

impl CrawlStatistics {
    pub fn log_count(&self, status: LogStatus) -> u64 {
        self.logs_by_status.get(&status).copied().unwrap_or(0)
    }

    pub fn asset_count(&self, asset_type: AssetType) -> u64 {
        self.assets_by_type.get(&asset_type).copied().unwrap_or(0)
    }
}

/// Loads statistics for one crawl from storage
pub fn load_statistics(storage: &dyn Storage, crawl_id: i64) -> Result<CrawlStatistics> {
    let crawl = storage.get_crawl(crawl_id)?;

    let mut pages_by_depth = BTreeMap::new();
    for page in storage.get_pages(crawl_id)? {
        *pages_by_depth.entry(page.depth).or_insert(0) += 1;
    }
    let total_pages = pages_by_depth.values().sum();

    let mut assets_by_type = BTreeMap::new();
    let mut asset_bytes = 0;
    for asset in storage.get_assets(crawl_id, None)? {
        *assets_by_type.entry(asset.asset_type).or_insert(0) += 1;
        asset_bytes += asset.content.len() as u64;
    }

    let mut logs_by_status = HashMap::new();
    for entry in storage.get_logs(crawl_id)? {
        *logs_by_status.entry(entry.status).or_insert(0) += 1;
    }

    let duration_seconds = crawl
        .completed_at
        .as_deref()
        .and_then(|finished| elapsed_seconds(&crawl.started_at, finished));

    Ok(CrawlStatistics {
        crawl_id,
        seed_url: crawl.seed_url,
        status: crawl.status,
        max_depth: crawl.max_depth,
        total_pages,
        pages_by_depth,
        assets_by_type,
        asset_bytes,
        logs_by_status,
        duration_seconds,
        error: crawl.error,
    })
}

fn elapsed_seconds(started: &str, finished: &str) -> Option<i64> {
    let started = DateTime::<FixedOffset>::parse_from_rfc3339(started).ok()?;
    let finished = DateTime::<FixedOffset>::parse_from_rfc3339(finished).ok()?;
    Some((finished - started).num_seconds())
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl {} Statistics ===\n", stats.crawl_id);

    println!("Overview:");
    println!("  Seed: {}", stats.seed_url);
    println!("  Status: {}", stats.status);
    println!("  Pages stored: {}", stats.total_pages);
    if let Some(seconds) = stats.duration_seconds {
        println!("  Duration: {}s", seconds);
    }
    if let Some(error) = &stats.error {
        println!("  Error: {}", error);
    }
    println!();

    println!("Pages by Depth (max {}):", stats.max_depth);
    for (depth, count) in &stats.pages_by_depth {
        let percentage = if stats.total_pages > 0 {
            (*count as f64 / stats.total_pages as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", depth, count, percentage);
    }
    println!();

    if !stats.assets_by_type.is_empty() {
        println!("Assets ({} bytes):", stats.asset_bytes);
        for (asset_type, count) in &stats.assets_by_type {
            println!("  {}: {}", asset_type, count);
        }
        println!();
    }

    let warnings = stats.log_count(LogStatus::Warning);
    let errors = stats.log_count(LogStatus::Error);
    if warnings + errors > 0 {
        println!("Problems:");
        println!("  Warnings: {}", warnings);
        println!("  Errors: {}", errors);
        println!();
    }
}
