//! Crawl audit log writer
//!
//! Every entry is appended to the crawl's log table and mirrored as a
//! tracing event at the matching level.

use crate::storage::{self, LogStatus, SharedStorage, Storage, StorageResult};

/// Appends log entries for one crawl
#[derive(Clone)]
pub struct CrawlLogger {
    storage: SharedStorage,
    crawl_id: i64,
}

impl CrawlLogger {
    pub fn new(storage: SharedStorage, crawl_id: i64) -> Self {
        Self { storage, crawl_id }
    }

    pub fn crawl_id(&self) -> i64 {
        self.crawl_id
    }

    /// Appends one entry and returns its sequence id
    pub fn log(&self, status: LogStatus, message: &str) -> StorageResult<i64> {
        match status {
            LogStatus::Success | LogStatus::Info => {
                tracing::info!("[crawl {}] {}", self.crawl_id, message)
            }
            LogStatus::Warning => tracing::warn!("[crawl {}] {}", self.crawl_id, message),
            LogStatus::Error => tracing::error!("[crawl {}] {}", self.crawl_id, message),
        }

        storage::lock(&self.storage)?.append_log(self.crawl_id, status, message)
    }

    pub fn success(&self, message: &str) -> StorageResult<i64> {
        self.log(LogStatus::Success, message)
    }

    pub fn info(&self, message: &str) -> StorageResult<i64> {
        self.log(LogStatus::Info, message)
    }

    pub fn warning(&self, message: &str) -> StorageResult<i64> {
        self.log(LogStatus::Warning, message)
    }

    pub fn error(&self, message: &str) -> StorageResult<i64> {
        self.log(LogStatus::Error, message)
    }
}
