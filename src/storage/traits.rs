//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::{CrawlOptions, CrawlStatus};
use crate::storage::{
    AssetRecord, AssetType, ConversionResult, ConvertedSiteRecord, CrawlLogRecord, CrawlRecord,
    LogStatus, NewPage, PageRecord, SavedSiteRecord,
};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Crawl not found: {0}")]
    CrawlNotFound(i64),

    #[error("Converted site not found: {0}")]
    ConvertedSiteNotFound(i64),

    #[error("Saved site not found: {0}")]
    SavedSiteNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt value in column {column}: {value}")]
    Corrupt { column: &'static str, value: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait is the persistence boundary of the crate. Callers share one
/// backend behind a mutex, so methods take `&mut self` for writes.
pub trait Storage {
    // ===== Crawls =====

    /// Creates a crawl in the `idle` state and returns its id
    fn create_crawl(
        &mut self,
        user_id: &str,
        seed_url: &str,
        max_depth: u32,
        options: &CrawlOptions,
    ) -> StorageResult<i64>;

    /// Gets a crawl by id
    fn get_crawl(&self, crawl_id: i64) -> StorageResult<CrawlRecord>;

    /// Lists a user's crawls, newest first
    fn list_crawls(&self, user_id: &str) -> StorageResult<Vec<CrawlRecord>>;

    /// Writes a new status; terminal statuses also stamp `completed_at`
    fn update_crawl_status(
        &mut self,
        crawl_id: i64,
        status: CrawlStatus,
        error: Option<&str>,
    ) -> StorageResult<()>;

    /// Writes the orchestrator-maintained page counter
    fn set_page_count(&mut self, crawl_id: i64, page_count: u64) -> StorageResult<()>;

    /// Deletes a crawl together with its pages, assets and logs
    fn delete_crawl(&mut self, crawl_id: i64) -> StorageResult<()>;

    // ===== Pages =====

    /// Inserts a page; returns `None` if the crawl already has that path
    fn insert_page(&mut self, crawl_id: i64, page: &NewPage<'_>) -> StorageResult<Option<i64>>;

    /// All pages of a crawl ordered by path
    fn get_pages(&self, crawl_id: i64) -> StorageResult<Vec<PageRecord>>;

    /// Number of page rows of a crawl
    fn count_pages(&self, crawl_id: i64) -> StorageResult<u64>;

    // ===== Assets =====

    /// Inserts an asset; returns `None` if (type, path) already exists for the crawl
    fn insert_asset(
        &mut self,
        crawl_id: i64,
        url: &str,
        path: &str,
        asset_type: AssetType,
        content: &[u8],
    ) -> StorageResult<Option<i64>>;

    /// Assets of a crawl ordered by type then path, optionally filtered by type
    fn get_assets(
        &self,
        crawl_id: i64,
        asset_type: Option<AssetType>,
    ) -> StorageResult<Vec<AssetRecord>>;

    /// Number of asset rows of a crawl with the given type
    fn count_assets(&self, crawl_id: i64, asset_type: AssetType) -> StorageResult<u64>;

    // ===== Crawl logs =====

    /// Appends a log entry and returns its sequence id
    fn append_log(
        &mut self,
        crawl_id: i64,
        status: LogStatus,
        message: &str,
    ) -> StorageResult<i64>;

    /// All log entries of a crawl in append order
    fn get_logs(&self, crawl_id: i64) -> StorageResult<Vec<CrawlLogRecord>>;

    // ===== Converted sites =====

    /// Creates an `in_progress` conversion attempt
    fn create_converted_site(
        &mut self,
        crawl_id: i64,
        user_id: &str,
        framework: &str,
        react_version: Option<&str>,
    ) -> StorageResult<i64>;

    /// Records the final state of a conversion attempt
    fn finish_converted_site(
        &mut self,
        converted_site_id: i64,
        result: &ConversionResult<'_>,
    ) -> StorageResult<()>;

    /// Gets a conversion attempt by id
    fn get_converted_site(&self, converted_site_id: i64) -> StorageResult<ConvertedSiteRecord>;

    // ===== Saved sites =====

    /// Copies the crawl's page list into a new saved site record
    fn save_site(&mut self, crawl_id: i64, user_id: &str, name: &str) -> StorageResult<i64>;

    /// Gets a saved site by id
    fn get_saved_site(&self, saved_site_id: i64) -> StorageResult<SavedSiteRecord>;
}
