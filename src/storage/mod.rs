//! Storage module for persisting crawl data
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Crawl rows and their status/page counters
//! - Page, asset and crawl log rows owned by a crawl
//! - Converted site and saved site records

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::{CrawlOptions, CrawlStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Storage handle shared between the service, coordinators and workers
pub type SharedStorage = Arc<Mutex<SqliteStorage>>;

/// Wraps an opened storage for sharing
pub fn shared(storage: SqliteStorage) -> SharedStorage {
    Arc::new(Mutex::new(storage))
}

/// Locks a shared storage, surfacing a poisoned lock as a storage error
pub fn lock(storage: &SharedStorage) -> StorageResult<MutexGuard<'_, SqliteStorage>> {
    storage
        .lock()
        .map_err(|_| StorageError::Database("storage lock poisoned".to_string()))
}

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Represents a crawl in the database
#[derive(Debug, Clone)]
pub struct CrawlRecord {
    pub id: i64,
    pub user_id: String,
    pub seed_url: String,
    pub max_depth: u32,
    pub options: CrawlOptions,
    pub status: CrawlStatus,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub page_count: u64,
    pub error: Option<String>,
}

/// A page about to be persisted
#[derive(Debug, Clone)]
pub struct NewPage<'a> {
    pub url: &'a str,
    pub path: &'a str,
    pub title: Option<&'a str>,
    pub content: &'a str,
    pub depth: u32,
}

/// Represents a captured page
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub id: i64,
    pub crawl_id: i64,
    pub url: String,
    pub path: String,
    pub title: Option<String>,
    pub content: String,
    pub depth: u32,
    pub created_at: String,
}

/// Kind of a captured asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Image,
    Stylesheet,
}

impl AssetType {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Stylesheet => "stylesheet",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "image" => Some(Self::Image),
            "stylesheet" => Some(Self::Stylesheet),
            _ => None,
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// Represents a captured asset
#[derive(Debug, Clone)]
pub struct AssetRecord {
    pub id: i64,
    pub crawl_id: i64,
    pub url: String,
    pub path: String,
    pub asset_type: AssetType,
    pub content: Vec<u8>,
    pub created_at: String,
}

/// Severity of a crawl log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Success,
    Warning,
    Error,
    Info,
}

impl LogStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Info => "info",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "warning" => Some(Self::Warning),
            "error" => Some(Self::Error),
            "info" => Some(Self::Info),
            _ => None,
        }
    }
}

/// Append-only crawl audit entry; `id` orders entries within a crawl
#[derive(Debug, Clone)]
pub struct CrawlLogRecord {
    pub id: i64,
    pub crawl_id: i64,
    pub status: LogStatus,
    pub message: String,
    pub timestamp: String,
}

/// Status of a conversion attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionStatus {
    InProgress,
    Completed,
    Failed,
}

impl ConversionStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Represents one conversion attempt
///
/// `crawl_id` becomes `None` if the source crawl is deleted.
#[derive(Debug, Clone)]
pub struct ConvertedSiteRecord {
    pub id: i64,
    pub crawl_id: Option<i64>,
    pub user_id: String,
    pub page_count: u64,
    pub size: u64,
    pub status: ConversionStatus,
    pub framework: String,
    pub react_version: Option<String>,
    pub error: Option<String>,
    pub manifest: Option<String>,
    pub created_at: String,
}

/// Final values written when a conversion attempt ends
#[derive(Debug, Clone)]
pub struct ConversionResult<'a> {
    pub status: ConversionStatus,
    pub page_count: u64,
    pub size: u64,
    pub error: Option<&'a str>,
    pub manifest: Option<&'a str>,
}

/// Export record holding a copy of a crawl's page list
#[derive(Debug, Clone)]
pub struct SavedSiteRecord {
    pub id: i64,
    pub crawl_id: Option<i64>,
    pub user_id: String,
    pub name: String,
    pub seed_url: String,
    pub page_count: u64,
    pub snapshot: String,
    pub created_at: String,
}
