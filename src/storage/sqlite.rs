//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::{CrawlOptions, CrawlStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    AssetRecord, AssetType, ConversionResult, ConversionStatus, ConvertedSiteRecord,
    CrawlLogRecord, CrawlRecord, LogStatus, NewPage, PageRecord, SavedSiteRecord,
};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::path::Path;

const CRAWL_COLUMNS: &str = "id, user_id, seed_url, max_depth, options, status, started_at, \
                             completed_at, page_count, error";

const CONVERTED_COLUMNS: &str = "id, crawl_id, user_id, page_count, size, status, framework, \
                                 react_version, error, manifest, created_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens (or creates) the database file and applies the schema
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Maps a text column through a parser, reporting unknown values as corrupt
fn parse_column<T>(
    idx: usize,
    column: &'static str,
    value: String,
    parse: fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    parse(&value).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            Box::new(StorageError::Corrupt { column, value }),
        )
    })
}

fn crawl_from_row(row: &Row<'_>) -> rusqlite::Result<CrawlRecord> {
    let options_json: String = row.get(4)?;
    let options: CrawlOptions = serde_json::from_str(&options_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

    Ok(CrawlRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        seed_url: row.get(2)?,
        max_depth: row.get(3)?,
        options,
        status: parse_column(5, "crawls.status", row.get(5)?, CrawlStatus::from_db_string)?,
        started_at: row.get(6)?,
        completed_at: row.get(7)?,
        page_count: row.get::<_, i64>(8)? as u64,
        error: row.get(9)?,
    })
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<PageRecord> {
    Ok(PageRecord {
        id: row.get(0)?,
        crawl_id: row.get(1)?,
        url: row.get(2)?,
        path: row.get(3)?,
        title: row.get(4)?,
        content: row.get(5)?,
        depth: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn asset_from_row(row: &Row<'_>) -> rusqlite::Result<AssetRecord> {
    Ok(AssetRecord {
        id: row.get(0)?,
        crawl_id: row.get(1)?,
        url: row.get(2)?,
        path: row.get(3)?,
        asset_type: parse_column(4, "assets.asset_type", row.get(4)?, AssetType::from_db_string)?,
        content: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn converted_from_row(row: &Row<'_>) -> rusqlite::Result<ConvertedSiteRecord> {
    Ok(ConvertedSiteRecord {
        id: row.get(0)?,
        crawl_id: row.get(1)?,
        user_id: row.get(2)?,
        page_count: row.get::<_, i64>(3)? as u64,
        size: row.get::<_, i64>(4)? as u64,
        status: parse_column(
            5,
            "converted_sites.status",
            row.get(5)?,
            ConversionStatus::from_db_string,
        )?,
        framework: row.get(6)?,
        react_version: row.get(7)?,
        error: row.get(8)?,
        manifest: row.get(9)?,
        created_at: row.get(10)?,
    })
}

/// One entry of a saved site's page list
#[derive(Debug, Serialize)]
struct SnapshotEntry {
    path: String,
    url: String,
    title: Option<String>,
}

impl Storage for SqliteStorage {
    // ===== Crawls =====

    fn create_crawl(
        &mut self,
        user_id: &str,
        seed_url: &str,
        max_depth: u32,
        options: &CrawlOptions,
    ) -> StorageResult<i64> {
        let options_json = serde_json::to_string(options)?;
        self.conn.execute(
            "INSERT INTO crawls (user_id, seed_url, max_depth, options, status, started_at, page_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
            params![
                user_id,
                seed_url,
                max_depth,
                options_json,
                CrawlStatus::Idle.to_db_string(),
                now()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_crawl(&self, crawl_id: i64) -> StorageResult<CrawlRecord> {
        let sql = format!("SELECT {} FROM crawls WHERE id = ?1", CRAWL_COLUMNS);
        self.conn
            .query_row(&sql, params![crawl_id], crawl_from_row)
            .optional()?
            .ok_or(StorageError::CrawlNotFound(crawl_id))
    }

    fn list_crawls(&self, user_id: &str) -> StorageResult<Vec<CrawlRecord>> {
        let sql = format!(
            "SELECT {} FROM crawls WHERE user_id = ?1 ORDER BY id DESC",
            CRAWL_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let crawls = stmt
            .query_map(params![user_id], crawl_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(crawls)
    }

    fn update_crawl_status(
        &mut self,
        crawl_id: i64,
        status: CrawlStatus,
        error: Option<&str>,
    ) -> StorageResult<()> {
        let completed_at = status.is_terminal().then(now);
        let changed = self.conn.execute(
            "UPDATE crawls SET status = ?1, error = COALESCE(?2, error),
             completed_at = COALESCE(?3, completed_at) WHERE id = ?4",
            params![status.to_db_string(), error, completed_at, crawl_id],
        )?;

        if changed == 0 {
            return Err(StorageError::CrawlNotFound(crawl_id));
        }
        Ok(())
    }

    fn set_page_count(&mut self, crawl_id: i64, page_count: u64) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE crawls SET page_count = ?1 WHERE id = ?2",
            params![page_count as i64, crawl_id],
        )?;
        Ok(())
    }

    fn delete_crawl(&mut self, crawl_id: i64) -> StorageResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM crawls WHERE id = ?1", params![crawl_id])?;
        if changed == 0 {
            return Err(StorageError::CrawlNotFound(crawl_id));
        }
        Ok(())
    }

    // ===== Pages =====

    fn insert_page(&mut self, crawl_id: i64, page: &NewPage<'_>) -> StorageResult<Option<i64>> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO pages (crawl_id, url, path, title, content, depth, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                crawl_id,
                page.url,
                page.path,
                page.title,
                page.content,
                page.depth,
                now()
            ],
        )?;

        Ok((inserted > 0).then(|| self.conn.last_insert_rowid()))
    }

    fn get_pages(&self, crawl_id: i64) -> StorageResult<Vec<PageRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, crawl_id, url, path, title, content, depth, created_at
             FROM pages WHERE crawl_id = ?1 ORDER BY path",
        )?;
        let pages = stmt
            .query_map(params![crawl_id], page_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pages)
    }

    fn count_pages(&self, crawl_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE crawl_id = ?1",
            params![crawl_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Assets =====

    fn insert_asset(
        &mut self,
        crawl_id: i64,
        url: &str,
        path: &str,
        asset_type: AssetType,
        content: &[u8],
    ) -> StorageResult<Option<i64>> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO assets (crawl_id, url, path, asset_type, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                crawl_id,
                url,
                path,
                asset_type.to_db_string(),
                content,
                now()
            ],
        )?;

        Ok((inserted > 0).then(|| self.conn.last_insert_rowid()))
    }

    fn get_assets(
        &self,
        crawl_id: i64,
        asset_type: Option<AssetType>,
    ) -> StorageResult<Vec<AssetRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, crawl_id, url, path, asset_type, content, created_at
             FROM assets WHERE crawl_id = ?1 AND (?2 IS NULL OR asset_type = ?2)
             ORDER BY asset_type, path",
        )?;
        let kind = asset_type.map(|t| t.to_db_string());
        let assets = stmt
            .query_map(params![crawl_id, kind], asset_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(assets)
    }

    fn count_assets(&self, crawl_id: i64, asset_type: AssetType) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM assets WHERE crawl_id = ?1 AND asset_type = ?2",
            params![crawl_id, asset_type.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Crawl logs =====

    fn append_log(
        &mut self,
        crawl_id: i64,
        status: LogStatus,
        message: &str,
    ) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO crawl_logs (crawl_id, status, message, timestamp) VALUES (?1, ?2, ?3, ?4)",
            params![crawl_id, status.to_db_string(), message, now()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_logs(&self, crawl_id: i64) -> StorageResult<Vec<CrawlLogRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, crawl_id, status, message, timestamp
             FROM crawl_logs WHERE crawl_id = ?1 ORDER BY id",
        )?;
        let logs = stmt
            .query_map(params![crawl_id], |row| {
                Ok(CrawlLogRecord {
                    id: row.get(0)?,
                    crawl_id: row.get(1)?,
                    status: parse_column(
                        2,
                        "crawl_logs.status",
                        row.get(2)?,
                        LogStatus::from_db_string,
                    )?,
                    message: row.get(3)?,
                    timestamp: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(logs)
    }

    // ===== Converted sites =====

    fn create_converted_site(
        &mut self,
        crawl_id: i64,
        user_id: &str,
        framework: &str,
        react_version: Option<&str>,
    ) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO converted_sites (crawl_id, user_id, status, framework, react_version, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                crawl_id,
                user_id,
                ConversionStatus::InProgress.to_db_string(),
                framework,
                react_version,
                now()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_converted_site(
        &mut self,
        converted_site_id: i64,
        result: &ConversionResult<'_>,
    ) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE converted_sites SET status = ?1, page_count = ?2, size = ?3, error = ?4,
             manifest = ?5 WHERE id = ?6",
            params![
                result.status.to_db_string(),
                result.page_count as i64,
                result.size as i64,
                result.error,
                result.manifest,
                converted_site_id
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::ConvertedSiteNotFound(converted_site_id));
        }
        Ok(())
    }

    fn get_converted_site(&self, converted_site_id: i64) -> StorageResult<ConvertedSiteRecord> {
        let sql = format!(
            "SELECT {} FROM converted_sites WHERE id = ?1",
            CONVERTED_COLUMNS
        );
        self.conn
            .query_row(&sql, params![converted_site_id], converted_from_row)
            .optional()?
            .ok_or(StorageError::ConvertedSiteNotFound(converted_site_id))
    }

    // ===== Saved sites =====

    fn save_site(&mut self, crawl_id: i64, user_id: &str, name: &str) -> StorageResult<i64> {
        let crawl = self.get_crawl(crawl_id)?;
        let tx = self.conn.transaction()?;

        let snapshot = {
            let mut stmt =
                tx.prepare("SELECT path, url, title FROM pages WHERE crawl_id = ?1 ORDER BY path")?;
            let entries = stmt
                .query_map(params![crawl_id], |row| {
                    Ok(SnapshotEntry {
                        path: row.get(0)?,
                        url: row.get(1)?,
                        title: row.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            serde_json::to_string(&entries)?
        };

        tx.execute(
            "INSERT INTO saved_sites (crawl_id, user_id, name, seed_url, page_count, snapshot, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                crawl_id,
                user_id,
                name,
                crawl.seed_url,
                crawl.page_count as i64,
                snapshot,
                now()
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(id)
    }

    fn get_saved_site(&self, saved_site_id: i64) -> StorageResult<SavedSiteRecord> {
        self.conn
            .query_row(
                "SELECT id, crawl_id, user_id, name, seed_url, page_count, snapshot, created_at
                 FROM saved_sites WHERE id = ?1",
                params![saved_site_id],
                |row| {
                    Ok(SavedSiteRecord {
                        id: row.get(0)?,
                        crawl_id: row.get(1)?,
                        user_id: row.get(2)?,
                        name: row.get(3)?,
                        seed_url: row.get(4)?,
                        page_count: row.get::<_, i64>(5)? as u64,
                        snapshot: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                },
            )
            .optional()?
            .ok_or(StorageError::SavedSiteNotFound(saved_site_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage_with_crawl() -> (SqliteStorage, i64) {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let crawl_id = storage
            .create_crawl("user-1", "https://example.com/", 2, &CrawlOptions::default())
            .unwrap();
        (storage, crawl_id)
    }

    fn page<'a>(path: &'a str, content: &'a str) -> NewPage<'a> {
        NewPage {
            url: "https://example.com/",
            path,
            title: Some("Title"),
            content,
            depth: 0,
        }
    }

    #[test]
    fn test_create_and_get_crawl() {
        let (storage, crawl_id) = storage_with_crawl();
        let crawl = storage.get_crawl(crawl_id).unwrap();

        assert_eq!(crawl.user_id, "user-1");
        assert_eq!(crawl.status, CrawlStatus::Idle);
        assert_eq!(crawl.options, CrawlOptions::default());
        assert_eq!(crawl.page_count, 0);
        assert!(crawl.completed_at.is_none());
    }

    #[test]
    fn test_missing_crawl() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        assert!(matches!(
            storage.get_crawl(42),
            Err(StorageError::CrawlNotFound(42))
        ));
    }

    #[test]
    fn test_terminal_status_stamps_completion() {
        let (mut storage, crawl_id) = storage_with_crawl();

        storage
            .update_crawl_status(crawl_id, CrawlStatus::InProgress, None)
            .unwrap();
        assert!(storage.get_crawl(crawl_id).unwrap().completed_at.is_none());

        storage
            .update_crawl_status(crawl_id, CrawlStatus::Error, Some("boom"))
            .unwrap();
        let crawl = storage.get_crawl(crawl_id).unwrap();
        assert_eq!(crawl.status, CrawlStatus::Error);
        assert_eq!(crawl.error.as_deref(), Some("boom"));
        assert!(crawl.completed_at.is_some());
    }

    #[test]
    fn test_duplicate_page_path_is_ignored() {
        let (mut storage, crawl_id) = storage_with_crawl();

        let first = storage.insert_page(crawl_id, &page("/", "<html></html>")).unwrap();
        let second = storage.insert_page(crawl_id, &page("/", "<p>other</p>")).unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(storage.count_pages(crawl_id).unwrap(), 1);
    }

    #[test]
    fn test_same_path_in_other_crawl_is_allowed() {
        let (mut storage, crawl_id) = storage_with_crawl();
        let other = storage
            .create_crawl("user-1", "https://example.com/", 1, &CrawlOptions::default())
            .unwrap();

        assert!(storage.insert_page(crawl_id, &page("/", "a")).unwrap().is_some());
        assert!(storage.insert_page(other, &page("/", "b")).unwrap().is_some());
    }

    #[test]
    fn test_assets_unique_per_type_and_path() {
        let (mut storage, crawl_id) = storage_with_crawl();

        let css = storage
            .insert_asset(crawl_id, "https://example.com/a", "/a", AssetType::Stylesheet, b"body{}")
            .unwrap();
        let img = storage
            .insert_asset(crawl_id, "https://example.com/a", "/a", AssetType::Image, &[0, 1, 2])
            .unwrap();
        let dup = storage
            .insert_asset(crawl_id, "https://example.com/a", "/a", AssetType::Image, &[9])
            .unwrap();

        assert!(css.is_some());
        assert!(img.is_some());
        assert!(dup.is_none());
        assert_eq!(storage.count_assets(crawl_id, AssetType::Image).unwrap(), 1);

        let images = storage.get_assets(crawl_id, Some(AssetType::Image)).unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].content, vec![0, 1, 2]);
        assert_eq!(storage.get_assets(crawl_id, None).unwrap().len(), 2);
    }

    #[test]
    fn test_logs_are_ordered() {
        let (mut storage, crawl_id) = storage_with_crawl();

        storage.append_log(crawl_id, LogStatus::Info, "first").unwrap();
        storage.append_log(crawl_id, LogStatus::Warning, "second").unwrap();

        let logs = storage.get_logs(crawl_id).unwrap();
        assert_eq!(logs.len(), 2);
        assert!(logs[0].id < logs[1].id);
        assert_eq!(logs[1].status, LogStatus::Warning);
        assert_eq!(logs[1].message, "second");
    }

    #[test]
    fn test_delete_crawl_cascades() {
        let (mut storage, crawl_id) = storage_with_crawl();
        storage.insert_page(crawl_id, &page("/", "x")).unwrap();
        storage
            .insert_asset(crawl_id, "u", "/s.css", AssetType::Stylesheet, b"")
            .unwrap();
        storage.append_log(crawl_id, LogStatus::Info, "x").unwrap();
        let site = storage
            .create_converted_site(crawl_id, "user-1", "react", None)
            .unwrap();

        storage.delete_crawl(crawl_id).unwrap();

        assert_eq!(storage.count_pages(crawl_id).unwrap(), 0);
        assert!(storage.get_assets(crawl_id, None).unwrap().is_empty());
        assert!(storage.get_logs(crawl_id).unwrap().is_empty());
        assert_eq!(storage.get_converted_site(site).unwrap().crawl_id, None);
    }

    #[test]
    fn test_converted_site_lifecycle() {
        let (mut storage, crawl_id) = storage_with_crawl();
        let id = storage
            .create_converted_site(crawl_id, "user-1", "react", Some("18.2.0"))
            .unwrap();
        assert_eq!(
            storage.get_converted_site(id).unwrap().status,
            ConversionStatus::InProgress
        );

        storage
            .finish_converted_site(
                id,
                &ConversionResult {
                    status: ConversionStatus::Completed,
                    page_count: 3,
                    size: 1024,
                    error: None,
                    manifest: Some("{}"),
                },
            )
            .unwrap();

        let site = storage.get_converted_site(id).unwrap();
        assert_eq!(site.status, ConversionStatus::Completed);
        assert_eq!(site.page_count, 3);
        assert_eq!(site.size, 1024);
        assert_eq!(site.react_version.as_deref(), Some("18.2.0"));
    }

    #[test]
    fn test_save_site_copies_snapshot() {
        let (mut storage, crawl_id) = storage_with_crawl();
        storage.insert_page(crawl_id, &page("/", "x")).unwrap();
        storage.insert_page(crawl_id, &page("/about", "y")).unwrap();
        storage.set_page_count(crawl_id, 2).unwrap();

        let saved_id = storage.save_site(crawl_id, "user-1", "My site").unwrap();
        storage.insert_page(crawl_id, &page("/later", "z")).unwrap();

        let saved = storage.get_saved_site(saved_id).unwrap();
        assert_eq!(saved.name, "My site");
        assert_eq!(saved.page_count, 2);
        let snapshot: serde_json::Value = serde_json::from_str(&saved.snapshot).unwrap();
        assert_eq!(snapshot.as_array().unwrap().len(), 2);
        assert_eq!(snapshot[1]["path"], "/about");
    }
}
