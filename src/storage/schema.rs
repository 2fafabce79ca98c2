//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Site-Ferry database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per crawl; owns its pages, assets and logs
CREATE TABLE IF NOT EXISTS crawls (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    seed_url TEXT NOT NULL,
    max_depth INTEGER NOT NULL,
    options TEXT NOT NULL,
    status TEXT NOT NULL,
    started_at TEXT NOT NULL,
    completed_at TEXT,
    page_count INTEGER NOT NULL DEFAULT 0,
    error TEXT
);

CREATE INDEX IF NOT EXISTS idx_crawls_user ON crawls(user_id);

-- Captured HTML pages, unique by canonical path within a crawl
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    crawl_id INTEGER NOT NULL REFERENCES crawls(id) ON DELETE CASCADE,
    url TEXT NOT NULL,
    path TEXT NOT NULL,
    title TEXT,
    content TEXT NOT NULL,
    depth INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(crawl_id, path)
);

CREATE INDEX IF NOT EXISTS idx_pages_crawl ON pages(crawl_id);

-- Captured assets, unique by (type, path) within a crawl
CREATE TABLE IF NOT EXISTS assets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    crawl_id INTEGER NOT NULL REFERENCES crawls(id) ON DELETE CASCADE,
    url TEXT NOT NULL,
    path TEXT NOT NULL,
    asset_type TEXT NOT NULL,
    content BLOB NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(crawl_id, asset_type, path)
);

CREATE INDEX IF NOT EXISTS idx_assets_crawl ON assets(crawl_id);

-- Append-only audit trail
CREATE TABLE IF NOT EXISTS crawl_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    crawl_id INTEGER NOT NULL REFERENCES crawls(id) ON DELETE CASCADE,
    status TEXT NOT NULL,
    message TEXT NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_crawl_logs_crawl ON crawl_logs(crawl_id);

-- Conversion attempts; the crawl reference does not own the row
CREATE TABLE IF NOT EXISTS converted_sites (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    crawl_id INTEGER REFERENCES crawls(id) ON DELETE SET NULL,
    user_id TEXT NOT NULL,
    page_count INTEGER NOT NULL DEFAULT 0,
    size INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    framework TEXT NOT NULL,
    react_version TEXT,
    error TEXT,
    manifest TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_converted_sites_crawl ON converted_sites(crawl_id);

-- Saved exports holding a copied page list
CREATE TABLE IF NOT EXISTS saved_sites (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    crawl_id INTEGER REFERENCES crawls(id) ON DELETE SET NULL,
    user_id TEXT NOT NULL,
    name TEXT NOT NULL,
    seed_url TEXT NOT NULL,
    page_count INTEGER NOT NULL,
    snapshot TEXT NOT NULL,
    created_at TEXT NOT NULL
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
