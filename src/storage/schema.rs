//! Database schema definitions
//!
//! This module contains the SQL schema for the Sumi-Crawl page database.

use rusqlite::Connection;

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per stored page, keyed by normalized URL
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    domain TEXT NOT NULL,
    title TEXT NOT NULL,
    status_code INTEGER,
    fetched_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_pages_domain ON pages(domain);
"#;

/// Creates all tables and indexes if they do not exist yet
pub fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}
