//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the PageStore trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{PageStore, StorageError, StorageResult};
use crate::storage::PageRecord;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite storage backend
///
/// The connection sits behind a mutex so one instance can be shared by all
/// parse workers.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Opens or creates the database at `path` and ensures the schema exists
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Gets the stored record for a URL
    pub fn get_page(&self, url: &str) -> StorageResult<Option<PageRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT url, domain, title, status_code, fetched_at FROM pages WHERE url = ?1",
        )?;

        let page = stmt
            .query_row(params![url], |row| {
                Ok(PageRecord {
                    url: row.get(0)?,
                    domain: row.get(1)?,
                    title: row.get(2)?,
                    status_code: row.get(3)?,
                    fetched_at: row.get(4)?,
                })
            })
            .optional()?;

        Ok(page)
    }

    /// Counts stored pages
    pub fn count_pages(&self) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Counts distinct domains with at least one stored page
    pub fn count_domains(&self) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(DISTINCT domain) FROM pages", [], |row| {
                row.get(0)
            })?;
        Ok(count as u64)
    }

    /// Stored page counts per domain, largest first
    pub fn pages_per_domain(&self) -> StorageResult<Vec<(String, u64)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT domain, COUNT(*) AS n FROM pages GROUP BY domain ORDER BY n DESC, domain ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            let count: i64 = row.get(1)?;
            Ok((row.get::<_, String>(0)?, count as u64))
        })?;

        let mut counts = Vec::new();
        for row in rows {
            counts.push(row?);
        }
        Ok(counts)
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }
}

impl PageStore for SqliteStorage {
    fn store_page(&self, record: &PageRecord) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO pages (url, domain, title, status_code, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(url) DO UPDATE SET
                title = excluded.title,
                status_code = excluded.status_code,
                fetched_at = excluded.fetched_at",
            params![
                record.url,
                record.domain,
                record.title,
                record.status_code,
                record.fetched_at
            ],
        )?;
        Ok(())
    }
}
