//! Storage module for persisting crawl output
//!
//! This module handles everything the crawler writes out:
//! - The [`PageStore`] capability the parse stage stores pages through
//! - A SQLite backend with schema management and simple statistics queries
//! - An in-memory backend for tests and throwaway runs

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;
pub use traits::{PageStore, StorageError, StorageResult};

use crate::url::NormalizedUrl;
use chrono::Utc;
use std::path::Path;

/// Opens (or creates) the SQLite database at `path`
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// A page worth keeping: produced by the parse stage when a title was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    pub url: String,
    pub domain: String,
    pub title: String,
    pub status_code: Option<u16>,
    pub fetched_at: String,
}

impl PageRecord {
    /// Builds a record for `url`, timestamped now
    pub fn new(url: &NormalizedUrl, title: impl Into<String>, status_code: Option<u16>) -> Self {
        Self {
            url: url.as_str().to_string(),
            domain: url.domain(),
            title: title.into(),
            status_code,
            fetched_at: Utc::now().to_rfc3339(),
        }
    }
}
