//! Storage traits and error types
//!
//! This module defines the capability the crawl core stores finished pages
//! through, and the errors a backend may report.

use crate::storage::PageRecord;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage lock poisoned")]
    Poisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Destination for page records produced by the parse stage
///
/// Implementations are shared by every parse worker, so they must handle
/// concurrent calls. A failed store is logged by the caller and never retried
/// or allowed to stall the crawl.
pub trait PageStore: Send + Sync {
    /// Stores one page record, replacing any earlier record for the same URL
    fn store_page(&self, record: &PageRecord) -> StorageResult<()>;
}

impl<T: PageStore + ?Sized> PageStore for std::sync::Arc<T> {
    fn store_page(&self, record: &PageRecord) -> StorageResult<()> {
        (**self).store_page(record)
    }
}
