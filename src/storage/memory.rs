//! In-memory storage backend

use crate::storage::traits::{PageStore, StorageError, StorageResult};
use crate::storage::PageRecord;
use std::sync::Mutex;

/// Keeps every stored record in memory, in store order
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: Mutex<Vec<PageRecord>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record stored so far, including replaced ones
    pub fn records(&self) -> Vec<PageRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Number of store calls that succeeded
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if a record for `url` was stored
    pub fn contains(&self, url: &str) -> bool {
        self.records
            .lock()
            .map(|records| records.iter().any(|r| r.url == url))
            .unwrap_or(false)
    }
}

impl PageStore for MemoryStorage {
    fn store_page(&self, record: &PageRecord) -> StorageResult<()> {
        let mut records = self.records.lock().map_err(|_| StorageError::Poisoned)?;
        records.push(record.clone());
        Ok(())
    }
}
