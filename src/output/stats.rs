//! Live crawl counters
//!
//! Workers bump these as they go; [`CrawlStats::snapshot`] freezes them for
//! the end-of-crawl summary.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by all workers of one session
#[derive(Debug, Default)]
pub struct CrawlStats {
    dispatched: AtomicU64,
    fetched: AtomicU64,
    fetch_failures: AtomicU64,
    retries: AtomicU64,
    non_html: AtomicU64,
    parse_failures: AtomicU64,
    pages_stored: AtomicU64,
    storage_failures: AtomicU64,
    links_discovered: AtomicU64,
    links_accepted: AtomicU64,
    duplicate_links: AtomicU64,
    malformed_links: AtomicU64,
}

/// Point-in-time copy of [`CrawlStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// URLs handed to fetch workers
    pub dispatched: u64,
    /// Fetches that produced a response
    pub fetched: u64,
    /// Fetches that ended in a terminal error
    pub fetch_failures: u64,
    /// Attempts beyond the first
    pub retries: u64,
    /// Responses skipped because they were not HTML
    pub non_html: u64,
    pub parse_failures: u64,
    pub pages_stored: u64,
    pub storage_failures: u64,
    /// Links found on fetched pages, before deduplication
    pub links_discovered: u64,
    /// Links that were new and entered the queue
    pub links_accepted: u64,
    pub duplicate_links: u64,
    pub malformed_links: u64,
}

fn bump(counter: &AtomicU64, by: u64) {
    counter.fetch_add(by, Ordering::Relaxed);
}

impl CrawlStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_dispatch(&self) {
        bump(&self.dispatched, 1);
    }

    /// Records a finished fetch: `attempts` made, and whether it succeeded
    pub fn record_fetch(&self, attempts: u32, success: bool) {
        bump(&self.retries, u64::from(attempts.saturating_sub(1)));
        if success {
            bump(&self.fetched, 1);
        } else {
            bump(&self.fetch_failures, 1);
        }
    }

    pub fn record_non_html(&self) {
        bump(&self.non_html, 1);
    }

    pub fn record_parse_failure(&self) {
        bump(&self.parse_failures, 1);
    }

    pub fn record_store(&self, success: bool) {
        if success {
            bump(&self.pages_stored, 1);
        } else {
            bump(&self.storage_failures, 1);
        }
    }

    /// Records the outcome of submitting a page's links
    pub fn record_links(
        &self,
        discovered: usize,
        accepted: usize,
        duplicates: usize,
        malformed: usize,
    ) {
        bump(&self.links_discovered, discovered as u64);
        bump(&self.links_accepted, accepted as u64);
        bump(&self.duplicate_links, duplicates as u64);
        bump(&self.malformed_links, malformed as u64);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        StatsSnapshot {
            dispatched: load(&self.dispatched),
            fetched: load(&self.fetched),
            fetch_failures: load(&self.fetch_failures),
            retries: load(&self.retries),
            non_html: load(&self.non_html),
            parse_failures: load(&self.parse_failures),
            pages_stored: load(&self.pages_stored),
            storage_failures: load(&self.storage_failures),
            links_discovered: load(&self.links_discovered),
            links_accepted: load(&self.links_accepted),
            duplicate_links: load(&self.duplicate_links),
            malformed_links: load(&self.malformed_links),
        }
    }
}
