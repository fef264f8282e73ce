//! Crawl summaries and statistics
//!
//! This module handles:
//! - Live counters updated by the workers ([`CrawlStats`])
//! - The summary a finished session returns ([`CrawlSummary`])
//! - Statistics over pages already stored in the database

pub mod stats;

pub use stats::{CrawlStats, StatsSnapshot};

use crate::storage::{SqliteStorage, StorageResult};
use std::fmt;
use std::time::Duration;

/// How a crawl session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The frontier drained: nothing in flight and nothing queued
    Completed,
    /// Shutdown was forced before the frontier drained
    Interrupted,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Completed => write!(f, "completed"),
            Termination::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// Result of one crawl session
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub termination: Termination,
    /// RFC 3339 start timestamp
    pub started_at: String,
    /// RFC 3339 end timestamp
    pub finished_at: String,
    pub elapsed: Duration,
    /// Distinct URLs accepted into the frontier
    pub urls_visited: usize,
    pub stats: StatsSnapshot,
}

/// Prints a session summary to stdout
pub fn print_summary(summary: &CrawlSummary) {
    let stats = &summary.stats;

    println!("=== Crawl Summary ===\n");
    println!("Termination: {}", summary.termination);
    println!("Started:     {}", summary.started_at);
    println!("Finished:    {}", summary.finished_at);
    println!("Elapsed:     {:.1}s", summary.elapsed.as_secs_f64());
    println!();

    println!("Frontier:");
    println!("  URLs visited: {}", summary.urls_visited);
    println!("  Dispatched: {}", stats.dispatched);
    println!();

    println!("Fetching:");
    println!("  Fetched: {}", stats.fetched);
    println!("  Failed: {}", stats.fetch_failures);
    println!("  Retries: {}", stats.retries);
    println!("  Non-HTML: {}", stats.non_html);
    println!();

    println!("Links:");
    println!("  Discovered: {}", stats.links_discovered);
    println!("  Accepted: {}", stats.links_accepted);
    println!("  Duplicates: {}", stats.duplicate_links);
    println!("  Malformed: {}", stats.malformed_links);
    println!();

    println!("Pages stored: {}", stats.pages_stored);
    if stats.storage_failures > 0 || stats.parse_failures > 0 {
        println!("  Storage failures: {}", stats.storage_failures);
        println!("  Parse failures: {}", stats.parse_failures);
    }
}

/// Statistics over the pages stored in a database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredStatistics {
    pub total_pages: u64,
    pub unique_domains: u64,
    /// Pages per domain, largest first
    pub pages_per_domain: Vec<(String, u64)>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The database to query
///
/// # Returns
///
/// * `Ok(StoredStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics(storage: &SqliteStorage) -> StorageResult<StoredStatistics> {
    Ok(StoredStatistics {
        total_pages: storage.count_pages()?,
        unique_domains: storage.count_domains()?,
        pages_per_domain: storage.pages_per_domain()?,
    })
}

/// Prints stored-page statistics to stdout
pub fn print_statistics(stats: &StoredStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Pages stored: {}", stats.total_pages);
    println!("  Unique domains: {}", stats.unique_domains);
    println!();

    if !stats.pages_per_domain.is_empty() {
        println!("Pages by Domain:");
        for (domain, count) in &stats.pages_per_domain {
            let percentage = if stats.total_pages > 0 {
                (*count as f64 / stats.total_pages as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", domain, count, percentage);
        }
    }
}
