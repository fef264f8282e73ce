use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Sumi-Crawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// URLs the crawl starts from
    #[serde(default)]
    pub seeds: Vec<String>,

    /// Number of parallel fetch workers
    #[serde(rename = "fetch-workers")]
    pub fetch_workers: usize,

    /// Number of parallel parse workers
    #[serde(rename = "parse-workers")]
    pub parse_workers: usize,

    /// Minimum time between dispatches to the same domain (milliseconds)
    #[serde(rename = "crawl-delay-ms")]
    pub crawl_delay_ms: u64,

    /// Retries allowed after the first failed attempt of a transient fetch
    #[serde(rename = "max-fetch-retries")]
    pub max_fetch_retries: u32,

    /// Per-attempt fetch timeout (milliseconds)
    #[serde(rename = "fetch-timeout-ms")]
    pub fetch_timeout_ms: u64,

    /// Fixed delay between fetch attempts (milliseconds)
    #[serde(rename = "retry-delay-ms")]
    pub retry_delay_ms: u64,

    /// Maximum number of URLs waiting in the work queue
    #[serde(rename = "queue-capacity")]
    pub queue_capacity: usize,

    /// Maximum number of fetch results waiting for a parse worker
    #[serde(rename = "handoff-capacity", default = "default_handoff_capacity")]
    pub handoff_capacity: usize,

    /// Fixed delay applied by a fetch worker before every fetch (milliseconds)
    #[serde(rename = "pre-fetch-delay-ms", default)]
    pub pre_fetch_delay_ms: u64,
}

fn default_handoff_capacity() -> usize {
    64
}

impl CrawlerConfig {
    pub fn crawl_delay(&self) -> Duration {
        Duration::from_millis(self.crawl_delay_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn pre_fetch_delay(&self) -> Duration {
        Duration::from_millis(self.pre_fetch_delay_ms)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    ///
    /// Format: `CrawlerName/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}
