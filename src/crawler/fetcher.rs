//! HTTP fetching
//!
//! This module handles all network access for the crawler, including:
//! - The [`Fetcher`] capability the fetch workers are generic over
//! - [`HttpFetcher`], the reqwest-backed implementation
//! - Error classification into retryable and terminal failures
//! - The per-URL retry loop driven by [`RetryPolicy`]

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::frontier::Frontier;
use crate::state::UrlState;
use crate::url::NormalizedUrl;
use reqwest::{redirect::Policy, Client};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Maximum number of redirects followed for a single fetch
const MAX_REDIRECTS: usize = 10;

/// Why a fetch attempt failed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Connection refused, reset, timed out, or the body could not be read
    #[error("transient network error: {0}")]
    Transient(String),

    /// The server answered with a 5xx status
    #[error("server error: HTTP {status}")]
    Server { status: u16 },

    /// The server answered with a 4xx status
    #[error("client error: HTTP {status}")]
    Client { status: u16 },

    /// The request could not be built or its redirects could not be followed
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl FetchError {
    /// Returns true if another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transient(_) | FetchError::Server { .. })
    }
}

/// A successfully fetched response
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
    /// URL after redirects; the base for relative links
    pub final_url: Url,
    /// Content-Type header value, if any
    pub content_type: Option<String>,
}

impl FetchedPage {
    /// Returns true unless the response declares a non-HTML content type
    ///
    /// A missing Content-Type is treated as HTML.
    pub fn is_html(&self) -> bool {
        match &self.content_type {
            None => true,
            Some(content_type) => {
                let mime = content_type
                    .split(';')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_ascii_lowercase();
                mime == "text/html" || mime == "application/xhtml+xml"
            }
        }
    }
}

/// Fetch capability
///
/// Implementations must be cheap to share between workers. Every call is
/// bounded by `timeout`.
pub trait Fetcher: Send + Sync + 'static {
    /// Fetches one URL
    fn fetch(
        &self,
        url: &NormalizedUrl,
        timeout: Duration,
    ) -> impl Future<Output = Result<FetchedPage, FetchError>> + Send;
}

impl<T: Fetcher> Fetcher for Arc<T> {
    fn fetch(
        &self,
        url: &NormalizedUrl,
        timeout: Duration,
    ) -> impl Future<Output = Result<FetchedPage, FetchError>> + Send {
        (**self).fetch(url, timeout)
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use sumi_crawl::config::UserAgentConfig;
/// use sumi_crawl::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "SumiCrawl".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetcher backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher identifying itself with `user_agent`
    pub fn new(user_agent: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(build_http_client(user_agent)?))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &NormalizedUrl,
        timeout: Duration,
    ) -> Result<FetchedPage, FetchError> {
        let response = self
            .client
            .get(url.as_str())
            .timeout(timeout)
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status();
        if status.is_server_error() {
            return Err(FetchError::Server {
                status: status.as_u16(),
            });
        }
        if status.is_client_error() {
            return Err(FetchError::Client {
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.text().await.map_err(classify_error)?;

        Ok(FetchedPage {
            status: status.as_u16(),
            body,
            final_url,
            content_type,
        })
    }
}

/// Maps a reqwest error onto the retry classification
///
/// | Condition | Result |
/// |-----------|--------|
/// | Request could not be built | `InvalidRequest` |
/// | Redirect loop or too many redirects | `InvalidRequest` |
/// | Timeout, connection failure, body error | `Transient` |
fn classify_error(error: reqwest::Error) -> FetchError {
    if error.is_builder() || error.is_redirect() {
        FetchError::InvalidRequest(error.to_string())
    } else {
        FetchError::Transient(error.to_string())
    }
}

/// Per-URL retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Fixed delay between attempts
    pub retry_delay: Duration,
    /// Bound on each attempt
    pub timeout: Duration,
}

impl RetryPolicy {
    /// Total number of attempts allowed
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl From<&CrawlerConfig> for RetryPolicy {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            max_retries: config.max_fetch_retries,
            retry_delay: config.retry_delay(),
            timeout: config.fetch_timeout(),
        }
    }
}

/// Outcome of fetching one URL, success or terminal failure
///
/// Handed from a fetch worker to a parse worker, which owns it from then on.
#[derive(Debug)]
pub struct FetchResult {
    /// The URL that was dispatched
    pub url: NormalizedUrl,
    /// The fetched page, or the error that ended the attempts
    pub outcome: Result<FetchedPage, FetchError>,
    /// Attempts made
    pub attempts: u32,
}

impl FetchResult {
    /// Lifecycle state this result moves its URL to
    pub fn state(&self) -> UrlState {
        match self.outcome {
            Ok(_) => UrlState::Completed,
            Err(_) => UrlState::Failed,
        }
    }
}

/// Fetches `url`, retrying retryable failures per `policy`
///
/// Non-retryable errors end the loop at once. Shutdown cuts the wait between
/// attempts short and stops further attempts; the last error is returned.
pub async fn fetch_with_retry<F: Fetcher>(
    fetcher: &F,
    url: NormalizedUrl,
    policy: &RetryPolicy,
    frontier: &Frontier,
) -> FetchResult {
    let max_attempts = policy.max_attempts();
    let mut attempts = 0;

    loop {
        attempts += 1;
        let error = match fetcher.fetch(&url, policy.timeout).await {
            Ok(page) => {
                return FetchResult {
                    url,
                    outcome: Ok(page),
                    attempts,
                }
            }
            Err(error) => error,
        };

        if !error.is_retryable() || attempts >= max_attempts || frontier.is_shutdown() {
            tracing::debug!(url = %url, attempt = attempts, error = %error, "Fetch failed");
            return FetchResult {
                url,
                outcome: Err(error),
                attempts,
            };
        }

        tracing::warn!(
            url = %url,
            attempt = attempts,
            max_attempts,
            error = %error,
            "Fetch failed, retrying"
        );

        tokio::select! {
            _ = tokio::time::sleep(policy.retry_delay) => {}
            _ = frontier.shutdown_signalled() => {}
        }
    }
}
