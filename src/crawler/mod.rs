//! Crawl engine
//!
//! This module contains the moving parts of a crawl session, including:
//! - HTTP fetching with retry logic
//! - HTML parsing and link extraction
//! - The fetch and parse worker pools
//! - Termination detection and shutdown

mod coordinator;
mod fetcher;
mod parser;
mod workers;

pub use coordinator::{run_crawl, Crawler, ShutdownHandle, TerminationCoordinator};
pub use fetcher::{
    build_http_client, fetch_with_retry, FetchError, FetchResult, FetchedPage, Fetcher,
    HttpFetcher, RetryPolicy,
};
pub use parser::{HtmlParser, PageParser, ParseError, ParsedPage};
pub use workers::{fetch_worker, parse_worker, FetchContext, HandoffReceiver, ParseContext};
