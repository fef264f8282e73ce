//! Fetch and parse worker loops
//!
//! Fetch workers take URLs from the frontier and hand [`FetchResult`]s to
//! parse workers over a bounded channel. Parse workers submit discovered
//! links, store titled pages and then retire the unit of work. Only parse
//! workers call [`Frontier::mark_complete`], and always after the page's links
//! have been submitted.

use crate::crawler::fetcher::{fetch_with_retry, FetchResult, Fetcher, RetryPolicy};
use crate::crawler::parser::PageParser;
use crate::frontier::Frontier;
use crate::output::CrawlStats;
use crate::storage::{PageRecord, PageStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

/// Receiving end of the fetch → parse handoff, shared by the parse pool
pub type HandoffReceiver = Arc<Mutex<mpsc::Receiver<FetchResult>>>;

/// Everything a fetch worker needs besides its handoff sender
pub struct FetchContext<F> {
    pub frontier: Arc<Frontier>,
    pub fetcher: Arc<F>,
    pub policy: RetryPolicy,
    pub pre_fetch_delay: Duration,
    pub stats: Arc<CrawlStats>,
}

impl<F> Clone for FetchContext<F> {
    fn clone(&self) -> Self {
        Self {
            frontier: Arc::clone(&self.frontier),
            fetcher: Arc::clone(&self.fetcher),
            policy: self.policy,
            pre_fetch_delay: self.pre_fetch_delay,
            stats: Arc::clone(&self.stats),
        }
    }
}

/// Everything a parse worker needs besides its handoff receiver
pub struct ParseContext<P, S> {
    pub frontier: Arc<Frontier>,
    pub parser: Arc<P>,
    pub store: Arc<S>,
    pub stats: Arc<CrawlStats>,
}

impl<P, S> Clone for ParseContext<P, S> {
    fn clone(&self) -> Self {
        Self {
            frontier: Arc::clone(&self.frontier),
            parser: Arc::clone(&self.parser),
            store: Arc::clone(&self.store),
            stats: Arc::clone(&self.stats),
        }
    }
}

/// Runs one fetch worker until the frontier stops handing out work
pub async fn fetch_worker<F: Fetcher>(
    id: usize,
    ctx: FetchContext<F>,
    handoff: mpsc::Sender<FetchResult>,
) {
    tracing::debug!(worker = id, "Fetch worker started");

    while let Some(url) = ctx.frontier.take().await {
        ctx.stats.record_dispatch();
        tracing::debug!(worker = id, url = %url, "Dispatched");

        if !ctx.pre_fetch_delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(ctx.pre_fetch_delay) => {}
                _ = ctx.frontier.shutdown_signalled() => break,
            }
        }

        let result = fetch_with_retry(&*ctx.fetcher, url, &ctx.policy, &ctx.frontier).await;
        ctx.stats
            .record_fetch(result.attempts, result.outcome.is_ok());

        // Blocks while the parse stage is saturated.
        tokio::select! {
            sent = handoff.send(result) => {
                if sent.is_err() {
                    tracing::debug!(worker = id, "Parse stage gone, stopping");
                    break;
                }
            }
            _ = ctx.frontier.shutdown_signalled() => break,
        }
    }

    tracing::debug!(worker = id, "Fetch worker stopped");
}

/// Runs one parse worker until shutdown or until every fetch worker is gone
pub async fn parse_worker<P, S>(id: usize, ctx: ParseContext<P, S>, handoff: HandoffReceiver)
where
    P: PageParser,
    S: PageStore + 'static,
{
    tracing::debug!(worker = id, "Parse worker started");

    loop {
        let next = {
            let mut receiver = handoff.lock().await;
            tokio::select! {
                result = receiver.recv() => result,
                _ = ctx.frontier.shutdown_signalled() => None,
            }
        };

        let Some(result) = next else {
            break;
        };

        let url = result.url.clone();
        let state = result.state();
        process_result(id, &ctx, result).await;

        ctx.frontier.mark_complete();
        tracing::debug!(worker = id, url = %url, state = %state, "Unit of work retired");
    }

    tracing::debug!(worker = id, "Parse worker stopped");
}

/// Parses, submits and stores one fetch result
///
/// Every failure is logged and absorbed; the caller retires the unit of work
/// regardless.
async fn process_result<P, S>(id: usize, ctx: &ParseContext<P, S>, result: FetchResult)
where
    P: PageParser,
    S: PageStore + 'static,
{
    let FetchResult {
        url,
        outcome,
        attempts,
    } = result;

    let page = match outcome {
        Ok(page) => page,
        Err(error) => {
            tracing::warn!(worker = id, url = %url, attempts, error = %error, "Fetch failed");
            return;
        }
    };

    if !page.is_html() {
        ctx.stats.record_non_html();
        tracing::debug!(
            worker = id,
            url = %url,
            content_type = page.content_type.as_deref().unwrap_or_default(),
            "Skipping non-HTML response"
        );
        return;
    }

    let parsed = match ctx.parser.parse(&page.body, &page.final_url) {
        Ok(parsed) => parsed,
        Err(error) => {
            ctx.stats.record_parse_failure();
            tracing::warn!(worker = id, url = %url, error = %error, "Parse failed");
            return;
        }
    };

    let discovered = parsed.links.len();
    if discovered > 0 {
        let report = ctx
            .frontier
            .submit(parsed.links, Some(&page.final_url))
            .await;
        ctx.stats.record_links(
            discovered,
            report.accepted,
            report.duplicates,
            report.malformed,
        );
        tracing::debug!(
            worker = id,
            url = %url,
            discovered,
            accepted = report.accepted,
            in_flight = ctx.frontier.in_flight(),
            "Links submitted"
        );
    }

    let Some(title) = parsed.title else {
        return;
    };

    let record = PageRecord::new(&url, title, Some(page.status));
    let store = Arc::clone(&ctx.store);
    let stored = tokio::task::spawn_blocking(move || store.store_page(&record)).await;

    match stored {
        Ok(Ok(())) => ctx.stats.record_store(true),
        Ok(Err(error)) => {
            ctx.stats.record_store(false);
            tracing::warn!(worker = id, url = %url, error = %error, "Failed to store page");
        }
        Err(error) => {
            ctx.stats.record_store(false);
            tracing::error!(worker = id, url = %url, error = %error, "Storage task failed");
        }
    }
}
