//! Crawl session: worker pools, termination and shutdown
//!
//! A [`Crawler`] owns one [`Frontier`] and runs one session over it:
//!
//! 1. Spawn the termination coordinator
//! 2. Spawn the fetch and parse pools, joined by a bounded handoff channel
//! 3. Submit the seeds; close at once if none was accepted
//! 4. Wait for the coordinator to observe completion or shutdown
//! 5. Broadcast shutdown and join every worker
//! 6. Return a [`CrawlSummary`]

use crate::config::{pipeline_sizing_warning, validate, Config, CrawlerConfig};
use crate::crawler::fetcher::{Fetcher, HttpFetcher, RetryPolicy};
use crate::crawler::parser::{HtmlParser, PageParser};
use crate::crawler::workers::{fetch_worker, parse_worker, FetchContext, ParseContext};
use crate::frontier::{Frontier, FrontierConfig};
use crate::output::{CrawlStats, CrawlSummary, Termination};
use crate::storage::{open_storage, PageStore};
use crate::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;

/// Waits for the frontier to close, then broadcasts shutdown
#[derive(Debug, Clone)]
pub struct TerminationCoordinator {
    frontier: Arc<Frontier>,
}

impl TerminationCoordinator {
    pub fn new(frontier: Arc<Frontier>) -> Self {
        Self { frontier }
    }

    /// Blocks until the frontier closes or shutdown is forced
    ///
    /// Either way every pool is released before this returns. A frontier
    /// that closed is reported as completed even if an interrupt raced it.
    pub async fn run(self) -> Termination {
        let termination = tokio::select! {
            biased;
            _ = self.frontier.closed() => Termination::Completed,
            _ = self.frontier.shutdown_signalled() => Termination::Interrupted,
        };

        tracing::info!(%termination, "Crawl finished, stopping workers");
        self.frontier.force_shutdown();
        termination
    }
}

/// Cloneable handle for stopping a running session from outside
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    frontier: Arc<Frontier>,
}

impl ShutdownHandle {
    /// Forces shutdown; safe to call any number of times
    pub fn shutdown(&self) {
        self.frontier.force_shutdown();
    }

    pub fn is_shutdown(&self) -> bool {
        self.frontier.is_shutdown()
    }
}

/// One crawl session over injected fetch, parse and store capabilities
pub struct Crawler<F, P, S> {
    config: CrawlerConfig,
    frontier: Arc<Frontier>,
    fetcher: Arc<F>,
    parser: Arc<P>,
    store: Arc<S>,
    stats: Arc<CrawlStats>,
}

impl<F, P, S> Crawler<F, P, S>
where
    F: Fetcher,
    P: PageParser,
    S: PageStore + 'static,
{
    pub fn new(config: CrawlerConfig, fetcher: F, parser: P, store: S) -> Self {
        let frontier = Arc::new(Frontier::new(FrontierConfig::from(&config)));
        Self {
            config,
            frontier,
            fetcher: Arc::new(fetcher),
            parser: Arc::new(parser),
            store: Arc::new(store),
            stats: Arc::new(CrawlStats::new()),
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            frontier: Arc::clone(&self.frontier),
        }
    }

    pub fn frontier(&self) -> &Arc<Frontier> {
        &self.frontier
    }

    /// Runs the session to completion or shutdown
    ///
    /// Per-URL failures never surface here; an error means a worker task
    /// panicked, and the remaining workers are stopped before it is returned.
    pub async fn run<I, T>(self, seeds: I) -> Result<CrawlSummary>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let started = Instant::now();
        let started_at = chrono::Utc::now().to_rfc3339();

        tracing::info!(
            fetch_workers = self.config.fetch_workers,
            parse_workers = self.config.parse_workers,
            queue_capacity = self.config.queue_capacity,
            crawl_delay_ms = self.config.crawl_delay_ms,
            "Starting crawl"
        );
        if let Some(warning) = pipeline_sizing_warning(&self.config) {
            tracing::warn!("{}", warning);
        }

        let coordinator = TerminationCoordinator::new(Arc::clone(&self.frontier));
        let mut coordinator = tokio::spawn(coordinator.run());
        let mut workers = self.spawn_workers();

        let report = self.frontier.submit_seeds(seeds).await;
        tracing::info!(
            accepted = report.accepted,
            duplicates = report.duplicates,
            malformed = report.malformed,
            "Seeds submitted"
        );
        if report.accepted == 0 {
            tracing::warn!("No seed was accepted, nothing to crawl");
        }

        let termination = loop {
            tokio::select! {
                finished = &mut coordinator => break finished?,
                Some(joined) = workers.join_next() => {
                    if let Err(error) = joined {
                        tracing::error!(error = %error, "Worker task failed, shutting down");
                        self.frontier.force_shutdown();
                        workers.shutdown().await;
                        return Err(error.into());
                    }
                }
            }
        };

        while let Some(joined) = workers.join_next().await {
            joined?;
        }

        let summary = CrawlSummary {
            termination,
            started_at,
            finished_at: chrono::Utc::now().to_rfc3339(),
            elapsed: started.elapsed(),
            urls_visited: self.frontier.visited(),
            stats: self.stats.snapshot(),
        };

        tracing::info!(
            %termination,
            urls_visited = summary.urls_visited,
            pages_stored = summary.stats.pages_stored,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Crawl session ended"
        );

        Ok(summary)
    }

    fn spawn_workers(&self) -> JoinSet<()> {
        let mut workers = JoinSet::new();
        let (sender, receiver) = mpsc::channel(self.config.handoff_capacity);
        let receiver = Arc::new(Mutex::new(receiver));

        let fetch_ctx = FetchContext {
            frontier: Arc::clone(&self.frontier),
            fetcher: Arc::clone(&self.fetcher),
            policy: RetryPolicy::from(&self.config),
            pre_fetch_delay: self.config.pre_fetch_delay(),
            stats: Arc::clone(&self.stats),
        };
        for id in 0..self.config.fetch_workers {
            workers.spawn(fetch_worker(id, fetch_ctx.clone(), sender.clone()));
        }

        let parse_ctx = ParseContext {
            frontier: Arc::clone(&self.frontier),
            parser: Arc::clone(&self.parser),
            store: Arc::clone(&self.store),
            stats: Arc::clone(&self.stats),
        };
        for id in 0..self.config.parse_workers {
            workers.spawn(parse_worker(id, parse_ctx.clone(), Arc::clone(&receiver)));
        }

        workers
    }
}

/// Runs a complete crawl from configuration
///
/// Opens the database, builds the HTTP client and HTML parser, and runs one
/// session over the configured seeds. Ctrl-C forces shutdown.
///
/// # Example
///
/// ```no_run
/// use sumi_crawl::config::load_config;
/// use sumi_crawl::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("config.toml"))?;
/// let summary = run_crawl(config).await?;
/// println!("{} pages stored", summary.stats.pages_stored);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: Config) -> Result<CrawlSummary> {
    validate(&config)?;

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let fetcher = HttpFetcher::new(&config.user_agent)?;
    let parser = HtmlParser::new()?;

    let seeds = config.crawler.seeds.clone();
    let crawler = Crawler::new(config.crawler, fetcher, parser, storage);

    let handle = crawler.shutdown_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, shutting down");
            handle.shutdown();
        }
    });

    let summary = crawler.run(seeds).await;
    interrupt.abort();
    summary
}
