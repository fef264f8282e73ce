//! Crawl frontier: work queue, visited set and in-flight accounting
//!
//! The [`Frontier`] is the only shared mutable state of a crawl session. All
//! mutation goes through four operations:
//!
//! - [`Frontier::submit`] normalizes and deduplicates URLs, counts each new
//!   one as in flight and queues it, blocking while the queue is full
//! - [`Frontier::take`] hands out the next URL whose domain is polite to
//!   dispatch to, or `None` once the frontier is closed or shut down
//! - [`Frontier::mark_complete`] retires one unit of work; the frontier closes
//!   when nothing is in flight and the queue is empty
//! - [`Frontier::force_shutdown`] stops everything
//!
//! The queue, visited set and in-flight counter live under one mutex. The
//! domain clock has its own lock but is only consulted while that mutex is
//! held, so dispatch decisions are serialized with queue changes.

mod politeness;

pub use politeness::PolitenessTracker;

use crate::config::CrawlerConfig;
use crate::url::{resolve_url, NormalizedUrl};
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use url::Url;

/// How long a submitter may wait for queue space before it is logged
const BLOCKED_SUBMIT_WARNING: Duration = Duration::from_secs(5);

/// Frontier tuning
#[derive(Debug, Clone)]
pub struct FrontierConfig {
    /// Maximum number of URLs waiting in the work queue
    pub queue_capacity: usize,

    /// Minimum time between two dispatches to the same domain
    pub crawl_delay: Duration,

    /// Shortest sleep when every queued domain is throttled
    pub min_backoff: Duration,

    /// Longest sleep when every queued domain is throttled
    pub max_backoff: Duration,

    /// Maximum number of queued URLs inspected per dispatch attempt
    pub scan_limit: usize,
}

impl FrontierConfig {
    pub fn new(queue_capacity: usize, crawl_delay: Duration) -> Self {
        Self {
            queue_capacity,
            crawl_delay,
            min_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(250),
            scan_limit: 1024,
        }
    }
}

impl From<&CrawlerConfig> for FrontierConfig {
    fn from(config: &CrawlerConfig) -> Self {
        Self::new(config.queue_capacity, config.crawl_delay())
    }
}

/// Outcome of a single non-blocking dispatch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// A URL is ready to fetch; its domain clock has been updated
    Ready(NormalizedUrl),

    /// URLs are queued but none of their domains is dispatchable yet; the
    /// duration is the wait until the earliest one is
    Throttled(Duration),

    /// Nothing queued, but work is still in flight and more may arrive
    Empty,

    /// The frontier is closed or shut down; no more work will be handed out
    Closed,
}

/// Per-call accounting for [`Frontier::submit`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SubmitReport {
    /// New URLs queued and counted as in flight
    pub accepted: usize,

    /// URLs already in the visited set
    pub duplicates: usize,

    /// URLs that failed to resolve or normalize
    pub malformed: usize,

    /// URLs not considered because the frontier shut down or closed
    pub rejected: usize,
}

enum Enqueue {
    Accepted,
    Duplicate,
    Rejected,
}

#[derive(Debug, Default)]
struct FrontierState {
    queue: VecDeque<NormalizedUrl>,
    visited: HashSet<NormalizedUrl>,
    in_flight: usize,
    closed: bool,
}

/// Shared work queue, dedup set and in-flight counter of one crawl session
#[derive(Debug)]
pub struct Frontier {
    state: Mutex<FrontierState>,
    politeness: PolitenessTracker,
    config: FrontierConfig,
    work_available: Notify,
    space_available: Notify,
    shutdown: CancellationToken,
    closed: CancellationToken,
}

impl Frontier {
    /// Creates an empty frontier
    pub fn new(config: FrontierConfig) -> Self {
        Self {
            state: Mutex::new(FrontierState::default()),
            politeness: PolitenessTracker::new(),
            config,
            work_available: Notify::new(),
            space_available: Notify::new(),
            shutdown: CancellationToken::new(),
            closed: CancellationToken::new(),
        }
    }

    /// Submits raw URLs, resolving relative ones against `base`
    ///
    /// Malformed URLs are logged and dropped. Every URL not seen before in
    /// this session is added to the visited set, counted as in flight and
    /// queued, in that order and under one lock. When the queue is full the
    /// call waits for space; shutdown releases it. Once the frontier is shut
    /// down or closed the call changes nothing.
    ///
    /// # Example
    ///
    /// ```
    /// use sumi_crawl::frontier::{Frontier, FrontierConfig};
    /// use std::time::Duration;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let frontier = Frontier::new(FrontierConfig::new(16, Duration::ZERO));
    /// let report = frontier
    ///     .submit(["http://a.test/", "http://a.test/#top", "::bad::"], None)
    ///     .await;
    /// assert_eq!(report.accepted, 1);
    /// assert_eq!(report.duplicates, 1);
    /// assert_eq!(report.malformed, 1);
    /// assert_eq!(frontier.in_flight(), 1);
    /// # }
    /// ```
    pub async fn submit<I, S>(&self, urls: I, base: Option<&Url>) -> SubmitReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut report = SubmitReport::default();

        let mut candidates = Vec::new();
        for raw in urls {
            let raw = raw.as_ref();
            match resolve_url(raw, base) {
                Ok(url) => candidates.push(url),
                Err(e) => {
                    report.malformed += 1;
                    tracing::warn!(url = raw, error = %e, "Dropping malformed URL");
                }
            }
        }

        let total = candidates.len();
        for (index, url) in candidates.into_iter().enumerate() {
            match self.enqueue(url).await {
                Enqueue::Accepted => report.accepted += 1,
                Enqueue::Duplicate => report.duplicates += 1,
                Enqueue::Rejected => {
                    report.rejected = total - index;
                    break;
                }
            }
        }

        report
    }

    async fn enqueue(&self, url: NormalizedUrl) -> Enqueue {
        let mut blocked_since: Option<Instant> = None;
        let mut warned = false;

        loop {
            let space = self.space_available.notified();
            tokio::pin!(space);
            space.as_mut().enable();

            {
                let mut state = self.lock();
                if self.shutdown.is_cancelled() || state.closed {
                    return Enqueue::Rejected;
                }
                if state.visited.contains(&url) {
                    tracing::trace!(url = %url, "Skipping already visited URL");
                    return Enqueue::Duplicate;
                }
                if state.queue.len() < self.config.queue_capacity {
                    state.visited.insert(url.clone());
                    state.in_flight += 1;
                    tracing::debug!(url = %url, in_flight = state.in_flight, "Queued URL");
                    state.queue.push_back(url);
                    drop(state);
                    self.work_available.notify_one();
                    return Enqueue::Accepted;
                }
            }

            let since = *blocked_since.get_or_insert_with(Instant::now);
            if !warned && since.elapsed() >= BLOCKED_SUBMIT_WARNING {
                warned = true;
                tracing::warn!(
                    url = %url,
                    capacity = self.config.queue_capacity,
                    "Work queue full, submitter still waiting for space"
                );
            }

            tokio::select! {
                _ = &mut space => {}
                _ = self.shutdown.cancelled() => {}
                _ = tokio::time::sleep(BLOCKED_SUBMIT_WARNING) => {}
            }
        }
    }

    /// Attempts one dispatch without waiting
    ///
    /// Scans the queue front to back and removes the first URL whose domain
    /// may be dispatched to now, recording the dispatch. URLs it passes over
    /// keep their place in the queue.
    pub fn try_take(&self) -> Dispatch {
        let mut state = self.lock();
        if self.shutdown.is_cancelled() || state.closed {
            return Dispatch::Closed;
        }
        if state.queue.is_empty() {
            return Dispatch::Empty;
        }

        let now = Instant::now();
        let delay = self.config.crawl_delay;
        let mut throttled: HashSet<String> = HashSet::new();
        let mut earliest: Option<Duration> = None;
        let mut ready = None;

        for (index, url) in state.queue.iter().take(self.config.scan_limit).enumerate() {
            let domain = url.domain();
            if throttled.contains(&domain) {
                continue;
            }
            if self.politeness.try_dispatch(&domain, delay, now) {
                ready = Some(index);
                break;
            }
            if let Some(wait) = self.politeness.time_until_dispatch(&domain, delay, now) {
                earliest = Some(earliest.map_or(wait, |e| e.min(wait)));
            }
            tracing::trace!(domain = %domain, "Domain not yet dispatchable");
            throttled.insert(domain);
        }

        match ready.and_then(|index| state.queue.remove(index)) {
            Some(url) => {
                tracing::debug!(url = %url, queued = state.queue.len(), "Dispatching URL");
                drop(state);
                self.space_available.notify_waiters();
                Dispatch::Ready(url)
            }
            None => Dispatch::Throttled(earliest.unwrap_or(self.config.min_backoff)),
        }
    }

    /// Waits for the next dispatchable URL
    ///
    /// Returns `None` once the frontier has closed or shut down. While every
    /// queued domain is throttled the caller sleeps for a short, clamped
    /// backoff and polls again instead of spinning.
    pub async fn take(&self) -> Option<NormalizedUrl> {
        loop {
            let work = self.work_available.notified();
            tokio::pin!(work);
            work.as_mut().enable();

            match self.try_take() {
                Dispatch::Ready(url) => return Some(url),
                Dispatch::Closed => return None,
                Dispatch::Empty => {
                    tokio::select! {
                        _ = &mut work => {}
                        _ = self.shutdown.cancelled() => {}
                        _ = self.closed.cancelled() => {}
                    }
                }
                Dispatch::Throttled(wait) => {
                    let backoff = wait.max(self.config.min_backoff).min(self.config.max_backoff);
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = self.shutdown.cancelled() => {}
                        _ = self.closed.cancelled() => {}
                    }
                }
            }
        }
    }

    /// Retires one unit of work
    ///
    /// Call exactly once per dispatched URL, after the links it produced have
    /// been submitted. When the in-flight count drops to zero with an empty
    /// queue and no shutdown in effect, the frontier closes; this happens at
    /// most once per session.
    pub fn mark_complete(&self) {
        let mut state = self.lock();
        if state.in_flight == 0 {
            tracing::error!("mark_complete called with no work in flight");
            return;
        }
        state.in_flight -= 1;
        tracing::trace!(in_flight = state.in_flight, "Unit of work complete");
        self.close_when_drained(state);
    }

    /// Closes the frontier if nothing was ever accepted or everything is done
    ///
    /// Returns true if the frontier is closed after the call.
    pub fn close_if_drained(&self) -> bool {
        let state = self.lock();
        self.close_when_drained(state)
    }

    /// Submits the seeds of a session, holding the frontier open meanwhile
    ///
    /// A placeholder unit stays in flight until the last seed is queued, so
    /// workers that finish early seeds cannot close the frontier while later
    /// seeds still wait for queue space. Retiring the placeholder closes a
    /// session in which no seed was accepted.
    pub async fn submit_seeds<I, S>(&self, urls: I) -> SubmitReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let held = self.hold();
        let report = self.submit(urls, None).await;
        if held {
            self.mark_complete();
        }
        report
    }

    fn hold(&self) -> bool {
        let mut state = self.lock();
        if state.closed || self.shutdown.is_cancelled() {
            return false;
        }
        state.in_flight += 1;
        true
    }

    // Returns whether the frontier is closed once the guard is released.
    fn close_when_drained(&self, mut state: MutexGuard<'_, FrontierState>) -> bool {
        if state.closed {
            return true;
        }
        if self.shutdown.is_cancelled() || state.in_flight > 0 || !state.queue.is_empty() {
            return false;
        }

        state.closed = true;
        let visited = state.visited.len();
        drop(state);
        tracing::info!(visited, "Frontier drained, closing");
        self.closed.cancel();
        true
    }

    /// Sets the shutdown flag and releases every blocked caller
    ///
    /// Idempotent; calling it after natural completion has no further effect.
    pub fn force_shutdown(&self) {
        let state = self.lock();
        if self.shutdown.is_cancelled() {
            return;
        }
        self.shutdown.cancel();
        tracing::info!(
            in_flight = state.in_flight,
            queued = state.queue.len(),
            closed = state.closed,
            "Frontier shutdown"
        );
    }

    /// Resolves once the frontier has closed after draining
    ///
    /// Never resolves for a session that ends by forced shutdown.
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }

    /// Resolves once shutdown has been signalled
    pub async fn shutdown_signalled(&self) {
        self.shutdown.cancelled().await
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// URLs accepted but not yet reported complete
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    /// URLs waiting in the work queue
    pub fn queued(&self) -> usize {
        self.lock().queue.len()
    }

    /// Distinct URLs accepted this session
    pub fn visited(&self) -> usize {
        self.lock().visited.len()
    }

    pub fn config(&self) -> &FrontierConfig {
        &self.config
    }

    pub fn politeness(&self) -> &PolitenessTracker {
        &self.politeness
    }

    // Every critical section leaves the state consistent, so a poisoned lock
    // is recovered rather than propagated into worker tasks.
    fn lock(&self) -> MutexGuard<'_, FrontierState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
