//! Per-domain politeness bookkeeping
//!
//! The tracker remembers when each domain was last dispatched to and answers
//! whether it may be dispatched to again. The check and the record happen
//! under one lock in [`PolitenessTracker::try_dispatch`], so two workers can
//! never both pass the check for the same domain inside one delay window.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Domain → last-dispatch timestamp
#[derive(Debug, Default)]
pub struct PolitenessTracker {
    clock: Mutex<HashMap<String, Instant>>,
}

impl PolitenessTracker {
    /// Creates an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `domain` may be dispatched to at `now`
    ///
    /// True when the domain was never dispatched to, or at least `min_delay`
    /// has passed since the last dispatch.
    pub fn can_dispatch(&self, domain: &str, min_delay: Duration, now: Instant) -> bool {
        can_dispatch_at(&self.lock(), domain, min_delay, now)
    }

    /// Records a dispatch to `domain` at `now`, unconditionally
    pub fn record_dispatch(&self, domain: &str, now: Instant) {
        self.lock().insert(domain.to_string(), now);
    }

    /// Atomically checks and records a dispatch
    ///
    /// Returns true and records `now` if the domain is dispatchable; returns
    /// false and leaves the clock untouched otherwise.
    pub fn try_dispatch(&self, domain: &str, min_delay: Duration, now: Instant) -> bool {
        let mut clock = self.lock();
        if !can_dispatch_at(&clock, domain, min_delay, now) {
            return false;
        }
        clock.insert(domain.to_string(), now);
        true
    }

    /// Time left until `domain` becomes dispatchable, or None if it already is
    pub fn time_until_dispatch(
        &self,
        domain: &str,
        min_delay: Duration,
        now: Instant,
    ) -> Option<Duration> {
        let clock = self.lock();
        let last = clock.get(domain)?;
        let elapsed = now.saturating_duration_since(*last);
        (elapsed < min_delay).then(|| min_delay - elapsed)
    }

    /// Last recorded dispatch to `domain`
    pub fn last_dispatch(&self, domain: &str) -> Option<Instant> {
        self.lock().get(domain).copied()
    }

    /// Number of domains dispatched to so far
    pub fn domain_count(&self) -> usize {
        self.lock().len()
    }

    // A poisoned clock only means a holder panicked between two plain map
    // operations; the map itself is still consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Instant>> {
        self.clock.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn can_dispatch_at(
    clock: &HashMap<String, Instant>,
    domain: &str,
    min_delay: Duration,
    now: Instant,
) -> bool {
    match clock.get(domain) {
        None => true,
        Some(last) => now.saturating_duration_since(*last) >= min_delay,
    }
}
