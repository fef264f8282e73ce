/// Lifecycle state definitions for a normalized URL
use std::fmt;

/// Represents where a URL is in the crawl lifecycle
///
/// ```text
/// New -> Enqueued -> InFlight -> Completed
///                             -> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlState {
    /// Seen as a link but not yet accepted by the frontier
    New,

    /// Accepted by the frontier and waiting in the work queue
    Enqueued,

    /// Dispatched to a fetch worker; its unit of work is not yet complete
    InFlight,

    /// Fetched and parsed, with discovered links folded back into the frontier
    Completed,

    /// Fetch or extraction failed terminally; still counted as complete work
    Failed,
}

impl UrlState {
    /// Short lowercase name used in log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Enqueued => "enqueued",
            Self::InFlight => "in_flight",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for UrlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
