//! URL handling module for Sumi-Crawl
//!
//! This module provides URL normalization, relative-link resolution and domain
//! extraction. A [`NormalizedUrl`] is the identity key the frontier uses for
//! deduplication.

mod domain;
mod normalize;

use std::fmt;
use url::Url;

pub use domain::extract_domain;
pub use normalize::{normalize_url, resolve_url};

/// Canonical form of a crawlable URL
///
/// Always HTTP(S) with a lowercase host and no fragment. Two links that
/// normalize to the same string refer to the same unit of crawl work.
/// Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedUrl(Url);

impl NormalizedUrl {
    /// Returns the canonical string form
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the underlying parsed URL
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// Returns the politeness key for this URL
    ///
    /// The lowercase host, followed by `:port` when the URL carries a
    /// non-default port.
    pub fn domain(&self) -> String {
        let host = extract_domain(&self.0).unwrap_or_default();
        match self.0.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host,
        }
    }

    pub(crate) fn from_normalized(url: Url) -> Self {
        Self(url)
    }
}

impl fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for NormalizedUrl {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
