//! State module for tracking crawl progress
//!
//! The frontier does not store a state per URL; [`UrlState`] names the
//! lifecycle each accepted URL moves through so workers and statistics can
//! talk about it consistently.

mod url_state;

pub use url_state::UrlState;
