//! Page parsing: title and outgoing links
//!
//! [`PageParser`] is the parse capability the parse workers are generic
//! over; [`HtmlParser`] implements it with `scraper`.

use scraper::{Html, Selector};
use thiserror::Error;
use url::Url;

/// Why a page could not be parsed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The base URL cannot be used to resolve relative links
    #[error("base URL cannot resolve relative links: {0}")]
    InvalidBase(String),

    /// The document could not be processed
    #[error("HTML error: {0}")]
    Html(String),
}

/// What a page yielded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPage {
    /// Trimmed, non-empty `<title>` text
    pub title: Option<String>,

    /// Followable links, absolute, in document order
    pub links: Vec<String>,
}

/// Parse capability
pub trait PageParser: Send + Sync + 'static {
    /// Extracts the title and links of `body`, resolving against `base`
    fn parse(&self, body: &str, base: &Url) -> Result<ParsedPage, ParseError>;
}

/// HTML link and title extractor
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">`, including `rel="nofollow"`
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` and `data:` references
/// - Fragment-only references
/// - Anything that does not resolve to http or https
#[derive(Debug)]
pub struct HtmlParser {
    title: Selector,
    anchors: Selector,
    canonical: Selector,
}

impl HtmlParser {
    pub fn new() -> Result<Self, ParseError> {
        Ok(Self {
            title: selector("title")?,
            anchors: selector("a[href]")?,
            canonical: selector("link[rel='canonical'][href]")?,
        })
    }

    fn extract_title(&self, document: &Html) -> Option<String> {
        document
            .select(&self.title)
            .next()
            .map(|element| element.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn extract_links(&self, document: &Html, base: &Url) -> Vec<String> {
        let anchors = document
            .select(&self.anchors)
            .filter(|element| element.value().attr("download").is_none());

        anchors
            .chain(document.select(&self.canonical))
            .filter_map(|element| element.value().attr("href"))
            .filter_map(|href| resolve_link(href, base))
            .collect()
    }
}

impl PageParser for HtmlParser {
    fn parse(&self, body: &str, base: &Url) -> Result<ParsedPage, ParseError> {
        if base.cannot_be_a_base() {
            return Err(ParseError::InvalidBase(base.to_string()));
        }

        let document = Html::parse_document(body);

        Ok(ParsedPage {
            title: self.extract_title(&document),
            links: self.extract_links(&document, base),
        })
    }
}

fn selector(css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|e| ParseError::Html(format!("selector {css}: {e:?}")))
}

/// Resolves an href against `base`, or None if it should not be followed
fn resolve_link(href: &str, base: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let absolute = base.join(href).ok()?;
    matches!(absolute.scheme(), "http" | "https").then(|| absolute.to_string())
}
