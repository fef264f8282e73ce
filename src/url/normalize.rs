use crate::url::NormalizedUrl;
use crate::UrlError;
use url::Url;

/// Tracking query parameters removed during normalization
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid"];

/// Normalizes an absolute URL string
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Require an `http` or `https` scheme
/// 3. Lowercase the host (an empty host is rejected)
/// 4. Resolve dot segments; an empty path becomes `/`
/// 5. Remove the fragment
/// 6. Remove tracking query parameters and sort the remaining ones
/// 7. Remove an empty query string
///
/// # Examples
///
/// ```
/// use sumi_crawl::url::normalize_url;
///
/// let url = normalize_url("http://A.TEST/page#top").unwrap();
/// assert_eq!(url.as_str(), "http://a.test/page");
/// ```
pub fn normalize_url(url_str: &str) -> Result<NormalizedUrl, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    normalize_parsed(url)
}

/// Resolves a raw link against an optional base URL, then normalizes it
///
/// Relative references need a base; without one they fail to parse.
///
/// # Examples
///
/// ```
/// use sumi_crawl::url::resolve_url;
/// use url::Url;
///
/// let base = Url::parse("http://a.test/dir/page").unwrap();
/// let url = resolve_url("../x", Some(&base)).unwrap();
/// assert_eq!(url.as_str(), "http://a.test/x");
/// ```
pub fn resolve_url(raw: &str, base: Option<&Url>) -> Result<NormalizedUrl, UrlError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(UrlError::Malformed("empty URL".to_string()));
    }

    let url = match base {
        Some(base) => base.join(raw),
        None => Url::parse(raw),
    }
    .map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?;

    normalize_parsed(url)
}

fn normalize_parsed(mut url: Url) -> Result<NormalizedUrl, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    // The url crate lowercases hosts of special schemes already; this guards
    // against anything it passes through untouched.
    let host = match url.host_str() {
        Some(host) if !host.is_empty() => host.to_lowercase(),
        _ => return Err(UrlError::MissingDomain),
    };
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    if url.path().is_empty() {
        url.set_path("/");
    }

    url.set_fragment(None);

    if url.query().is_some() {
        let original: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let filtered = filter_and_sort_query_params(&original);

        if filtered.is_empty() {
            url.set_query(None);
        } else if filtered != original {
            url.query_pairs_mut().clear().extend_pairs(filtered);
        }
    }

    Ok(NormalizedUrl::from_normalized(url))
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(params: &[(String, String)]) -> Vec<(String, String)> {
    let mut kept: Vec<(String, String)> = params
        .iter()
        .filter(|(key, _)| !is_tracking_param(key))
        .cloned()
        .collect();

    kept.sort_by(|a, b| a.0.cmp(&b.0));
    kept
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
