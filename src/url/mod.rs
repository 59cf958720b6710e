//! URL handling for listing pages
//!
//! Normalization gives every listing page a stable identity for the
//! pagination cycle guard; the query helpers read and rewrite the page and
//! token parameters that drive pagination.

mod normalize;

pub use normalize::{normalize_parsed, normalize_url};

use url::Url;

/// Returns a stable identifier for a page URL
///
/// Falls back to the raw URL text when the URL cannot be normalized, which
/// only happens for non-HTTP schemes.
pub fn page_identifier(url: &Url) -> String {
    normalize_parsed(url.clone())
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

/// Reads the first value of a query parameter
pub fn query_param(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Returns a copy of `url` with `key` set to `value`, replacing any previous value
pub fn with_query_param(url: &Url, key: &str, value: &str) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut next = url.clone();
    next.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(key, value);
    next
}
