//! Site adapters: per-source extraction and pagination rules
//!
//! An adapter knows how to build the first request of a source, how to pull
//! raw listing entries out of a fetched page and how to find the next page.
//! It never performs I/O itself; the pagination controller hands it pages
//! fetched by the fetch engine.
//!
//! Two generic adapters cover every source: [`HtmlListingAdapter`] (CSS
//! selectors, `?page=N` pagination) and [`JsonCatalogAdapter`] (JSON pointers,
//! continuation tokens). Built-in presets supply the rules for known sites.

mod html;
mod json;
mod presets;

pub use html::HtmlListingAdapter;
pub use json::JsonCatalogAdapter;
pub use presets::{preset_names, DEFAULT_CHALLENGE_MARKERS, DEFAULT_USER_AGENT};

use crate::config::{HeaderConfig, HtmlRules, JsonRules, SourceConfig};
use crate::crawler::FetchedPage;
use crate::state::CrawlJob;
use crate::url::page_identifier;
use crate::{ConfigError, ExtractionError};
use url::Url;

/// A page request built by an adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: Url,

    /// 1-based page ordinal within the job
    pub page: u32,

    /// Continuation token, for token-paginated sources
    pub cursor: Option<String>,
}

impl Request {
    pub fn first(url: Url) -> Self {
        Self {
            url,
            page: 1,
            cursor: None,
        }
    }

    /// Identity used by the cycle guard: the token when present,
    /// otherwise the normalized URL
    pub fn identifier(&self) -> String {
        match &self.cursor {
            Some(token) => token.clone(),
            None => page_identifier(&self.url),
        }
    }
}

/// Fields read from one listing entry, all still raw text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    /// Position of the entry on its page
    pub entry: usize,
    pub page: u32,
    pub source_url: String,
    pub name: Option<String>,
    pub brand: Option<String>,
    pub price_text: Option<String>,
    pub unit_price_text: Option<String>,
    pub unit_label: Option<String>,
    pub size: Option<String>,
    pub promo: Option<String>,
}

/// Per-source extraction and pagination behaviour
pub trait SiteAdapter: Send + Sync {
    /// Source name, as configured
    fn source(&self) -> &str;

    fn initial_request(&self) -> Request;

    /// One result per listing entry; a failed entry never hides the others
    fn extract(&self, page: &FetchedPage) -> Vec<Result<RawRecord, ExtractionError>>;

    /// The request for the page after `page`, or `None` when there is none
    fn next_request(&self, page: &FetchedPage, job: &CrawlJob) -> Option<Request>;
}

/// Rule set resolved from a preset or from explicit configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rules {
    Html(HtmlRules),
    Json(JsonRules),
}

/// Builds the adapter for a source
///
/// Explicit `html`/`json` rules override the preset's; an explicit
/// `start-url` overrides the preset's start URL.
pub fn build_adapter(source: &SourceConfig) -> Result<Box<dyn SiteAdapter>, ConfigError> {
    let preset = match source.preset.as_deref() {
        Some(name) => {
            Some(presets::lookup(name).ok_or_else(|| ConfigError::UnknownPreset(name.to_string()))?)
        }
        None => None,
    };

    let rules = match (&source.html, &source.json, &preset) {
        (Some(html), _, _) => Rules::Html(html.clone()),
        (None, Some(json), _) => Rules::Json(json.clone()),
        (None, None, Some(preset)) => preset.rules.clone(),
        (None, None, None) => {
            return Err(ConfigError::Validation(format!(
                "source '{}' needs a preset or html/json rules",
                source.name
            )))
        }
    };

    let start = source
        .start_url
        .as_deref()
        .or(preset.as_ref().map(|p| p.start_url))
        .ok_or_else(|| {
            ConfigError::Validation(format!("source '{}' has no start-url", source.name))
        })?;
    let start_url = parse_start_url(start)?;

    Ok(match rules {
        Rules::Html(rules) => Box::new(HtmlListingAdapter::new(&source.name, start_url, rules)?),
        Rules::Json(rules) => Box::new(JsonCatalogAdapter::new(&source.name, start_url, rules)?),
    })
}

/// Headers for a source: configured values first, then preset defaults
pub fn source_headers(source: &SourceConfig) -> HeaderConfig {
    let preset = source.preset.as_deref().and_then(presets::lookup);
    let mut headers = source.headers.clone();

    if headers.user_agent.is_none() {
        headers.user_agent = Some(DEFAULT_USER_AGENT.to_string());
    }
    if let Some(preset) = preset {
        if headers.referer.is_none() {
            headers.referer = preset.referer.map(String::from);
        }
        if headers.accept.is_none() {
            headers.accept = preset.accept.map(String::from);
        }
        if headers.accept_language.is_none() {
            headers.accept_language = Some(presets::DEFAULT_ACCEPT_LANGUAGE.to_string());
        }
    }
    headers
}

/// Challenge markers for a source: the defaults plus any configured ones, lowercased
pub fn challenge_markers(source: &SourceConfig) -> Vec<String> {
    DEFAULT_CHALLENGE_MARKERS
        .iter()
        .map(|m| m.to_string())
        .chain(source.challenge_markers.iter().cloned())
        .map(|m| m.to_lowercase())
        .filter(|m| !m.trim().is_empty())
        .collect()
}

/// Splits `"<amount>/<label>"` on the first `/`
///
/// Text without a `/` yields both parts absent.
pub fn split_unit_price(text: &str) -> (Option<String>, Option<String>) {
    match text.split_once('/') {
        Some((amount, label)) => (non_blank(amount), non_blank(label)),
        None => (None, None),
    }
}

fn non_blank(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn parse_start_url(text: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(text).map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", text, e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{}: only http and https are supported",
            text
        )));
    }
    Ok(url)
}
