use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for Promo-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    pub storage: StorageConfig,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Sources that will run as jobs
    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }
}

/// Pagination limits applied to every job
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Hard ceiling on pages fetched per job, whatever the adapter reports
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Wall-clock budget for one job, retries and politeness delays included
    #[serde(rename = "job-deadline-secs", default = "default_job_deadline_secs")]
    pub job_deadline_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            job_deadline_secs: default_job_deadline_secs(),
        }
    }
}

/// HTTP behaviour of the fetch engine
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Retries after the first attempt for timeouts and connection failures
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff step; doubled on every further retry
    #[serde(rename = "backoff-base-ms", default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Minimum pause between two requests of the same source (milliseconds)
    #[serde(rename = "request-delay-ms", default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Upper bound of the extra pause added to the delay
    #[serde(rename = "delay-jitter-ms", default = "default_delay_jitter_ms")]
    pub delay_jitter_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            request_delay_ms: default_request_delay_ms(),
            delay_jitter_ms: default_delay_jitter_ms(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Maximum number of open connections shared by all jobs
    #[serde(rename = "pool-size", default = "default_pool_size")]
    pub pool_size: u32,

    /// Retries for an insert or commit that hits a busy/locked database
    #[serde(rename = "insert-retries", default = "default_insert_retries")]
    pub insert_retries: u32,
}

/// One crawl source
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Source identifier, also used as the job name
    pub name: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Built-in rule set (`franprix`, `monoprix`, `carrefour`)
    #[serde(default)]
    pub preset: Option<String>,

    /// First listing page; falls back to the preset's start URL
    #[serde(rename = "start-url", default)]
    pub start_url: Option<String>,

    #[serde(default)]
    pub headers: HeaderConfig,

    /// Case-insensitive body fragments that identify an anti-bot page
    #[serde(rename = "challenge-markers", default)]
    pub challenge_markers: Vec<String>,

    /// Explicit HTML extraction rules, overriding the preset
    #[serde(default)]
    pub html: Option<HtmlRules>,

    /// Explicit JSON extraction rules, overriding the preset
    #[serde(default)]
    pub json: Option<JsonRules>,
}

/// Request headers sent with every request of a source
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HeaderConfig {
    #[serde(rename = "user-agent", default)]
    pub user_agent: Option<String>,

    #[serde(default)]
    pub referer: Option<String>,

    #[serde(default)]
    pub accept: Option<String>,

    #[serde(rename = "accept-language", default)]
    pub accept_language: Option<String>,

    /// Any further headers, sent verbatim
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

/// CSS-selector rules for an HTML listing with `?page=N` pagination
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HtmlRules {
    /// Selector matching one listing entry
    pub entry: String,

    /// Required product name, relative to the entry
    pub name: String,

    /// Shared list of detail spans read positionally
    #[serde(default)]
    pub details: Option<String>,

    #[serde(rename = "brand-index", default)]
    pub brand_index: Option<usize>,

    #[serde(rename = "size-index", default)]
    pub size_index: Option<usize>,

    /// Price fragments, concatenated in document order
    #[serde(default)]
    pub price: Option<String>,

    /// `<amount>/<label>` unit price text
    #[serde(rename = "unit-price", default)]
    pub unit_price: Option<String>,

    #[serde(default)]
    pub promo: Option<String>,

    /// Query parameter carrying the page number; absent means single page
    #[serde(rename = "page-param", default)]
    pub page_param: Option<String>,
}

/// JSON-pointer rules for a token-paginated JSON API
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JsonRules {
    /// Pointer to the record collection (object or array)
    pub records: String,

    /// Pointer to the name, relative to one record
    pub name: String,

    #[serde(default)]
    pub brand: Option<String>,

    #[serde(default)]
    pub price: Option<String>,

    #[serde(rename = "unit-price", default)]
    pub unit_price: Option<String>,

    #[serde(rename = "unit-label", default)]
    pub unit_label: Option<String>,

    #[serde(default)]
    pub size: Option<String>,

    #[serde(default)]
    pub promo: Option<String>,

    /// Pointer to the continuation token in the response envelope
    #[serde(rename = "next-token", default)]
    pub next_token: Option<String>,

    /// Query parameter the token is sent back in
    #[serde(rename = "token-param", default = "default_token_param")]
    pub token_param: String,
}

fn default_max_pages() -> u32 {
    500
}

fn default_job_deadline_secs() -> u64 {
    1800
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_request_delay_ms() -> u64 {
    1000
}

fn default_delay_jitter_ms() -> u64 {
    500
}

fn default_pool_size() -> u32 {
    4
}

fn default_insert_retries() -> u32 {
    3
}

fn default_enabled() -> bool {
    true
}

pub(crate) fn default_token_param() -> String {
    "pageToken".to_string()
}
