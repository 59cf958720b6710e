//! Promo-Harvest: a promotional listing harvester for grocery retail sites
//!
//! This crate crawls per-source promotion listings, extracts product entries,
//! normalizes them into one canonical record shape and loads them into SQLite.

pub mod adapters;
pub mod config;
pub mod crawler;
pub mod output;
pub mod record;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Promo-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] storage::PersistenceError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid job state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::JobState,
        to: state::JobState,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Invalid JSON pointer: {0}")]
    InvalidPointer(String),

    #[error("Unknown preset '{0}'")]
    UnknownPreset(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

/// Transport-level failure of a single page request
///
/// Every variant is terminal for the request that produced it: transient
/// conditions have already been retried by the fetcher before one of these
/// is returned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request timed out after {attempts} attempt(s)")]
    Timeout { attempts: u32 },

    #[error("connection failed after {attempts} attempt(s): {message}")]
    Connection { attempts: u32, message: String },

    #[error("HTTP {status}")]
    Status { status: u16 },

    #[error("anti-bot challenge detected (HTTP {status}, marker '{marker}')")]
    Challenge { status: u16, marker: String },

    #[error("job deadline exceeded")]
    DeadlineExceeded,

    #[error("transport error: {0}")]
    Transport(String),
}

/// A single listing entry could not be read
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("entry {entry}: missing required field '{field}'")]
    MissingField { entry: usize, field: &'static str },

    #[error("entry {entry}: {message}")]
    Malformed { entry: usize, message: String },

    #[error("response body could not be decoded: {0}")]
    Decode(String),
}

/// A normalized record violates the canonical record invariants
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("name is missing or blank")]
    MissingName,

    #[error("{field} value '{value}' is out of range")]
    OutOfRange { field: &'static str, value: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Promo-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

// Re-export commonly used types
pub use adapters::{build_adapter, RawRecord, Request, SiteAdapter};
pub use config::Config;
pub use record::{normalize, Price, ProductRecord};
pub use state::{CrawlJob, JobState};
