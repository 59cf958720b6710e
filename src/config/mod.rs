//! Configuration module for Promo-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! The resulting [`Config`] is assembled once at startup and handed to the
//! fetch engine and the storage pool explicitly.
//!
//! # Example
//!
//! ```no_run
//! use promo_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! for source in config.enabled_sources() {
//!     println!("will crawl {}", source.name);
//! }
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    Config, CrawlerConfig, FetchConfig, HeaderConfig, HtmlRules, JsonRules, SourceConfig,
    StorageConfig,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
