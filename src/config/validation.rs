use crate::adapters::build_adapter;
use crate::config::types::{Config, CrawlerConfig, FetchConfig, SourceConfig, StorageConfig};
use crate::crawler::build_headers;
use crate::ConfigError;
use std::collections::HashSet;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_fetch_config(&config.fetch)?;
    validate_storage_config(&config.storage)?;
    validate_sources(&config.sources)?;
    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.job_deadline_secs < 1 {
        return Err(ConfigError::Validation(
            "job-deadline-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.request_timeout_secs < 1 || config.connect_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request/connect timeouts must be >= 1s, got {}s/{}s",
            config.request_timeout_secs, config.connect_timeout_secs
        )));
    }

    if config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be <= 10, got {}",
            config.max_retries
        )));
    }

    if config.max_retries > 0 && config.backoff_base_ms == 0 {
        return Err(ConfigError::Validation(
            "backoff-base-ms must be > 0 when retries are enabled".to_string(),
        ));
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.pool_size < 1 || config.pool_size > 64 {
        return Err(ConfigError::Validation(format!(
            "pool-size must be between 1 and 64, got {}",
            config.pool_size
        )));
    }

    Ok(())
}

/// Validates source entries
///
/// Disabled sources are still checked for a unique name but their rules are
/// not compiled, so a half-written source can be parked with `enabled = false`.
fn validate_sources(sources: &[SourceConfig]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();

    for source in sources {
        validate_source_name(&source.name)?;

        if !names.insert(source.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source name '{}'",
                source.name
            )));
        }

        if !source.enabled {
            continue;
        }

        if source.html.is_some() && source.json.is_some() {
            return Err(ConfigError::Validation(format!(
                "source '{}' defines both html and json rules",
                source.name
            )));
        }

        build_headers(&source.headers)?;
        build_adapter(source)?;
    }

    Ok(())
}

/// Source names end up in logs and the job table: keep them simple
fn validate_source_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::Validation(
            "source name cannot be empty".to_string(),
        ));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "source name must contain only alphanumeric characters, '-' and '_', got '{}'",
            name
        )));
    }

    Ok(())
}
