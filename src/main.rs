//! Promo-Harvest main entry point
//!
//! This is the command-line interface for the Promo-Harvest listing crawler.

use anyhow::{bail, Context};
use clap::Parser;
use promo_harvest::adapters::{build_adapter, source_headers};
use promo_harvest::config::{load_config_with_hash, Config};
use promo_harvest::crawler::run_pipeline;
use promo_harvest::output::{load_statistics, print_job_reports, print_statistics};
use promo_harvest::storage::{open_storage, ProductQuery, SqliteStorage, Storage, StoragePool};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

/// Promo-Harvest: a promotional listing harvester
///
/// Promo-Harvest crawls the promotion listings of configured grocery sites,
/// follows their pagination, normalizes every product into one record
/// shape and loads the result into SQLite.
#[derive(Parser, Debug)]
#[command(name = "promo-harvest")]
#[command(version)]
#[command(about = "A promotional listing harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Only crawl these sources (repeatable)
    #[arg(long = "source", value_name = "NAME")]
    sources: Vec<String>,

    /// Override the per-job page ceiling
    #[arg(long, value_name = "N")]
    max_pages: Option<u32>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "show", "list", "search"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "show", "list", "search"])]
    stats: bool,

    /// Print one stored product as JSON and exit
    #[arg(long, value_name = "ID", conflicts_with_all = ["dry_run", "stats", "list", "search"])]
    show: Option<i64>,

    /// Print a page of stored products as JSON and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "show", "search"])]
    list: bool,

    /// Print products whose name contains TERM as JSON and exit
    #[arg(long, value_name = "TERM", conflicts_with_all = ["dry_run", "stats", "show", "list"])]
    search: Option<String>,

    /// Brand filter for --list (case-insensitive substring)
    #[arg(long, value_name = "BRAND")]
    brand: Option<String>,

    /// Page size for --list and --search
    #[arg(long, default_value_t = 20)]
    limit: u32,

    /// Offset for --list
    #[arg(long, default_value_t = 0)]
    offset: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    apply_overrides(&mut config, &cli)?;

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if let Some(id) = cli.show {
        handle_show(&config, id)?;
    } else if cli.list {
        let query = ProductQuery {
            brand: cli.brand.clone(),
            limit: cli.limit,
            offset: cli.offset,
        };
        handle_list(&config, &query)?;
    } else if let Some(term) = &cli.search {
        handle_search(&config, term, cli.limit)?;
    } else {
        handle_crawl(config, &config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("promo_harvest=info,warn"),
            1 => EnvFilter::new("promo_harvest=debug,info"),
            2 => EnvFilter::new("promo_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Applies `--source` and `--max-pages` on top of the loaded configuration
fn apply_overrides(config: &mut Config, cli: &Cli) -> anyhow::Result<()> {
    if let Some(max_pages) = cli.max_pages {
        if max_pages == 0 {
            bail!("--max-pages must be >= 1");
        }
        config.crawler.max_pages = max_pages;
    }

    if !cli.sources.is_empty() {
        for name in &cli.sources {
            if !config.sources.iter().any(|s| &s.name == name) {
                bail!("unknown source '{}'", name);
            }
        }
        for source in &mut config.sources {
            source.enabled = cli.sources.contains(&source.name);
        }
        // Sources switched on here may have been parked with unfinished rules
        for source in config.enabled_sources() {
            build_adapter(source)
                .with_context(|| format!("source '{}' cannot be crawled", source.name))?;
        }
    }

    Ok(())
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Promo-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Page ceiling: {}", config.crawler.max_pages);
    println!("  Job deadline: {}s", config.crawler.job_deadline_secs);

    println!("\nFetch:");
    println!(
        "  Timeouts: {}s request, {}s connect",
        config.fetch.request_timeout_secs, config.fetch.connect_timeout_secs
    );
    println!(
        "  Retries: {} (backoff from {}ms)",
        config.fetch.max_retries, config.fetch.backoff_base_ms
    );
    println!(
        "  Delay: {}ms + up to {}ms jitter",
        config.fetch.request_delay_ms, config.fetch.delay_jitter_ms
    );

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);
    println!("  Pool size: {}", config.storage.pool_size);

    let enabled: Vec<_> = config.enabled_sources().collect();
    println!("\nSources ({} enabled of {}):", enabled.len(), config.sources.len());
    for source in &config.sources {
        if !source.enabled {
            println!("  - {} (disabled)", source.name);
            continue;
        }
        let adapter = build_adapter(source)?;
        let headers = source_headers(source);
        println!(
            "  - {} ({})",
            source.name,
            source.preset.as_deref().unwrap_or("custom rules")
        );
        println!("    * start: {}", adapter.initial_request().url);
        if let Some(ua) = &headers.user_agent {
            println!("    * user-agent: {}", ua);
        }
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would start {} job(s)", enabled.len());

    Ok(())
}

/// Opens the configured database for the read-only modes
fn open_database(config: &Config) -> anyhow::Result<SqliteStorage> {
    let path = Path::new(&config.storage.database_path);
    open_storage(path).with_context(|| format!("cannot open database {}", path.display()))
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.storage.database_path);

    let storage = open_database(config)?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --show mode: prints one product as JSON
fn handle_show(config: &Config, id: i64) -> anyhow::Result<()> {
    let storage = open_database(config)?;

    match storage.get_product(id)? {
        Some(row) => {
            println!("{}", serde_json::to_string_pretty(&row)?);
            Ok(())
        }
        None => bail!("no product with id {}", id),
    }
}

/// Handles the --list mode: prints a page of products as JSON
fn handle_list(config: &Config, query: &ProductQuery) -> anyhow::Result<()> {
    let storage = open_database(config)?;
    let page = storage.list_products(query)?;
    println!("{}", serde_json::to_string_pretty(&page)?);
    Ok(())
}

/// Handles the --search mode: prints matching products as JSON
fn handle_search(config: &Config, term: &str, limit: u32) -> anyhow::Result<()> {
    let storage = open_database(config)?;
    let rows = storage.search_products(term, limit)?;
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: &str) -> anyhow::Result<()> {
    let job_count = config.enabled_sources().count();
    if job_count == 0 {
        tracing::warn!("No enabled sources, nothing to do");
        return Ok(());
    }
    tracing::info!(
        "Starting {} job(s), page ceiling {}",
        job_count,
        config.crawler.max_pages
    );

    let pool = Arc::new(
        StoragePool::new(&config.storage.database_path, config.storage.pool_size)
            .context("cannot create the storage pool")?,
    );

    // Ctrl-C stops every job before its next fetch
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current page");
            let _ = cancel_tx.send(true);
        }
    });

    let outcome = run_pipeline(Arc::new(config), Arc::clone(&pool), cancel_rx, config_hash).await;
    pool.close();

    match outcome {
        Ok(reports) => {
            print_job_reports(&reports);
            let unfinished = reports.iter().filter(|r| !r.state.is_success()).count();
            if unfinished > 0 {
                tracing::warn!(
                    "{} of {} job(s) did not run to exhaustion",
                    unfinished,
                    reports.len()
                );
            } else {
                tracing::info!("Harvest completed successfully");
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
