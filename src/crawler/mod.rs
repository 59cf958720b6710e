//! Crawler module: fetching pages and driving pagination
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with politeness delays and retry logic
//! - The per-source pagination state machine
//! - Running every enabled source as an independent concurrent job

mod controller;
mod fetcher;
mod throttle;

pub use controller::PaginationController;
pub use fetcher::{build_headers, build_http_client, FetchedPage, HttpFetcher, PageFetcher};
pub use throttle::Throttle;

use crate::adapters::{build_adapter, SiteAdapter};
use crate::config::{Config, CrawlerConfig};
use crate::output::JobReport;
use crate::state::CrawlJob;
use crate::storage::{IngestionLoader, Storage, StoragePool};
use crate::HarvestError;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Runs one job per enabled source, concurrently
///
/// Jobs share the HTTP client and the storage pool and nothing else; one
/// job failing (or panicking) never affects the others. Returns one report
/// per job, ordered by source name.
///
/// Raising the `cancel` flag stops every job before its next fetch; pages
/// already fetched are processed and committed.
pub async fn run_pipeline(
    config: Arc<Config>,
    pool: Arc<StoragePool>,
    cancel: watch::Receiver<bool>,
    config_hash: &str,
) -> Result<Vec<JobReport>, HarvestError> {
    let client = build_http_client(&config.fetch)?;
    let started_at = Utc::now();

    let mut tasks = JoinSet::new();
    let mut sources = Vec::new();

    for source in config.enabled_sources() {
        let adapter = build_adapter(source)?;
        let fetcher = HttpFetcher::new(client.clone(), source, &config.fetch)?;
        let pool = Arc::clone(&pool);
        let cancel = cancel.clone();
        let crawler = config.crawler.clone();
        let insert_retries = config.storage.insert_retries;
        let hash = config_hash.to_string();

        tracing::info!("Starting job for source {}", source.name);
        sources.push(source.name.clone());

        tasks.spawn(async move {
            run_job(
                adapter.as_ref(),
                fetcher,
                &pool,
                &crawler,
                insert_retries,
                cancel,
                &hash,
            )
            .await
        });
    }

    let mut reports = Vec::with_capacity(sources.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(report) => reports.push(report),
            Err(e) => tracing::error!("Job task ended abnormally: {}", e),
        }
    }

    for source in sources {
        if !reports.iter().any(|r| r.source == source) {
            reports.push(JobReport::aborted(&source, "job task panicked", started_at));
        }
    }

    reports.sort_by(|a, b| a.source.cmp(&b.source));
    Ok(reports)
}

/// Runs one source to completion and records the outcome
///
/// Always produces a report: failures to get a connection or to prepare
/// staging end up as a `Failed` report with zero pages.
pub async fn run_job<F: PageFetcher>(
    adapter: &dyn SiteAdapter,
    fetcher: F,
    pool: &StoragePool,
    crawler: &CrawlerConfig,
    insert_retries: u32,
    cancel: watch::Receiver<bool>,
    config_hash: &str,
) -> JobReport {
    let started_at = Utc::now();
    let source = adapter.source();

    let mut storage = match pool.acquire().await {
        Ok(storage) => storage,
        Err(e) => {
            tracing::error!("[{}] storage unavailable: {}", source, e);
            return JobReport::aborted(source, format!("storage unavailable: {}", e), started_at);
        }
    };

    let deadline = Instant::now() + Duration::from_secs(crawler.job_deadline_secs);
    let mut job = CrawlJob::new(source);

    let summary = {
        let mut loader = match IngestionLoader::begin(&mut *storage, source, insert_retries) {
            Ok(loader) => loader,
            Err(e) => {
                tracing::error!("[{}] {}", source, e);
                return JobReport::aborted(source, e.to_string(), started_at);
            }
        };

        let mut controller =
            PaginationController::new(adapter, fetcher, crawler.max_pages, deadline, cancel);
        controller.run(&mut job, &mut loader).await;
        loader.finish().await
    };

    let report = JobReport::new(&job, &summary, started_at, Utc::now());
    if let Err(e) = storage.record_job(&report, config_hash) {
        tracing::warn!("[{}] could not record job: {}", source, e);
    }
    report
}
