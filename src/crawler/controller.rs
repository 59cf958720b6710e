//! Pagination controller
//!
//! Drives one source through `Start → Fetching → {HasMore → Fetching |
//! Exhausted | Failed}` (plus `Cancelled`), feeding every page's records
//! through the normalizer into the loader as soon as the page arrives.

use crate::adapters::{Request, SiteAdapter};
use crate::crawler::fetcher::{FetchedPage, PageFetcher};
use crate::record::normalize_all;
use crate::state::{CrawlJob, JobState};
use crate::storage::IngestionLoader;
use crate::HarvestError;
use tokio::sync::watch;
use tokio::time::Instant;

/// Runs the pagination loop for one job
pub struct PaginationController<'a, F: PageFetcher> {
    adapter: &'a dyn SiteAdapter,
    fetcher: F,
    max_pages: u32,
    deadline: Instant,
    cancel: watch::Receiver<bool>,
}

impl<'a, F: PageFetcher> PaginationController<'a, F> {
    pub fn new(
        adapter: &'a dyn SiteAdapter,
        fetcher: F,
        max_pages: u32,
        deadline: Instant,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            adapter,
            fetcher,
            max_pages,
            deadline,
            cancel,
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Runs the job to a terminal state
    ///
    /// Never fails: whatever goes wrong ends up as the job's `Failed` state
    /// and reason. Records ingested before the failure stay staged.
    pub async fn run(&mut self, job: &mut CrawlJob, loader: &mut IngestionLoader<'_>) {
        if let Err(e) = self.drive(job, loader).await {
            tracing::error!("[{}] job failed: {}", job.source, e);
            job.fail(e.to_string());
        }

        tracing::info!(
            "[{}] {} after {} page(s) of {} requested: {}",
            job.source,
            job.state,
            job.pages_fetched,
            job.visited_count(),
            job.reason.as_deref().unwrap_or("-")
        );
    }

    async fn drive(
        &mut self,
        job: &mut CrawlJob,
        loader: &mut IngestionLoader<'_>,
    ) -> Result<(), HarvestError> {
        let mut request = self.adapter.initial_request();
        job.visit(request.identifier());
        job.transition(JobState::Fetching)?;

        loop {
            if self.is_cancelled() {
                return job.finish(JobState::Cancelled, "cancelled");
            }
            if Instant::now() >= self.deadline {
                return job.finish(JobState::Failed, "deadline exceeded");
            }

            tracing::debug!("[{}] fetching page {}: {}", job.source, request.page, request.url);

            // A completed fetch wins over a cancellation that arrives with it
            let fetched = tokio::select! {
                biased;
                result = self.fetcher.fetch(&request, self.deadline) => result,
                _ = cancelled(&mut self.cancel) => {
                    return job.finish(JobState::Cancelled, "cancelled during fetch");
                }
            };

            let page = match fetched {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!("[{}] page {} failed: {}", job.source, request.page, e);
                    return job.finish(JobState::Failed, e.to_string());
                }
            };
            job.record_page();

            self.process_page(&page, job, loader).await?;

            match self.next_step(&page, job) {
                Ok(next) => {
                    job.transition(JobState::HasMore)?;
                    job.transition(JobState::Fetching)?;
                    request = next;
                }
                Err(reason) => return job.finish(JobState::Exhausted, reason),
            }
        }
    }

    /// Extracts, normalizes and forwards one page's records
    async fn process_page(
        &self,
        page: &FetchedPage,
        job: &mut CrawlJob,
        loader: &mut IngestionLoader<'_>,
    ) -> Result<(), HarvestError> {
        let adapter = self.adapter;
        let source = adapter.source();

        let mut extracted = 0u64;
        let mut skipped = 0u64;
        let raws = adapter
            .extract(page)
            .into_iter()
            .filter_map(|result| match result {
                Ok(raw) => {
                    extracted += 1;
                    Some(raw)
                }
                Err(e) => {
                    skipped += 1;
                    tracing::warn!("[{}] page {}: skipped {}", source, page.request.page, e);
                    None
                }
            });

        // Records reach the loader one at a time, as the page yields them
        let mut ingested = 0;
        let mut outcomes = normalize_all(raws, source);
        let streamed = loop {
            let Some(outcome) = outcomes.next() else {
                break Ok(());
            };
            match outcome {
                Ok(record) => {
                    job.records_forwarded += 1;
                    match loader.ingest(&record).await {
                        Ok(true) => ingested += 1,
                        Ok(false) => {}
                        Err(e) => break Err(e),
                    }
                }
                Err(rejection) => {
                    job.validation_rejects += 1;
                    tracing::warn!("[{}] rejected {}", source, rejection);
                }
            }
        };
        drop(outcomes);

        job.records_extracted += extracted;
        job.extraction_rejects += skipped;
        streamed?;

        tracing::info!(
            "[{}] page {} ({}): {} extracted, {} ingested",
            source,
            page.request.page,
            page.final_url,
            extracted,
            ingested
        );
        Ok(())
    }

    /// The next request, or the reason pagination stops
    fn next_step(&self, page: &FetchedPage, job: &mut CrawlJob) -> Result<Request, &'static str> {
        let next = self
            .adapter
            .next_request(page, job)
            .ok_or("no further page")?;

        if job.pages_fetched >= self.max_pages {
            return Err("page ceiling");
        }
        if !job.visit(next.identifier()) {
            tracing::warn!("[{}] pagination cycle at {}", job.source, next.url);
            return Err("cycle");
        }
        Ok(next)
    }

    fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }
}

/// Resolves once the cancellation flag is raised; never if the sender is gone
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
