//! Per-job reports
//!
//! A report is produced for every job, whatever its terminal state, and is
//! both printed and stored in the `crawl_jobs` table.

use crate::state::{CrawlJob, JobState};
use crate::storage::{LoadSummary, RecordFailure};
use chrono::{DateTime, Utc};

/// Summary of one finished crawl job
#[derive(Debug, Clone)]
pub struct JobReport {
    pub source: String,
    pub state: JobState,
    pub reason: Option<String>,
    pub pages_fetched: u32,
    pub records_extracted: u64,
    pub extraction_rejects: u64,
    pub validation_rejects: u64,
    pub records_staged: u64,
    pub records_committed: u64,
    pub persistence_failures: Vec<RecordFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl JobReport {
    /// Combines the controller's bookkeeping with the loader's outcome
    pub fn new(
        job: &CrawlJob,
        load: &LoadSummary,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        let mut reason = job.reason.clone();
        if let Some(error) = &load.commit_error {
            reason = Some(match reason {
                Some(r) => format!("{}; {}", r, error),
                None => error.to_string(),
            });
        }

        // A job whose records never reached the table did not succeed
        let state = if load.commit_error.is_some() && job.state == JobState::Exhausted {
            JobState::Failed
        } else {
            job.state
        };

        Self {
            source: job.source.clone(),
            state,
            reason,
            pages_fetched: job.pages_fetched,
            records_extracted: job.records_extracted,
            extraction_rejects: job.extraction_rejects,
            validation_rejects: job.validation_rejects,
            records_staged: load.staged,
            records_committed: load.inserted,
            persistence_failures: load.failures.clone(),
            started_at,
            finished_at,
        }
    }

    /// Report for a job that could not even start
    pub fn aborted(source: &str, reason: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            source: source.to_string(),
            state: JobState::Failed,
            reason: Some(reason.into()),
            pages_fetched: 0,
            records_extracted: 0,
            extraction_rejects: 0,
            validation_rejects: 0,
            records_staged: 0,
            records_committed: 0,
            persistence_failures: Vec::new(),
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }
}

/// Formats one report as a block of text
pub fn format_job_report(report: &JobReport) -> String {
    let mut out = String::new();

    out.push_str(&format!("[{}] {}", report.source, report.state));
    if let Some(reason) = &report.reason {
        out.push_str(&format!(" ({})", reason));
    }
    out.push('\n');

    out.push_str(&format!(
        "  Pages fetched: {}  Duration: {}s\n",
        report.pages_fetched,
        report.duration_seconds()
    ));
    out.push_str(&format!(
        "  Entries extracted: {}  Extraction rejects: {}  Validation rejects: {}\n",
        report.records_extracted, report.extraction_rejects, report.validation_rejects
    ));
    out.push_str(&format!(
        "  Records staged: {}  Committed: {}  Insert failures: {}\n",
        report.records_staged,
        report.records_committed,
        report.persistence_failures.len()
    ));

    for failure in report.persistence_failures.iter().take(5) {
        out.push_str(&format!("    - {}: {}\n", failure.name, failure.message));
    }
    if report.persistence_failures.len() > 5 {
        out.push_str(&format!(
            "    ... and {} more\n",
            report.persistence_failures.len() - 5
        ));
    }

    out
}

/// Prints every report followed by a one-line total
pub fn print_job_reports(reports: &[JobReport]) {
    println!("=== Harvest Report ===\n");

    for report in reports {
        println!("{}", format_job_report(report));
    }

    let committed: u64 = reports.iter().map(|r| r.records_committed).sum();
    let failed = reports
        .iter()
        .filter(|r| r.state == JobState::Failed)
        .count();
    println!(
        "Total: {} job(s), {} failed, {} record(s) committed",
        reports.len(),
        failed,
        committed
    );
}
