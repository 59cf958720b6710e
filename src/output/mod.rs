//! Output module for reporting harvest results
//!
//! This module handles:
//! - Per-job reports printed after a run and stored as bookkeeping
//! - Statistics over the stored products

mod report;
pub mod stats;

pub use report::{format_job_report, print_job_reports, JobReport};
pub use stats::{load_statistics, print_statistics, ProductStatistics};
