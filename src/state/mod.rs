//! State module for tracking crawl jobs
//!
//! # Components
//!
//! - `JobState`: the pagination state machine's states and allowed transitions
//! - `CrawlJob`: per-run bookkeeping (visited identifiers, counters, terminal reason)

mod crawl_job;
mod job_state;

pub use crawl_job::CrawlJob;
pub use job_state::JobState;
