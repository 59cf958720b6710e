use crate::state::JobState;
use crate::HarvestError;
use std::collections::HashSet;

/// Tracks one source's run through the pagination state machine
///
/// Owned by the pagination controller for the duration of a run and
/// discarded once its counters have been copied into the job report.
#[derive(Debug, Clone)]
pub struct CrawlJob {
    /// Source identifier
    pub source: String,

    /// Current state
    pub state: JobState,

    /// Identifiers (normalized URLs or tokens) already requested
    visited: HashSet<String>,

    /// Pages fetched successfully
    pub pages_fetched: u32,

    /// Entries that made it through extraction
    pub records_extracted: u64,

    /// Entries skipped because extraction failed
    pub extraction_rejects: u64,

    /// Extracted entries rejected by the normalizer
    pub validation_rejects: u64,

    /// Normalized records handed to the loader
    pub records_forwarded: u64,

    /// Why the job reached its terminal state
    pub reason: Option<String>,
}

impl CrawlJob {
    /// Creates a job in the `Start` state
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            state: JobState::Start,
            visited: HashSet::new(),
            pages_fetched: 0,
            records_extracted: 0,
            extraction_rejects: 0,
            validation_rejects: 0,
            records_forwarded: 0,
            reason: None,
        }
    }

    /// Moves to `to`, rejecting transitions the state machine does not allow
    pub fn transition(&mut self, to: JobState) -> Result<(), HarvestError> {
        if !self.state.can_transition_to(to) {
            return Err(HarvestError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }

    /// Moves to a terminal state and records why
    pub fn finish(&mut self, to: JobState, reason: impl Into<String>) -> Result<(), HarvestError> {
        self.transition(to)?;
        self.reason = Some(reason.into());
        Ok(())
    }

    /// Ends the job as `Failed` from any non-terminal state
    ///
    /// A job that already reached a terminal state keeps it.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.state.is_terminal() {
            return;
        }
        self.state = JobState::Failed;
        self.reason = Some(reason.into());
    }

    /// Marks `identifier` as visited; returns false if it was seen before
    pub fn visit(&mut self, identifier: String) -> bool {
        self.visited.insert(identifier)
    }

    /// Number of distinct page identifiers requested so far
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Records one successfully fetched page
    pub fn record_page(&mut self) {
        self.pages_fetched += 1;
    }
}
