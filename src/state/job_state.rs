/// Job state definitions for the pagination state machine
///
/// A job walks `Start → Fetching → {HasMore → Fetching | Exhausted | Failed}`;
/// `Cancelled` is reached when the cancellation signal is observed.
use std::fmt;

/// Represents the current state of one source's crawl job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    // ===== Active States =====
    /// Initial request not built yet
    Start,

    /// A page request is in flight or its response is being processed
    Fetching,

    /// The adapter returned a fresh next request
    HasMore,

    // ===== Terminal States =====
    /// No further page: adapter said so, the ceiling was hit, or a cycle was seen
    Exhausted,

    /// A fetch or persistence failure ended the job
    Failed,

    /// The cancellation signal stopped the job between pages
    Cancelled,
}

impl JobState {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exhausted | Self::Failed | Self::Cancelled)
    }

    /// Returns true if the job ended without a failure
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Exhausted)
    }

    /// Checks whether the state machine allows moving from `self` to `to`
    pub fn can_transition_to(&self, to: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, to),
            (Start, Fetching)
                | (Start, Failed)
                | (Start, Cancelled)
                | (Fetching, HasMore)
                | (Fetching, Exhausted)
                | (Fetching, Failed)
                | (Fetching, Cancelled)
                | (HasMore, Fetching)
        )
    }

    /// Converts the job state to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Fetching => "fetching",
            Self::HasMore => "has_more",
            Self::Exhausted => "exhausted",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses a job state from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "start" => Some(Self::Start),
            "fetching" => Some(Self::Fetching),
            "has_more" => Some(Self::HasMore),
            "exhausted" => Some(Self::Exhausted),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Returns all possible job states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Start,
            Self::Fetching,
            Self::HasMore,
            Self::Exhausted,
            Self::Failed,
            Self::Cancelled,
        ]
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
