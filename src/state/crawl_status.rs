/// Crawl lifecycle states and the legal transitions between them
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the current state of a crawl
///
/// `Idle` is the only initial state; `Completed`, `Error` and `Cancelled`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlStatus {
    /// Created, workers not started yet
    Idle,

    /// Workers are dequeuing and fetching
    InProgress,

    /// Workers are parked before their next dequeue
    Paused,

    /// Frontier drained with no fetch in flight
    Completed,

    /// Further progress impossible (bad seed, all workers failed, timeout)
    Error,

    /// Stopped on request; collected pages are kept
    Cancelled,
}

impl CrawlStatus {
    /// Returns true if no transition can leave this state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Cancelled)
    }

    /// Returns true while workers may still run
    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress | Self::Paused)
    }

    /// Checks whether moving from `self` to `to` is legal
    pub fn can_transition_to(&self, to: CrawlStatus) -> bool {
        use CrawlStatus::*;

        matches!(
            (self, to),
            (Idle, InProgress)
                | (Idle, Cancelled)
                | (InProgress, Paused)
                | (InProgress, Completed)
                | (InProgress, Error)
                | (InProgress, Cancelled)
                | (Paused, InProgress)
                | (Paused, Cancelled)
        )
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::InProgress => "in_progress",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses a status from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "in_progress" => Some(Self::InProgress),
            "paused" => Some(Self::Paused),
            "completed" => Some(Self::Completed),
            "error" => Some(Self::Error),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn all_states() -> [Self; 6] {
        [
            Self::Idle,
            Self::InProgress,
            Self::Paused,
            Self::Completed,
            Self::Error,
            Self::Cancelled,
        ]
    }
}

impl fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}
