/// Crawl session status definitions
use std::fmt;

/// Represents the lifecycle of a crawl session
///
/// `seeded -> running -> (completed | stopped | failed)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    /// Created and seeded, no batch has run yet
    Seeded,

    /// At least one batch has run and the crawl is not finished
    Running,

    /// Budget reached or frontier exhausted
    Completed,

    /// An external stop signal ended the crawl
    Stopped,

    /// The start URL could not be fetched, or the crawl aborted
    Failed,
}

impl SessionStatus {
    /// Returns true if the session will never run another batch
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Stopped | Self::Failed)
    }

    /// Returns true if moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (Self::Seeded, Self::Running)
                | (Self::Seeded, Self::Stopped)
                | (Self::Seeded, Self::Failed)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Stopped)
                | (Self::Running, Self::Failed)
        )
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Seeded => "seeded",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "seeded" => Some(Self::Seeded),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "stopped" => Some(Self::Stopped),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
