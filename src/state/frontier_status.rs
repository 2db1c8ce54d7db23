/// Frontier entry status definitions
use std::fmt;

/// Represents where a frontier entry is in its fetch lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrontierStatus {
    /// Waiting to be dequeued
    Pending,

    /// Leased by a batch and being fetched
    Processing,

    /// Fetched and persisted
    Completed,

    /// Fetch failed or the URL was rejected
    Failed,
}

impl FrontierStatus {
    /// All statuses, in lifecycle order
    pub const ALL: [FrontierStatus; 4] = [
        Self::Pending,
        Self::Processing,
        Self::Completed,
        Self::Failed,
    ];

    /// Returns true once the entry will not be fetched again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if moving from `self` to `next` is a legal transition
    ///
    /// `Processing -> Pending` is the lease release used by stale reclaim and
    /// by workers that observe a stop request before fetching.
    pub fn can_transition_to(&self, next: FrontierStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
                | (Self::Processing, Self::Pending)
        )
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for FrontierStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
