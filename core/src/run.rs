//! Run state, snapshots and status reports.

use crate::configuration::ConfigurationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Counters of a ticket pool at one instant
///
/// Between operations `current == released - retrieved` always holds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolSnapshot {
    /// Tickets currently held by the pool
    pub current: u32,
    /// Tickets released over the lifetime of the run
    pub released: u32,
    /// Tickets retrieved over the lifetime of the run
    pub retrieved: u32,
}

impl PoolSnapshot {
    /// Check the counter relationships against a capacity and lifetime cap
    #[must_use]
    pub const fn is_consistent(&self, capacity: u32, total_tickets: u32) -> bool {
        self.current <= capacity
            && self.retrieved <= self.released
            && self.released <= total_tickets
            && self.current == self.released - self.retrieved
    }
}

/// Lifecycle state of a simulation run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunState {
    /// Workers are active
    Running,
    /// The run was stopped before the lifetime cap was drained
    Stopped,
    /// Every ticket was released and retrieved
    Completed,
}

impl RunState {
    /// `Stopped` and `Completed` are terminal
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Completed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Status of one run as reported to the external layer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatus {
    /// Configuration the run belongs to
    pub id: ConfigurationId,
    /// Current lifecycle state
    pub state: RunState,
    /// Last published snapshot
    pub snapshot: PoolSnapshot,
    /// When the run was started
    pub started_at: DateTime<Utc>,
    /// When the run reached a terminal state
    pub finished_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!RunState::Running.is_terminal());
        assert!(RunState::Stopped.is_terminal());
        assert!(RunState::Completed.is_terminal());
    }

    #[test]
    fn test_snapshot_consistency() {
        let ok = PoolSnapshot {
            current: 2,
            released: 5,
            retrieved: 3,
        };
        assert!(ok.is_consistent(3, 10));
        assert!(!ok.is_consistent(1, 10));
        assert!(!ok.is_consistent(3, 4));

        let drifted = PoolSnapshot {
            current: 1,
            released: 5,
            retrieved: 3,
        };
        assert!(!drifted.is_consistent(3, 10));
    }
}
