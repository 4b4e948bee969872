//! Pod phase classification and the application states reported to a [`StateSink`](crate::sink::StateSink).

use std::fmt;

use serde::{Deserialize, Serialize};

pub const PHASE_PENDING: &str = "Pending";
pub const PHASE_RUNNING: &str = "Running";
pub const PHASE_SUCCEEDED: &str = "Succeeded";
pub const PHASE_FAILED: &str = "Failed";
pub const PHASE_UNKNOWN: &str = "Unknown";

/// Phase reported while no snapshot (or no status phase) has been observed.
pub const PHASE_NOT_OBSERVED: &str = "unknown";

/// Application state derived from the driver pod phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppState {
    Submitted,
    Running,
    Finished,
    Failed,
    Unknown,
}

impl AppState {
    /// Map a pod phase to an application state. Matching is exact and case-sensitive;
    /// anything unrecognised (including the literal `Unknown`) maps to [`AppState::Unknown`].
    pub fn from_phase(phase: &str) -> Self {
        match phase {
            PHASE_PENDING => AppState::Submitted,
            PHASE_RUNNING => AppState::Running,
            PHASE_SUCCEEDED => AppState::Finished,
            PHASE_FAILED => AppState::Failed,
            _ => AppState::Unknown,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, AppState::Finished | AppState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppState::Submitted => "SUBMITTED",
            AppState::Running => "RUNNING",
            AppState::Finished => "FINISHED",
            AppState::Failed => "FAILED",
            AppState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True only for `Succeeded` and `Failed`.
pub fn is_terminal_phase(phase: &str) -> bool {
    phase == PHASE_SUCCEEDED || phase == PHASE_FAILED
}
