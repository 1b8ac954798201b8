//! Sync orchestrator status
//!
//! The status is written only by the orchestrator and observed by the host
//! UI through a watch channel.

use serde::{Deserialize, Serialize};

/// Coarse state of the sync orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum SyncStatus {
    /// No pass is running; the last pass (if any) succeeded
    #[default]
    Idle,
    /// A pass is in progress
    Syncing,
    /// No usable credential is available; the user has to sign in
    Unauthenticated,
    /// The last pass failed or finished with per-file errors
    Error(String),
}

impl SyncStatus {
    /// Returns true while a pass is in progress
    pub fn is_syncing(&self) -> bool {
        matches!(self, Self::Syncing)
    }

    /// Short label for status indicators
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Syncing => "syncing",
            Self::Unauthenticated => "unauthenticated",
            Self::Error(_) => "error",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error(message) => write!(f, "error: {}", message),
            other => f.write_str(other.label()),
        }
    }
}
