//! Per-collection load state machine.
//!
//! One `SyncStatus` exists per logical collection (the projects list, and
//! each project's shot set). Transitions:
//!
//! ```text
//! idle/synced/error --(refresh requested)--> syncing --(success)--> synced
//!                                            syncing --(failure)--> error
//! ```

use serde::{Deserialize, Serialize};

/// Load state of one cached collection.
///
/// Never persisted — a restarted process always begins at `Idle` so the
/// first read revalidates against the server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Idle,
    Syncing,
    Synced,
    Error,
}

impl Default for SyncStatus {
    fn default() -> Self {
        SyncStatus::Idle
    }
}

impl SyncStatus {
    /// The stale-read-avoidance / request-coalescing rule: a network round
    /// trip is permitted only when the caller forces it, the cache is
    /// empty, or the collection is not already known-fresh.
    pub fn needs_fetch(self, cache_populated: bool, force: bool) -> bool {
        force || !cache_populated || self != SyncStatus::Synced
    }
}
