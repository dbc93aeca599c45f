//! Local state persisted across process restarts.
//!
//! Cache contents, the active scope, the last-known sync timestamp, and
//! the view-mode preference survive a restart. Lock observation state and
//! `SyncStatus` are deliberately excluded — both are connection-scoped
//! and must be rebuilt live.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use callsheet_core::types::{DbId, Timestamp};
use callsheet_core::{Project, Shot, SyncError};

/// UI view-mode preference for the shot list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    Grid,
    List,
}

impl Default for ViewMode {
    fn default() -> Self {
        ViewMode::Grid
    }
}

/// Everything that survives a restart.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedState {
    pub projects: Vec<Project>,
    pub shots_by_project: HashMap<DbId, Vec<Shot>>,
    pub active_project_id: Option<DbId>,
    pub last_synced_at: Option<Timestamp>,
    pub view_mode: ViewMode,
}

/// JSON state file with atomic writes (temp file + rename).
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Read the persisted state. A missing file starts cold; an unreadable
    /// or corrupt file logs a warning and also starts cold — local state
    /// is a cache, never a reason to fail.
    pub fn load(&self) -> PersistedState {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return PersistedState::default();
            }
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "State file unreadable; starting cold");
                return PersistedState::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "State file corrupt; starting cold");
                PersistedState::default()
            }
        }
    }

    /// Write the state atomically: serialize to a sibling temp file, then
    /// rename over the target.
    pub fn save(&self, state: &PersistedState) -> Result<(), SyncError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| SyncError::Persistence(err.to_string()))?;
        }

        let json = serde_json::to_string_pretty(state)
            .map_err(|err| SyncError::Persistence(err.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|err| SyncError::Persistence(err.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|err| SyncError::Persistence(err.to_string()))?;

        tracing::debug!(path = %self.path.display(), "Local state saved");
        Ok(())
    }
}
