//! The storyboard shot entity, its patch type, and ordinal renumbering.
//!
//! Shot numbers are unique and contiguous within a project. Whenever the
//! membership of a project's shot set changes (insert, delete, reorder,
//! duplicate), [`renumber_shots`] recomputes the ordinals from the current
//! member set — the cache is the input, not an external source of truth.

use serde::{Deserialize, Serialize};

use crate::types::{DbId, Timestamp};

/// Workflow status of a shot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ShotStatus {
    Planned,
    Boarded,
    Approved,
}

impl Default for ShotStatus {
    fn default() -> Self {
        ShotStatus::Planned
    }
}

/// A storyboard shot as cached from the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Shot {
    pub id: DbId,
    pub project_id: DbId,
    /// One-based ordinal, unique and contiguous within the project.
    pub shot_number: u32,
    pub title: String,
    pub description: String,
    pub status: ShotStatus,
    pub updated_at: Timestamp,
}

/// A partial update to a shot. `None` fields are left untouched.
///
/// `shot_number` is deliberately absent: ordinals are only ever changed
/// through renumbering, never through a field patch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShotPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<ShotStatus>,
}

impl Shot {
    /// Apply a patch in place. Does not stamp `updated_at`; the caller
    /// stamps it as part of the optimistic write.
    pub fn apply_patch(&mut self, patch: &ShotPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
    }
}

impl ShotPatch {
    /// Returns `true` if the patch carries no changes.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.status.is_none()
    }
}

/// Recompute contiguous one-based ordinals for a project's shot set.
///
/// Shots are sorted by their existing ordinal (ties broken by id so the
/// result is deterministic), then assigned `1..=N` in that order. Every
/// shot whose ordinal actually changes gets `updated_at` stamped to `now`,
/// since the ordinal counts as a mutated field.
///
/// Returns `true` if any ordinal changed.
pub fn renumber_shots(shots: &mut [Shot], now: Timestamp) -> bool {
    shots.sort_by(|a, b| {
        a.shot_number
            .cmp(&b.shot_number)
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut changed = false;
    for (index, shot) in shots.iter_mut().enumerate() {
        let expected = (index + 1) as u32;
        if shot.shot_number != expected {
            shot.shot_number = expected;
            shot.updated_at = now;
            changed = true;
        }
    }
    changed
}
