//! The project entity and its partial-update patch.

use serde::{Deserialize, Serialize};

use crate::types::{DbId, Timestamp};

/// A production project as cached from the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: DbId,
    pub name: String,
    pub description: String,
    /// Last modification time, stamped locally on optimistic writes and
    /// replaced by the server value on reload.
    pub updated_at: Timestamp,
}

/// A partial update to a project. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl Project {
    /// Apply a patch in place. Does not stamp `updated_at`; the caller
    /// stamps it as part of the optimistic write.
    pub fn apply_patch(&mut self, patch: &ProjectPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
    }
}

impl ProjectPatch {
    /// Returns `true` if the patch carries no changes.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}
