//! Error taxonomy for the sync and collaboration layer.
//!
//! Transport failures are converted into these variants at the mutation /
//! load boundary; raw `reqwest` or WebSocket errors never reach consumers.
//! Nothing here is fatal — every variant degrades to "stale cache plus a
//! visible error state".

use crate::types::DbId;

/// A failure surfaced by the sync layer.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum SyncError {
    /// Lock acquisition timed out or the entity is held by another user.
    /// The mutation was aborted and the cache left untouched.
    #[error("\"{holder_name}\" is currently editing this item")]
    LockDenied { entity_id: DbId, holder_name: String },

    /// The server rejected or failed a confirmed-lock mutation. The
    /// speculative cache state has been discarded via a forced reload.
    #[error("The change could not be saved: {0}")]
    RemoteMutation(String),

    /// A list/load call failed. Prior cache contents are retained.
    #[error("Loading from the server failed: {0}")]
    RemoteLoad(String),

    /// The persistent connection is closed; lock ownership is forfeited.
    #[error("Not connected to the collaboration server")]
    ConnectionLost,

    /// Reading or writing the local state file failed.
    #[error("Local state error: {0}")]
    Persistence(String),

    /// A socket frame could not be encoded or decoded.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl SyncError {
    /// Lock denied by an unknown holder (e.g. acquisition timed out before
    /// any holder was observed).
    pub fn lock_timeout(entity_id: DbId) -> Self {
        SyncError::LockDenied {
            entity_id,
            holder_name: "another user".to_string(),
        }
    }

    /// Returns `true` if retrying the same operation later could succeed
    /// without any user action other than waiting.
    pub fn is_transient(&self) -> bool {
        !matches!(self, SyncError::Protocol(_))
    }
}
