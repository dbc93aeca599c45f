//! Real-time collaboration constants, lock types, and wire protocol.
//!
//! This module lives in `core` (zero internal deps) so that the sync
//! engine, the socket transport, and tests can all reference the same
//! lock timeout, lock type, and message protocol.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Lock timing constants
// ---------------------------------------------------------------------------

/// How long an `acquire_lock` call waits for the server's confirmation
/// push before giving up. No retry is attempted after the timeout.
pub const LOCK_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Scopes
// ---------------------------------------------------------------------------

/// Reserved scope id for the projects collection itself. Shot scopes use
/// the owning project's id.
pub const PROJECTS_SCOPE: DbId = 0;

// ---------------------------------------------------------------------------
// EditLock
// ---------------------------------------------------------------------------

/// An exclusive, connection-scoped edit lock on one entity.
///
/// Locks are advisory and ephemeral: they are never persisted, and the
/// server drops any lock tied to a closed connection. At most one lock
/// exists per entity across all connected clients at any instant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EditLock {
    pub entity_id: DbId,
    pub holder_id: DbId,
    pub holder_name: String,
    pub acquired_at: Timestamp,
}

impl EditLock {
    /// Returns `true` if the lock is held by the given user.
    pub fn held_by(&self, user_id: DbId) -> bool {
        self.holder_id == user_id
    }
}

// ---------------------------------------------------------------------------
// Collaboration socket message protocol
// ---------------------------------------------------------------------------

/// Messages sent by this client over the persistent connection.
///
/// Serialized as JSON with an internally-tagged `"type"` discriminator so
/// that the server can route messages by type string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Request an exclusive edit lock on an entity.
    #[serde(rename = "lock.acquire")]
    AcquireLock { entity_id: DbId },

    /// Release a held lock. Fire-and-forget; no acknowledgement is awaited.
    #[serde(rename = "lock.release")]
    ReleaseLock { entity_id: DbId },

    /// Start receiving pushes for a scope (a project's shot set).
    #[serde(rename = "scope.subscribe")]
    Subscribe { scope_id: DbId },

    /// Stop receiving pushes for a scope.
    #[serde(rename = "scope.unsubscribe")]
    Unsubscribe { scope_id: DbId },
}

/// Messages pushed by the server over the persistent connection.
///
/// Entity payloads are carried as raw JSON and decoded by the store that
/// owns the scope, since projects and shots share one push channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// A lock was granted — to this client or any other.
    #[serde(rename = "lock.acquired")]
    LockAcquired {
        entity_id: DbId,
        holder_id: DbId,
        holder_name: String,
        scope_id: DbId,
    },

    /// A lock was released or expired with its connection.
    #[serde(rename = "lock.released")]
    LockReleased { entity_id: DbId, scope_id: DbId },

    /// Another client created an entity in a subscribed scope.
    #[serde(rename = "entity.created")]
    EntityCreated {
        scope_id: DbId,
        entity: serde_json::Value,
    },

    /// Another client updated an entity in a subscribed scope.
    #[serde(rename = "entity.updated")]
    EntityUpdated {
        scope_id: DbId,
        entity: serde_json::Value,
    },

    /// Another client deleted an entity in a subscribed scope.
    #[serde(rename = "entity.deleted")]
    EntityDeleted { scope_id: DbId, entity_id: DbId },

    /// Another client reordered a scope's entities. `ordered_ids` is the
    /// complete new ordering.
    #[serde(rename = "entities.reordered")]
    EntitiesReordered {
        scope_id: DbId,
        ordered_ids: Vec<DbId>,
    },
}

impl ServerMessage {
    /// The scope this push belongs to. Pushes for scopes other than the
    /// active one are ignored by the session.
    pub fn scope_id(&self) -> DbId {
        match self {
            ServerMessage::LockAcquired { scope_id, .. }
            | ServerMessage::LockReleased { scope_id, .. }
            | ServerMessage::EntityCreated { scope_id, .. }
            | ServerMessage::EntityUpdated { scope_id, .. }
            | ServerMessage::EntityDeleted { scope_id, .. }
            | ServerMessage::EntitiesReordered { scope_id, .. } => *scope_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
