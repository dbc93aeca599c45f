//! Per-entity exclusive edit lock negotiation.
//!
//! The coordinator owns the lock observation table. It is populated only by
//! inbound pushes (`lock.acquired` / `lock.released`) and by the
//! acquire/release contract — no other component writes it. Locks are
//! advisory, connection-scoped, and never persisted: a reconnect starts
//! from an empty table and re-observes pushes fresh.
//!
//! Acquisition sends a request and then awaits the server's confirmation
//! push through a oneshot resolved directly by [`LockCoordinator::handle_message`],
//! bounded by [`LOCK_ACQUIRE_TIMEOUT`]. There is no retry after a timeout.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{oneshot, Mutex};

use callsheet_core::collaboration::{
    ClientMessage, EditLock, ServerMessage, LOCK_ACQUIRE_TIMEOUT, PROJECTS_SCOPE,
};
use callsheet_core::types::DbId;
use callsheet_core::SyncError;

/// Outbound half of the persistent connection, as seen by the coordinator.
///
/// `send` is fire-and-forget at the protocol level; delivery failures are
/// reported so callers can treat the connection as lost.
#[async_trait]
pub trait LockTransport: Send + Sync {
    /// Whether the persistent connection is currently open.
    fn is_connected(&self) -> bool;

    /// Queue a message for the server.
    async fn send(&self, message: ClientMessage) -> Result<(), SyncError>;
}

/// Observation table plus pending-acquire bookkeeping.
///
/// `observed` mirrors what the server has pushed for the active scope;
/// `held` is the subset of entity ids this client owns.
struct LockTable {
    active_scope: Option<DbId>,
    observed: HashMap<DbId, EditLock>,
    held: HashSet<DbId>,
    waiters: HashMap<DbId, Vec<oneshot::Sender<EditLock>>>,
}

impl LockTable {
    fn new() -> Self {
        Self {
            active_scope: None,
            observed: HashMap::new(),
            held: HashSet::new(),
            waiters: HashMap::new(),
        }
    }

    /// Pushes are scoped to the current working context: the active
    /// project's shot set plus the projects collection itself.
    fn accepts_scope(&self, scope_id: DbId) -> bool {
        scope_id == PROJECTS_SCOPE || self.active_scope == Some(scope_id)
    }
}

/// Negotiates exclusive edit locks over the persistent connection and
/// tracks locks held by other clients.
pub struct LockCoordinator {
    user_id: DbId,
    transport: Arc<dyn LockTransport>,
    table: Mutex<LockTable>,
}

impl LockCoordinator {
    pub fn new(user_id: DbId, transport: Arc<dyn LockTransport>) -> Self {
        Self {
            user_id,
            transport,
            table: Mutex::new(LockTable::new()),
        }
    }

    /// The local user's id, as matched against `lock.acquired` pushes.
    pub fn user_id(&self) -> DbId {
        self.user_id
    }

    // -----------------------------------------------------------------------
    // Acquire / release
    // -----------------------------------------------------------------------

    /// Request an exclusive lock on `entity_id`.
    ///
    /// Returns `true` only if a `lock.acquired` push naming this user
    /// arrives within [`LOCK_ACQUIRE_TIMEOUT`]. Returns `false` without
    /// retrying when disconnected, when the send fails, or on timeout —
    /// the caller decides what to surface.
    pub async fn acquire_lock(&self, entity_id: DbId) -> bool {
        if !self.transport.is_connected() {
            tracing::debug!(entity_id, "Lock request skipped: not connected");
            return false;
        }

        let rx = {
            let mut table = self.table.lock().await;
            if table.held.contains(&entity_id) {
                // Already ours; re-entrant acquires are a no-op grant.
                return true;
            }
            let (tx, rx) = oneshot::channel();
            table.waiters.entry(entity_id).or_default().push(tx);
            rx
        };

        if self
            .transport
            .send(ClientMessage::AcquireLock { entity_id })
            .await
            .is_err()
        {
            self.prune_waiters(entity_id).await;
            return false;
        }

        match tokio::time::timeout(LOCK_ACQUIRE_TIMEOUT, rx).await {
            Ok(Ok(lock)) => {
                tracing::info!(entity_id, holder_id = lock.holder_id, "Lock acquired");
                true
            }
            Ok(Err(_)) => {
                // Waiter dropped: connection lost or scope switched.
                tracing::debug!(entity_id, "Lock request abandoned");
                false
            }
            Err(_) => {
                tracing::info!(entity_id, "Lock request timed out");
                self.prune_waiters(entity_id).await;
                false
            }
        }
    }

    /// Release a held lock. Fire-and-forget: the entry is removed from
    /// local observation immediately and no acknowledgement is awaited.
    pub async fn release_lock(&self, entity_id: DbId) {
        {
            let mut table = self.table.lock().await;
            table.held.remove(&entity_id);
            table.observed.remove(&entity_id);
        }
        if self
            .transport
            .send(ClientMessage::ReleaseLock { entity_id })
            .await
            .is_err()
        {
            tracing::debug!(entity_id, "Lock release not delivered (disconnected)");
        } else {
            tracing::info!(entity_id, "Lock released");
        }
    }

    // -----------------------------------------------------------------------
    // Local reads
    // -----------------------------------------------------------------------

    /// Whether any client currently holds a lock on the entity, per the
    /// observation table.
    pub async fn is_locked(&self, entity_id: DbId) -> bool {
        self.table.lock().await.observed.contains_key(&entity_id)
    }

    /// The observed lock for an entity, if any.
    pub async fn get_lock(&self, entity_id: DbId) -> Option<EditLock> {
        self.table.lock().await.observed.get(&entity_id).cloned()
    }

    /// The observed lock if it belongs to someone other than this user.
    pub async fn locked_by_other(&self, entity_id: DbId) -> Option<EditLock> {
        self.table
            .lock()
            .await
            .observed
            .get(&entity_id)
            .filter(|lock| !lock.held_by(self.user_id))
            .cloned()
    }

    /// Entity ids currently locked by this client.
    pub async fn held_ids(&self) -> Vec<DbId> {
        self.table.lock().await.held.iter().copied().collect()
    }

    // -----------------------------------------------------------------------
    // Context switches and connection lifecycle
    // -----------------------------------------------------------------------

    /// Switch the working context to a new scope.
    ///
    /// All locks held by this client are proactively released
    /// (best-effort), the observation table is cleared, and pending
    /// acquires are abandoned. The new context re-observes pushes fresh.
    pub async fn set_active_scope(&self, scope_id: DbId) {
        let held: Vec<DbId> = {
            let mut table = self.table.lock().await;
            let held = table.held.drain().collect();
            table.observed.clear();
            table.waiters.clear();
            table.active_scope = Some(scope_id);
            held
        };

        for entity_id in held {
            if self
                .transport
                .send(ClientMessage::ReleaseLock { entity_id })
                .await
                .is_err()
            {
                tracing::debug!(entity_id, "Scope-switch release not delivered");
            }
        }
        tracing::debug!(scope_id, "Lock observation scope switched");
    }

    /// The connection dropped: every lock tied to it is forfeited and no
    /// reacquisition is attempted. Pending acquires fail immediately.
    pub async fn connection_lost(&self) {
        let mut table = self.table.lock().await;
        let held_count = table.held.len();
        table.held.clear();
        table.observed.clear();
        table.waiters.clear();
        if held_count > 0 {
            tracing::warn!(held_count, "Connection lost; forfeited held locks");
        }
    }

    // -----------------------------------------------------------------------
    // Inbound pushes
    // -----------------------------------------------------------------------

    /// Apply a lock push from the server.
    ///
    /// Pushes for scopes outside the current working context are ignored.
    /// A `lock.acquired` naming this user resolves any pending acquire
    /// waiters for the entity.
    pub async fn handle_message(&self, message: &ServerMessage) {
        let mut table = self.table.lock().await;
        match message {
            ServerMessage::LockAcquired {
                entity_id,
                holder_id,
                holder_name,
                scope_id,
            } => {
                if !table.accepts_scope(*scope_id) {
                    tracing::trace!(entity_id, scope_id, "Ignoring out-of-scope lock push");
                    return;
                }
                let lock = EditLock {
                    entity_id: *entity_id,
                    holder_id: *holder_id,
                    holder_name: holder_name.clone(),
                    acquired_at: chrono::Utc::now(),
                };
                table.observed.insert(*entity_id, lock.clone());
                if lock.held_by(self.user_id) {
                    table.held.insert(*entity_id);
                    if let Some(waiters) = table.waiters.remove(entity_id) {
                        for waiter in waiters {
                            let _ = waiter.send(lock.clone());
                        }
                    }
                }
            }
            ServerMessage::LockReleased {
                entity_id,
                scope_id,
            } => {
                if !table.accepts_scope(*scope_id) {
                    return;
                }
                table.observed.remove(entity_id);
                table.held.remove(entity_id);
            }
            _ => {}
        }
    }

    /// Drop waiters whose receiving side has already given up.
    async fn prune_waiters(&self, entity_id: DbId) {
        let mut table = self.table.lock().await;
        if let Some(waiters) = table.waiters.get_mut(&entity_id) {
            waiters.retain(|tx| !tx.is_closed());
            if waiters.is_empty() {
                table.waiters.remove(&entity_id);
            }
        }
    }
}
