//! Shot collection store: one cached collection per project.
//!
//! Same load/refresh and optimistic-mutation shape as the project store,
//! plus ordinal maintenance: any change to a project's shot membership
//! (insert, delete, duplicate, reorder) renumbers the set so shot numbers
//! stay unique and contiguous. Batch operations splice the cache once and
//! fire one remote call; a failed batch reloads the whole aggregate rather
//! than committing per item.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use callsheet_core::shot::renumber_shots;
use callsheet_core::types::DbId;
use callsheet_core::{ServerMessage, Shot, ShotPatch, SyncError};

use crate::api::{CreateShot, ShotApi};
use crate::cache::{CachedEntity, EntityCache};
use crate::locks::LockCoordinator;
use crate::status::SyncStatus;

#[derive(Default)]
struct ShotCollection {
    cache: EntityCache<Shot>,
    status: SyncStatus,
}

impl ShotCollection {
    /// Renumber the member set in place: sort by existing ordinal, assign
    /// `1..=N`, stamp `updated_at` on every shot whose ordinal changed.
    fn renumber(&mut self) {
        let mut shots = self.cache.snapshot();
        if renumber_shots(&mut shots, chrono::Utc::now()) {
            self.cache.replace_all(shots);
        }
    }

    /// Shots ordered by shot number.
    fn ordered(&self) -> Vec<Shot> {
        let mut shots = self.cache.snapshot();
        shots.sort_by_key(|s| s.shot_number);
        shots
    }
}

struct ShotState {
    collections: HashMap<DbId, ShotCollection>,
    next_provisional_id: DbId,
}

/// Store for per-project shot collections.
pub struct ShotStore {
    api: Arc<dyn ShotApi>,
    locks: Arc<LockCoordinator>,
    state: Mutex<ShotState>,
}

impl ShotStore {
    pub fn new(api: Arc<dyn ShotApi>, locks: Arc<LockCoordinator>) -> Self {
        Self {
            api,
            locks,
            state: Mutex::new(ShotState {
                collections: HashMap::new(),
                next_provisional_id: -1,
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn status(&self, project_id: DbId) -> SyncStatus {
        self.state
            .lock()
            .await
            .collections
            .get(&project_id)
            .map(|c| c.status)
            .unwrap_or_default()
    }

    pub async fn get(&self, project_id: DbId, shot_id: DbId) -> Option<Shot> {
        self.state
            .lock()
            .await
            .collections
            .get(&project_id)
            .and_then(|c| c.cache.get(shot_id).cloned())
    }

    /// A project's shots ordered by shot number.
    pub async fn snapshot(&self, project_id: DbId) -> Vec<Shot> {
        self.state
            .lock()
            .await
            .collections
            .get(&project_id)
            .map(|c| c.ordered())
            .unwrap_or_default()
    }

    /// Every cached collection, for persistence.
    pub async fn snapshot_all(&self) -> HashMap<DbId, Vec<Shot>> {
        self.state
            .lock()
            .await
            .collections
            .iter()
            .map(|(project_id, c)| (*project_id, c.ordered()))
            .collect()
    }

    /// Install persisted collections. Statuses stay `Idle` so the first
    /// load per project revalidates against the server.
    pub async fn seed(&self, collections: HashMap<DbId, Vec<Shot>>) {
        let mut state = self.state.lock().await;
        for (project_id, shots) in collections {
            state
                .collections
                .entry(project_id)
                .or_default()
                .cache
                .replace_all(shots);
        }
    }

    // -----------------------------------------------------------------------
    // Sync controller
    // -----------------------------------------------------------------------

    /// Load a project's shot set, subject to the coalescing rule. On
    /// success the cached collection is replaced entirely; on failure the
    /// stale collection is kept and the status moves to `Error`.
    pub async fn load(&self, project_id: DbId, force: bool) -> Result<(), SyncError> {
        {
            let mut state = self.state.lock().await;
            let collection = state.collections.entry(project_id).or_default();
            if !collection
                .status
                .needs_fetch(!collection.cache.is_empty(), force)
            {
                tracing::debug!(project_id, "Shot load coalesced (cache fresh)");
                return Ok(());
            }
            collection.status = SyncStatus::Syncing;
        }

        match self.api.list_shots(project_id).await {
            Ok(shots) => {
                let mut state = self.state.lock().await;
                let collection = state.collections.entry(project_id).or_default();
                let count = shots.len();
                collection.cache.replace_all(shots);
                collection.status = SyncStatus::Synced;
                tracing::info!(project_id, count, "Shots synced");
                Ok(())
            }
            Err(err) => {
                let mut state = self.state.lock().await;
                state.collections.entry(project_id).or_default().status = SyncStatus::Error;
                tracing::warn!(project_id, error = %err, "Shot load failed; keeping stale cache");
                Err(err)
            }
        }
    }

    /// Unconditional forced load for one project's shot set.
    pub async fn sync_with_server(&self, project_id: DbId) -> Result<(), SyncError> {
        self.load(project_id, true).await
    }

    // -----------------------------------------------------------------------
    // Optimistic mutations
    // -----------------------------------------------------------------------

    /// Create a shot, optionally at a one-based position (append when
    /// `None`). The shot appears in the cache immediately under a
    /// provisional id; a create failure removes it again.
    pub async fn create_shot(
        &self,
        project_id: DbId,
        fields: &CreateShot,
    ) -> Result<Shot, SyncError> {
        let provisional_id = {
            let mut state = self.state.lock().await;
            let id = state.next_provisional_id;
            state.next_provisional_id -= 1;
            let collection = state.collections.entry(project_id).or_default();

            // Claiming an occupied ordinal splices the new shot in front of
            // the incumbent: renumbering breaks the tie by id, and
            // provisional ids are negative.
            let member_count = collection.cache.len() as u32;
            let shot_number = fields
                .position
                .unwrap_or(member_count + 1)
                .clamp(1, member_count + 1);

            collection.cache.upsert(Shot {
                id,
                project_id,
                shot_number,
                title: fields.title.clone(),
                description: fields.description.clone(),
                status: fields.status,
                updated_at: chrono::Utc::now(),
            });
            collection.renumber();
            id
        };

        match self.api.create_shot(project_id, fields).await {
            Ok(created) => {
                let mut state = self.state.lock().await;
                let collection = state.collections.entry(project_id).or_default();
                collection.cache.remove(provisional_id);
                collection.cache.upsert(created.clone());
                collection.renumber();
                collection.status = SyncStatus::Synced;
                tracing::info!(project_id, shot_id = created.id, "Shot created");
                Ok(created)
            }
            Err(err) => {
                let mut state = self.state.lock().await;
                let collection = state.collections.entry(project_id).or_default();
                collection.cache.remove(provisional_id);
                collection.renumber();
                tracing::warn!(project_id, error = %err, "Shot create failed; provisional entry removed");
                Err(err)
            }
        }
    }

    /// Update a shot under its edit lock. The cache is untouched unless
    /// the lock is granted; the lock is released in all cases.
    pub async fn update_shot(
        &self,
        project_id: DbId,
        shot_id: DbId,
        patch: &ShotPatch,
    ) -> Result<(), SyncError> {
        if !self.locks.acquire_lock(shot_id).await {
            return Err(self.lock_denied(shot_id).await);
        }
        let result = self.update_locked(project_id, shot_id, patch).await;
        self.locks.release_lock(shot_id).await;
        result
    }

    async fn update_locked(
        &self,
        project_id: DbId,
        shot_id: DbId,
        patch: &ShotPatch,
    ) -> Result<(), SyncError> {
        {
            let mut state = self.state.lock().await;
            let collection = state.collections.entry(project_id).or_default();
            let Some(mut shot) = collection.cache.get(shot_id).cloned() else {
                return Err(SyncError::RemoteMutation(format!(
                    "shot {shot_id} is not in the local cache"
                )));
            };
            shot.apply_patch(patch);
            shot.touch(chrono::Utc::now());
            collection.cache.upsert(shot);
        }

        match self.api.update_shot(shot_id, patch).await {
            Ok(()) => {
                self.mark_synced(project_id).await;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(project_id, shot_id, error = %err, "Shot update rejected");
                self.rollback(project_id).await;
                Err(err)
            }
        }
    }

    /// Delete a shot under its edit lock, renumbering the remaining set.
    pub async fn delete_shot(&self, project_id: DbId, shot_id: DbId) -> Result<(), SyncError> {
        if !self.locks.acquire_lock(shot_id).await {
            return Err(self.lock_denied(shot_id).await);
        }
        let result = self.delete_locked(project_id, shot_id).await;
        self.locks.release_lock(shot_id).await;
        result
    }

    async fn delete_locked(&self, project_id: DbId, shot_id: DbId) -> Result<(), SyncError> {
        {
            let mut state = self.state.lock().await;
            let collection = state.collections.entry(project_id).or_default();
            collection.cache.remove(shot_id);
            collection.renumber();
        }

        match self.api.delete_shot(shot_id).await {
            Ok(()) => {
                self.mark_synced(project_id).await;
                tracing::info!(project_id, shot_id, "Shot deleted");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(project_id, shot_id, error = %err, "Shot delete rejected");
                self.rollback(project_id).await;
                Err(err)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Batch operations
    // -----------------------------------------------------------------------

    /// Delete several shots as one cache splice and one remote call.
    ///
    /// Refused up front if any target is locked by another user. On remote
    /// failure the whole aggregate is reloaded; there is no per-item
    /// partial commit.
    pub async fn batch_delete(&self, project_id: DbId, ids: &[DbId]) -> Result<(), SyncError> {
        self.ensure_none_locked(ids).await?;

        {
            let mut state = self.state.lock().await;
            let collection = state.collections.entry(project_id).or_default();
            for id in ids {
                collection.cache.remove(*id);
            }
            collection.renumber();
        }

        match self.api.batch_delete(ids).await {
            Ok(()) => {
                self.mark_synced(project_id).await;
                tracing::info!(project_id, count = ids.len(), "Shots batch-deleted");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(project_id, error = %err, "Batch delete rejected");
                self.rollback(project_id).await;
                Err(err)
            }
        }
    }

    /// Duplicate several shots. Provisional clones appear adjacent to
    /// their sources until the server returns the authoritative entities.
    pub async fn duplicate(&self, project_id: DbId, ids: &[DbId]) -> Result<Vec<Shot>, SyncError> {
        let provisional_ids: Vec<DbId> = {
            let mut state = self.state.lock().await;
            let mut provisional = Vec::with_capacity(ids.len());
            for source_id in ids {
                let clone = {
                    let collection = state.collections.entry(project_id).or_default();
                    collection.cache.get(*source_id).cloned()
                };
                let Some(mut clone) = clone else {
                    continue;
                };
                let id = state.next_provisional_id;
                state.next_provisional_id -= 1;
                clone.id = id;
                clone.updated_at = chrono::Utc::now();
                state
                    .collections
                    .entry(project_id)
                    .or_default()
                    .cache
                    .upsert(clone);
                provisional.push(id);
            }
            state
                .collections
                .entry(project_id)
                .or_default()
                .renumber();
            provisional
        };

        match self.api.duplicate(ids, project_id).await {
            Ok(created) => {
                let mut state = self.state.lock().await;
                let collection = state.collections.entry(project_id).or_default();
                for id in provisional_ids {
                    collection.cache.remove(id);
                }
                for shot in &created {
                    collection.cache.upsert(shot.clone());
                }
                collection.renumber();
                collection.status = SyncStatus::Synced;
                tracing::info!(project_id, count = created.len(), "Shots duplicated");
                Ok(created)
            }
            Err(err) => {
                tracing::warn!(project_id, error = %err, "Duplicate rejected");
                self.rollback(project_id).await;
                Err(err)
            }
        }
    }

    /// Install a complete new ordering for the project's shot set.
    ///
    /// `ordered_ids` positions become ordinals `1..=N`. Refused if any
    /// member is locked by another user.
    pub async fn reorder(&self, project_id: DbId, ordered_ids: &[DbId]) -> Result<(), SyncError> {
        self.ensure_none_locked(ordered_ids).await?;

        {
            let mut state = self.state.lock().await;
            let collection = state.collections.entry(project_id).or_default();
            Self::apply_ordering(collection, ordered_ids);
        }

        match self.api.reorder(ordered_ids, project_id).await {
            Ok(()) => {
                self.mark_synced(project_id).await;
                tracing::info!(project_id, "Shots reordered");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(project_id, error = %err, "Reorder rejected");
                self.rollback(project_id).await;
                Err(err)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Pushes
    // -----------------------------------------------------------------------

    /// Apply a server-confirmed change pushed by another client.
    pub async fn apply_push(&self, message: &ServerMessage) {
        match message {
            ServerMessage::EntityCreated { scope_id, entity }
            | ServerMessage::EntityUpdated { scope_id, entity } => {
                match serde_json::from_value::<Shot>(entity.clone()) {
                    Ok(shot) => {
                        let mut state = self.state.lock().await;
                        let collection = state.collections.entry(*scope_id).or_default();
                        collection.cache.upsert(shot);
                        collection.renumber();
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "Undecodable shot push ignored");
                    }
                }
            }
            ServerMessage::EntityDeleted {
                scope_id,
                entity_id,
            } => {
                let mut state = self.state.lock().await;
                let collection = state.collections.entry(*scope_id).or_default();
                collection.cache.remove(*entity_id);
                collection.renumber();
            }
            ServerMessage::EntitiesReordered {
                scope_id,
                ordered_ids,
            } => {
                let mut state = self.state.lock().await;
                let collection = state.collections.entry(*scope_id).or_default();
                Self::apply_ordering(collection, ordered_ids);
            }
            _ => {}
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn apply_ordering(collection: &mut ShotCollection, ordered_ids: &[DbId]) {
        let now = chrono::Utc::now();
        for (index, id) in ordered_ids.iter().enumerate() {
            if let Some(mut shot) = collection.cache.get(*id).cloned() {
                let ordinal = (index + 1) as u32;
                if shot.shot_number != ordinal {
                    shot.shot_number = ordinal;
                    shot.touch(now);
                    collection.cache.upsert(shot);
                }
            }
        }
        // Members missing from the ordering (a racing insert) fall to the
        // end via renumbering.
        collection.renumber();
    }

    async fn mark_synced(&self, project_id: DbId) {
        let mut state = self.state.lock().await;
        state.collections.entry(project_id).or_default().status = SyncStatus::Synced;
    }

    /// Discard speculative state by force-reloading the aggregate.
    async fn rollback(&self, project_id: DbId) {
        if let Err(err) = self.load(project_id, true).await {
            tracing::warn!(project_id, error = %err, "Rollback reload failed; cache is stale");
        }
    }

    /// Batch precondition: no target may be locked by another user.
    async fn ensure_none_locked(&self, ids: &[DbId]) -> Result<(), SyncError> {
        for id in ids {
            if let Some(lock) = self.locks.locked_by_other(*id).await {
                return Err(SyncError::LockDenied {
                    entity_id: *id,
                    holder_name: lock.holder_name,
                });
            }
        }
        Ok(())
    }

    async fn lock_denied(&self, shot_id: DbId) -> SyncError {
        match self.locks.locked_by_other(shot_id).await {
            Some(lock) => SyncError::LockDenied {
                entity_id: shot_id,
                holder_name: lock.holder_name,
            },
            None => SyncError::lock_timeout(shot_id),
        }
    }
}
