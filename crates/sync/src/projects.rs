//! Project collection store: load/refresh cycle and optimistic mutations.
//!
//! The store owns its cache exclusively. Consumers read snapshots and
//! issue intents; they never reach into the cache. Mutations are applied
//! locally first, then confirmed remotely; a failed confirmation is
//! recovered by discarding the speculative state and force-reloading the
//! whole collection (rollback-by-reload), never by patching backwards.

use std::sync::Arc;

use tokio::sync::Mutex;

use callsheet_core::types::DbId;
use callsheet_core::{Project, ProjectPatch, ServerMessage, SyncError};

use crate::api::{CreateProject, ProjectApi};
use crate::cache::{CachedEntity, EntityCache};
use crate::locks::LockCoordinator;
use crate::status::SyncStatus;

struct ProjectState {
    cache: EntityCache<Project>,
    status: SyncStatus,
    /// Ids handed to optimistic creates before the server assigns a real
    /// one. Negative so they can never collide with server ids.
    next_provisional_id: DbId,
}

/// Store for the projects collection.
pub struct ProjectStore {
    api: Arc<dyn ProjectApi>,
    locks: Arc<LockCoordinator>,
    state: Mutex<ProjectState>,
}

impl ProjectStore {
    pub fn new(api: Arc<dyn ProjectApi>, locks: Arc<LockCoordinator>) -> Self {
        Self {
            api,
            locks,
            state: Mutex::new(ProjectState {
                cache: EntityCache::new(),
                status: SyncStatus::Idle,
                next_provisional_id: -1,
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn status(&self) -> SyncStatus {
        self.state.lock().await.status
    }

    pub async fn get(&self, id: DbId) -> Option<Project> {
        self.state.lock().await.cache.get(id).cloned()
    }

    /// All cached projects, ordered by id.
    pub async fn snapshot(&self) -> Vec<Project> {
        self.state.lock().await.cache.snapshot()
    }

    /// Install persisted cache contents. Leaves the status at `Idle` so
    /// the first load after a restart revalidates against the server.
    pub async fn seed(&self, projects: Vec<Project>) {
        self.state.lock().await.cache.replace_all(projects);
    }

    // -----------------------------------------------------------------------
    // Sync controller
    // -----------------------------------------------------------------------

    /// Load the projects list.
    ///
    /// When the cache is populated, the status is `Synced`, and `force` is
    /// false, this returns immediately without a network call. Otherwise
    /// the remote list replaces the cached collection entirely. On failure
    /// the status moves to `Error` but prior cache contents are retained
    /// (stale-but-available); no automatic retry is scheduled.
    pub async fn load(&self, force: bool) -> Result<(), SyncError> {
        {
            let mut state = self.state.lock().await;
            if !state.status.needs_fetch(!state.cache.is_empty(), force) {
                tracing::debug!("Project load coalesced (cache fresh)");
                return Ok(());
            }
            state.status = SyncStatus::Syncing;
        }

        match self.api.list_projects().await {
            Ok(projects) => {
                let mut state = self.state.lock().await;
                let count = projects.len();
                state.cache.replace_all(projects);
                state.status = SyncStatus::Synced;
                tracing::info!(count, "Projects synced");
                Ok(())
            }
            Err(err) => {
                self.state.lock().await.status = SyncStatus::Error;
                tracing::warn!(error = %err, "Project load failed; keeping stale cache");
                Err(err)
            }
        }
    }

    /// Unconditional forced load. Used on reconnect and manual refresh.
    pub async fn sync_with_server(&self) -> Result<(), SyncError> {
        self.load(true).await
    }

    // -----------------------------------------------------------------------
    // Optimistic mutations
    // -----------------------------------------------------------------------

    /// Create a project: optimistic insert under a provisional id, then
    /// swap in the server's authoritative entity. A create failure removes
    /// the provisional entity — no partial commit.
    pub async fn create_project(&self, fields: &CreateProject) -> Result<Project, SyncError> {
        let provisional_id = {
            let mut state = self.state.lock().await;
            let id = state.next_provisional_id;
            state.next_provisional_id -= 1;
            state.cache.upsert(Project {
                id,
                name: fields.name.clone(),
                description: fields.description.clone(),
                updated_at: chrono::Utc::now(),
            });
            id
        };

        match self.api.create_project(fields).await {
            Ok(created) => {
                let mut state = self.state.lock().await;
                state.cache.remove(provisional_id);
                state.cache.upsert(created.clone());
                state.status = SyncStatus::Synced;
                tracing::info!(project_id = created.id, "Project created");
                Ok(created)
            }
            Err(err) => {
                self.state.lock().await.cache.remove(provisional_id);
                tracing::warn!(error = %err, "Project create failed; provisional entry removed");
                Err(err)
            }
        }
    }

    /// Update a project under its edit lock.
    ///
    /// The lock must be acquired before the cache is touched; on denial
    /// the cache is left exactly as it was. The lock is released in all
    /// cases, success or failure.
    pub async fn update_project(&self, id: DbId, patch: &ProjectPatch) -> Result<(), SyncError> {
        if !self.locks.acquire_lock(id).await {
            return Err(self.lock_denied(id).await);
        }
        let result = self.update_locked(id, patch).await;
        self.locks.release_lock(id).await;
        result
    }

    async fn update_locked(&self, id: DbId, patch: &ProjectPatch) -> Result<(), SyncError> {
        {
            let mut state = self.state.lock().await;
            let Some(mut project) = state.cache.get(id).cloned() else {
                return Err(SyncError::RemoteMutation(format!(
                    "project {id} is not in the local cache"
                )));
            };
            project.apply_patch(patch);
            project.touch(chrono::Utc::now());
            state.cache.upsert(project);
        }

        match self.api.update_project(id, patch).await {
            Ok(()) => {
                // The optimistic write is the accepted shape; nothing to
                // reconcile.
                self.state.lock().await.status = SyncStatus::Synced;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(project_id = id, error = %err, "Project update rejected");
                self.rollback().await;
                Err(err)
            }
        }
    }

    /// Delete a project under its edit lock.
    pub async fn delete_project(&self, id: DbId) -> Result<(), SyncError> {
        if !self.locks.acquire_lock(id).await {
            return Err(self.lock_denied(id).await);
        }
        let result = self.delete_locked(id).await;
        self.locks.release_lock(id).await;
        result
    }

    async fn delete_locked(&self, id: DbId) -> Result<(), SyncError> {
        self.state.lock().await.cache.remove(id);

        match self.api.delete_project(id).await {
            Ok(()) => {
                self.state.lock().await.status = SyncStatus::Synced;
                tracing::info!(project_id = id, "Project deleted");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(project_id = id, error = %err, "Project delete rejected");
                self.rollback().await;
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
            ServerMessage::EntityCreated { entity, .. }
            | ServerMessage::EntityUpdated { entity, .. } => {
                match serde_json::from_value::<Project>(entity.clone()) {
                    Ok(project) => {
                        self.state.lock().await.cache.upsert(project);
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "Undecodable project push ignored");
                    }
                }
            }
            ServerMessage::EntityDeleted { entity_id, .. } => {
                self.state.lock().await.cache.remove(*entity_id);
            }
            _ => {}
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Discard speculative state by force-reloading the whole collection.
    /// A failed reload leaves the status at `Error` with the stale cache.
    async fn rollback(&self) {
        if let Err(err) = self.load(true).await {
            tracing::warn!(error = %err, "Rollback reload failed; cache is stale");
        }
    }

    async fn lock_denied(&self, id: DbId) -> SyncError {
        match self.locks.locked_by_other(id).await {
            Some(lock) => SyncError::LockDenied {
                entity_id: id,
                holder_name: lock.holder_name,
            },
            None => SyncError::lock_timeout(id),
        }
    }
}
