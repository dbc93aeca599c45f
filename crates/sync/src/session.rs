//! The session service object.
//!
//! Consumers hold a `Arc<Session>` instead of reaching into ambient
//! global state. The session owns the stores and the lock coordinator,
//! routes inbound pushes to whichever component they belong to, manages
//! scope subscriptions on project switches, and saves/restores the
//! persisted local state.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use callsheet_core::collaboration::{ClientMessage, PROJECTS_SCOPE};
use callsheet_core::types::{DbId, Timestamp};
use callsheet_core::{ServerMessage, SyncError};

use crate::api::{ProjectApi, ShotApi};
use crate::locks::{LockCoordinator, LockTransport};
use crate::persistence::{PersistedState, StateFile, ViewMode};
use crate::projects::ProjectStore;
use crate::shots::ShotStore;
use crate::status::SyncStatus;

struct SessionState {
    active_project: Option<DbId>,
    view_mode: ViewMode,
    last_synced_at: Option<Timestamp>,
}

/// Owns the sync stores and the lock coordinator, and dispatches inbound
/// pushes scoped to the current working context.
pub struct Session {
    pub projects: ProjectStore,
    pub shots: ShotStore,
    pub locks: Arc<LockCoordinator>,
    transport: Arc<dyn LockTransport>,
    state_file: StateFile,
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new(
        project_api: Arc<dyn ProjectApi>,
        shot_api: Arc<dyn ShotApi>,
        transport: Arc<dyn LockTransport>,
        user_id: DbId,
        state_file: StateFile,
    ) -> Arc<Self> {
        let locks = Arc::new(LockCoordinator::new(user_id, transport.clone()));
        Arc::new(Self {
            projects: ProjectStore::new(project_api, locks.clone()),
            shots: ShotStore::new(shot_api, locks.clone()),
            locks,
            transport,
            state_file,
            state: Mutex::new(SessionState {
                active_project: None,
                view_mode: ViewMode::default(),
                last_synced_at: None,
            }),
        })
    }

    // -----------------------------------------------------------------------
    // Scope management
    // -----------------------------------------------------------------------

    pub async fn active_project(&self) -> Option<DbId> {
        self.state.lock().await.active_project
    }

    /// Switch the working context to another project.
    ///
    /// Locks held under the previous context are released best-effort and
    /// the observation table starts fresh; the socket subscription follows
    /// the new scope. The new project's shots are loaded through the
    /// normal coalescing rule.
    pub async fn set_active_project(&self, project_id: DbId) -> Result<(), SyncError> {
        let previous = {
            let mut state = self.state.lock().await;
            state.active_project.replace(project_id)
        };

        if previous == Some(project_id) {
            return self.shots.load(project_id, false).await;
        }

        self.locks.set_active_scope(project_id).await;

        if let Some(previous) = previous {
            let _ = self
                .transport
                .send(ClientMessage::Unsubscribe { scope_id: previous })
                .await;
        }
        if self
            .transport
            .send(ClientMessage::Subscribe {
                scope_id: project_id,
            })
            .await
            .is_err()
        {
            tracing::debug!(project_id, "Subscribe not delivered (disconnected)");
        }

        tracing::info!(project_id, "Active project switched");
        self.shots.load(project_id, false).await
    }

    pub async fn view_mode(&self) -> ViewMode {
        self.state.lock().await.view_mode
    }

    pub async fn set_view_mode(&self, view_mode: ViewMode) {
        self.state.lock().await.view_mode = view_mode;
    }

    pub async fn last_synced_at(&self) -> Option<Timestamp> {
        self.state.lock().await.last_synced_at
    }

    // -----------------------------------------------------------------------
    // Inbound pushes
    // -----------------------------------------------------------------------

    /// Route one inbound push.
    ///
    /// Lock messages go to the coordinator; entity messages go to the
    /// store owning their scope. Pushes for scopes other than the projects
    /// collection or the active project are ignored.
    pub async fn handle_message(&self, message: &ServerMessage) {
        match message {
            ServerMessage::LockAcquired { .. } | ServerMessage::LockReleased { .. } => {
                self.locks.handle_message(message).await;
            }
            _ => {
                let scope_id = message.scope_id();
                if scope_id == PROJECTS_SCOPE {
                    self.projects.apply_push(message).await;
                } else if self.active_project().await == Some(scope_id) {
                    self.shots.apply_push(message).await;
                } else {
                    tracing::trace!(scope_id, "Ignoring push for inactive scope");
                }
            }
        }
    }

    /// Spawn a task draining inbound pushes into [`handle_message`](Self::handle_message).
    pub fn spawn_pump(
        self: &Arc<Self>,
        mut messages: mpsc::UnboundedReceiver<ServerMessage>,
    ) -> JoinHandle<()> {
        let session = self.clone();
        tokio::spawn(async move {
            while let Some(message) = messages.recv().await {
                session.handle_message(&message).await;
            }
            tracing::debug!("Push pump stopped");
        })
    }

    // -----------------------------------------------------------------------
    // Connection lifecycle
    // -----------------------------------------------------------------------

    /// A fresh connection is open: re-subscribe the working context and
    /// resynchronize anything stale. Lock state is not reasserted — locks
    /// held before the drop stay forfeited.
    pub async fn connection_opened(&self) {
        if self
            .transport
            .send(ClientMessage::Subscribe {
                scope_id: PROJECTS_SCOPE,
            })
            .await
            .is_err()
        {
            tracing::debug!("Projects subscribe not delivered");
        }
        if let Some(project_id) = self.active_project().await {
            let _ = self
                .transport
                .send(ClientMessage::Subscribe {
                    scope_id: project_id,
                })
                .await;
        }
        self.resync_if_stale().await;
    }

    /// The connection dropped: all lock ownership is forfeited. The next
    /// open or online transition drives resynchronization.
    pub async fn connection_closed(&self) {
        self.locks.connection_lost().await;
    }

    /// Force-sync every collection whose status is not already `Synced`.
    /// Errors are logged, not propagated — the caller of the next read
    /// sees the `Error` status and decides whether to retry.
    pub async fn resync_if_stale(&self) {
        let mut synced_something = false;

        if self.projects.status().await != SyncStatus::Synced {
            match self.projects.sync_with_server().await {
                Ok(()) => synced_something = true,
                Err(err) => tracing::warn!(error = %err, "Project resync failed"),
            }
        }

        if let Some(project_id) = self.active_project().await {
            if self.shots.status(project_id).await != SyncStatus::Synced {
                match self.shots.sync_with_server(project_id).await {
                    Ok(()) => synced_something = true,
                    Err(err) => {
                        tracing::warn!(project_id, error = %err, "Shot resync failed");
                    }
                }
            }
        }

        if synced_something {
            self.state.lock().await.last_synced_at = Some(chrono::Utc::now());
        }
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Restore caches and preferences from the state file. Sync statuses
    /// and lock state start cold regardless of what was on disk.
    pub async fn restore(&self) {
        let persisted = self.state_file.load();

        self.projects.seed(persisted.projects).await;
        self.shots.seed(persisted.shots_by_project).await;

        let mut state = self.state.lock().await;
        state.active_project = persisted.active_project_id;
        state.view_mode = persisted.view_mode;
        state.last_synced_at = persisted.last_synced_at;

        if let Some(project_id) = state.active_project {
            drop(state);
            self.locks.set_active_scope(project_id).await;
        }
    }

    /// Persist caches and preferences to the state file.
    pub async fn save(&self) -> Result<(), SyncError> {
        let (active_project, view_mode, last_synced_at) = {
            let state = self.state.lock().await;
            (state.active_project, state.view_mode, state.last_synced_at)
        };

        self.state_file.save(&PersistedState {
            projects: self.projects.snapshot().await,
            shots_by_project: self.shots.snapshot_all().await,
            active_project_id: active_project,
            last_synced_at,
            view_mode,
        })
    }
}
