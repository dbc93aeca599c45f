//! Shared fakes for the integration suites: an in-memory REST backend and
//! an in-memory lock server, both with scriptable failures.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use callsheet_core::collaboration::PROJECTS_SCOPE;
use callsheet_core::shot::{renumber_shots, ShotStatus};
use callsheet_core::types::DbId;
use callsheet_core::{
    ClientMessage, Project, ProjectPatch, ServerMessage, Shot, ShotPatch, SyncError,
};
use callsheet_sync::api::{CreateProject, CreateShot, ProjectApi, ShotApi};
use callsheet_sync::locks::{LockCoordinator, LockTransport};

/// Route tracing output through the test harness. Idempotent.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn shot(id: DbId, project_id: DbId, number: u32, title: &str) -> Shot {
    Shot {
        id,
        project_id,
        shot_number: number,
        title: title.to_string(),
        description: String::new(),
        status: ShotStatus::Planned,
        updated_at: chrono::Utc::now(),
    }
}

pub fn project(id: DbId, name: &str) -> Project {
    Project {
        id,
        name: name.to_string(),
        description: String::new(),
        updated_at: chrono::Utc::now(),
    }
}

// ---------------------------------------------------------------------------
// In-memory shot backend
// ---------------------------------------------------------------------------

struct ShotBackend {
    shots: Vec<Shot>,
    next_id: DbId,
}

/// Behaves like the real server: assigns ids, keeps ordinals contiguous,
/// and can be scripted to fail loads or mutations.
pub struct InMemoryShotApi {
    state: Mutex<ShotBackend>,
    pub list_calls: AtomicUsize,
    pub fail_list: AtomicBool,
    pub fail_mutations: AtomicBool,
}

impl InMemoryShotApi {
    pub fn new(initial: Vec<Shot>) -> Arc<Self> {
        let next_id = initial.iter().map(|s| s.id).max().unwrap_or(0) + 1;
        Arc::new(Self {
            state: Mutex::new(ShotBackend {
                shots: initial,
                next_id,
            }),
            list_calls: AtomicUsize::new(0),
            fail_list: AtomicBool::new(false),
            fail_mutations: AtomicBool::new(false),
        })
    }

    /// Server-side view of one project's shots, ordered by ordinal.
    pub async fn server_shots(&self, project_id: DbId) -> Vec<Shot> {
        let state = self.state.lock().await;
        let mut shots: Vec<Shot> = state
            .shots
            .iter()
            .filter(|s| s.project_id == project_id)
            .cloned()
            .collect();
        shots.sort_by_key(|s| s.shot_number);
        shots
    }

    fn renumber_project(backend: &mut ShotBackend, project_id: DbId) {
        let mut members: Vec<Shot> = backend
            .shots
            .iter()
            .filter(|s| s.project_id == project_id)
            .cloned()
            .collect();
        renumber_shots(&mut members, chrono::Utc::now());
        backend.shots.retain(|s| s.project_id != project_id);
        backend.shots.extend(members);
    }

    fn mutation_guard(&self) -> Result<(), SyncError> {
        if self.fail_mutations.load(Ordering::SeqCst) {
            Err(SyncError::RemoteMutation("server rejected".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ShotApi for InMemoryShotApi {
    async fn list_shots(&self, project_id: DbId) -> Result<Vec<Shot>, SyncError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(SyncError::RemoteLoad("503".into()));
        }
        Ok(self.server_shots(project_id).await)
    }

    async fn create_shot(&self, project_id: DbId, fields: &CreateShot) -> Result<Shot, SyncError> {
        self.mutation_guard()?;
        let mut state = self.state.lock().await;
        let id = state.next_id;
        state.next_id += 1;

        let member_count = state
            .shots
            .iter()
            .filter(|s| s.project_id == project_id)
            .count() as u32;
        let shot_number = fields
            .position
            .unwrap_or(member_count + 1)
            .clamp(1, member_count + 1);

        // Claiming an occupied ordinal: shift incumbents up.
        for existing in state
            .shots
            .iter_mut()
            .filter(|s| s.project_id == project_id && s.shot_number >= shot_number)
        {
            existing.shot_number += 1;
        }
        state.shots.push(Shot {
            id,
            project_id,
            shot_number,
            title: fields.title.clone(),
            description: fields.description.clone(),
            status: fields.status,
            updated_at: chrono::Utc::now(),
        });
        InMemoryShotApi::renumber_project(&mut state, project_id);

        let created = state
            .shots
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| SyncError::RemoteMutation("create lost".into()))?;
        Ok(created)
    }

    async fn update_shot(&self, id: DbId, patch: &ShotPatch) -> Result<(), SyncError> {
        self.mutation_guard()?;
        let mut state = self.state.lock().await;
        if let Some(shot) = state.shots.iter_mut().find(|s| s.id == id) {
            shot.apply_patch(patch);
            shot.updated_at = chrono::Utc::now();
        }
        Ok(())
    }

    async fn delete_shot(&self, id: DbId) -> Result<(), SyncError> {
        self.mutation_guard()?;
        let mut state = self.state.lock().await;
        let project_id = state
            .shots
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.project_id);
        state.shots.retain(|s| s.id != id);
        if let Some(project_id) = project_id {
            InMemoryShotApi::renumber_project(&mut state, project_id);
        }
        Ok(())
    }

    async fn batch_delete(&self, ids: &[DbId]) -> Result<(), SyncError> {
        self.mutation_guard()?;
        let mut state = self.state.lock().await;
        let projects: Vec<DbId> = state
            .shots
            .iter()
            .filter(|s| ids.contains(&s.id))
            .map(|s| s.project_id)
            .collect();
        state.shots.retain(|s| !ids.contains(&s.id));
        for project_id in projects {
            InMemoryShotApi::renumber_project(&mut state, project_id);
        }
        Ok(())
    }

    async fn duplicate(&self, ids: &[DbId], project_id: DbId) -> Result<Vec<Shot>, SyncError> {
        self.mutation_guard()?;
        let mut state = self.state.lock().await;
        let mut created = Vec::new();
        for source_id in ids {
            let Some(mut clone) = state.shots.iter().find(|s| s.id == *source_id).cloned()
            else {
                continue;
            };
            clone.id = state.next_id;
            state.next_id += 1;
            clone.updated_at = chrono::Utc::now();
            state.shots.push(clone.clone());
            created.push(clone);
        }
        InMemoryShotApi::renumber_project(&mut state, project_id);
        // Return the clones with their final ordinals.
        let final_clones: Vec<Shot> = created
            .iter()
            .filter_map(|c| state.shots.iter().find(|s| s.id == c.id).cloned())
            .collect();
        Ok(final_clones)
    }

    async fn reorder(&self, ids: &[DbId], project_id: DbId) -> Result<(), SyncError> {
        self.mutation_guard()?;
        let mut state = self.state.lock().await;
        for (index, id) in ids.iter().enumerate() {
            if let Some(shot) = state.shots.iter_mut().find(|s| s.id == *id) {
                shot.shot_number = (index + 1) as u32;
            }
        }
        InMemoryShotApi::renumber_project(&mut state, project_id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory project backend
// ---------------------------------------------------------------------------

pub struct InMemoryProjectApi {
    projects: Mutex<Vec<Project>>,
    next_id: Mutex<DbId>,
    pub list_calls: AtomicUsize,
    pub fail_list: AtomicBool,
    pub fail_mutations: AtomicBool,
}

impl InMemoryProjectApi {
    pub fn new(initial: Vec<Project>) -> Arc<Self> {
        let next_id = initial.iter().map(|p| p.id).max().unwrap_or(0) + 1;
        Arc::new(Self {
            projects: Mutex::new(initial),
            next_id: Mutex::new(next_id),
            list_calls: AtomicUsize::new(0),
            fail_list: AtomicBool::new(false),
            fail_mutations: AtomicBool::new(false),
        })
    }

    fn mutation_guard(&self) -> Result<(), SyncError> {
        if self.fail_mutations.load(Ordering::SeqCst) {
            Err(SyncError::RemoteMutation("server rejected".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ProjectApi for InMemoryProjectApi {
    async fn list_projects(&self) -> Result<Vec<Project>, SyncError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(SyncError::RemoteLoad("503".into()));
        }
        Ok(self.projects.lock().await.clone())
    }

    async fn create_project(&self, fields: &CreateProject) -> Result<Project, SyncError> {
        self.mutation_guard()?;
        let mut next_id = self.next_id.lock().await;
        let created = Project {
            id: *next_id,
            name: fields.name.clone(),
            description: fields.description.clone(),
            updated_at: chrono::Utc::now(),
        };
        *next_id += 1;
        self.projects.lock().await.push(created.clone());
        Ok(created)
    }

    async fn update_project(&self, id: DbId, patch: &ProjectPatch) -> Result<(), SyncError> {
        self.mutation_guard()?;
        let mut projects = self.projects.lock().await;
        if let Some(project) = projects.iter_mut().find(|p| p.id == id) {
            project.apply_patch(patch);
            project.updated_at = chrono::Utc::now();
        }
        Ok(())
    }

    async fn delete_project(&self, id: DbId) -> Result<(), SyncError> {
        self.mutation_guard()?;
        self.projects.lock().await.retain(|p| p.id != id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory lock server
// ---------------------------------------------------------------------------

/// Authoritative lock table shared by several client transports. Grants
/// are broadcast to every registered coordinator; denied requests get no
/// response at all, so the requester times out — matching the real
/// server's behaviour.
pub struct LockServer {
    scope_id: DbId,
    locks: Mutex<HashMap<DbId, DbId>>,
    coordinators: Mutex<Vec<Arc<LockCoordinator>>>,
}

impl LockServer {
    pub fn new(scope_id: DbId) -> Arc<Self> {
        Arc::new(Self {
            scope_id,
            locks: Mutex::new(HashMap::new()),
            coordinators: Mutex::new(Vec::new()),
        })
    }

    pub async fn register(&self, coordinator: Arc<LockCoordinator>) {
        self.coordinators.lock().await.push(coordinator);
    }

    async fn broadcast(&self, message: ServerMessage) {
        for coordinator in self.coordinators.lock().await.iter() {
            coordinator.handle_message(&message).await;
        }
    }

    /// Current holder of an entity's lock, per the server's table.
    pub async fn holder_of(&self, entity_id: DbId) -> Option<DbId> {
        self.locks.lock().await.get(&entity_id).copied()
    }

    /// Drop every lock held by one user, as the server does when that
    /// user's connection closes.
    pub async fn drop_locks_of(&self, user_id: DbId) {
        let released: Vec<DbId> = {
            let mut locks = self.locks.lock().await;
            let released = locks
                .iter()
                .filter(|(_, holder)| **holder == user_id)
                .map(|(entity_id, _)| *entity_id)
                .collect::<Vec<_>>();
            locks.retain(|_, holder| *holder != user_id);
            released
        };
        for entity_id in released {
            self.broadcast(ServerMessage::LockReleased {
                entity_id,
                scope_id: self.scope_id,
            })
            .await;
        }
    }
}

/// One client's outbound half, wired to the shared [`LockServer`].
pub struct ClientTransport {
    server: Arc<LockServer>,
    user_id: DbId,
    user_name: String,
    pub connected: Arc<AtomicBool>,
}

impl ClientTransport {
    pub fn new(server: Arc<LockServer>, user_id: DbId, user_name: &str) -> Arc<Self> {
        Arc::new(Self {
            server,
            user_id,
            user_name: user_name.to_string(),
            connected: Arc::new(AtomicBool::new(true)),
        })
    }
}

#[async_trait]
impl LockTransport for ClientTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send(&self, message: ClientMessage) -> Result<(), SyncError> {
        if !self.is_connected() {
            return Err(SyncError::ConnectionLost);
        }
        match message {
            ClientMessage::AcquireLock { entity_id } => {
                let granted = {
                    let mut locks = self.server.locks.lock().await;
                    if locks.contains_key(&entity_id) {
                        false
                    } else {
                        locks.insert(entity_id, self.user_id);
                        true
                    }
                };
                if granted {
                    self.server
                        .broadcast(ServerMessage::LockAcquired {
                            entity_id,
                            holder_id: self.user_id,
                            holder_name: self.user_name.clone(),
                            scope_id: self.server.scope_id,
                        })
                        .await;
                }
                // A denied request gets no reply; the requester times out.
            }
            ClientMessage::ReleaseLock { entity_id } => {
                let released = {
                    let mut locks = self.server.locks.lock().await;
                    if locks.get(&entity_id) == Some(&self.user_id) {
                        locks.remove(&entity_id);
                        true
                    } else {
                        false
                    }
                };
                if released {
                    self.server
                        .broadcast(ServerMessage::LockReleased {
                            entity_id,
                            scope_id: self.server.scope_id,
                        })
                        .await;
                }
            }
            ClientMessage::Subscribe { .. } | ClientMessage::Unsubscribe { .. } => {}
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Auto-granting transport (single-client suites)
// ---------------------------------------------------------------------------

/// Grants every lock request to the one coordinator it is wired to, for
/// suites that exercise store behaviour rather than lock contention.
pub struct AutoGrantTransport {
    pub connected: Arc<AtomicBool>,
    pub sent: Mutex<Vec<ClientMessage>>,
    coordinator: Mutex<Option<Arc<LockCoordinator>>>,
}

impl AutoGrantTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connected: Arc::new(AtomicBool::new(true)),
            sent: Mutex::new(Vec::new()),
            coordinator: Mutex::new(None),
        })
    }

    pub async fn wire(&self, coordinator: Arc<LockCoordinator>) {
        *self.coordinator.lock().await = Some(coordinator);
    }

    /// Make the wired coordinator observe another user's lock.
    pub async fn push_foreign_lock(&self, entity_id: DbId, holder_id: DbId, holder_name: &str) {
        if let Some(coordinator) = self.coordinator.lock().await.clone() {
            coordinator
                .handle_message(&ServerMessage::LockAcquired {
                    entity_id,
                    holder_id,
                    holder_name: holder_name.to_string(),
                    scope_id: PROJECTS_SCOPE,
                })
                .await;
        }
    }
}

#[async_trait]
impl LockTransport for AutoGrantTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send(&self, message: ClientMessage) -> Result<(), SyncError> {
        if !self.is_connected() {
            return Err(SyncError::ConnectionLost);
        }
        self.sent.lock().await.push(message.clone());
        if let ClientMessage::AcquireLock { entity_id } = message {
            if let Some(coordinator) = self.coordinator.lock().await.clone() {
                coordinator
                    .handle_message(&ServerMessage::LockAcquired {
                        entity_id,
                        holder_id: coordinator.user_id(),
                        holder_name: "self".to_string(),
                        scope_id: PROJECTS_SCOPE,
                    })
                    .await;
            }
        }
        Ok(())
    }
}
