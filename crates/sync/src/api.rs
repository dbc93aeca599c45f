//! The consumed REST contract, expressed as traits so tests can inject
//! in-memory fakes and the stores never depend on a concrete transport.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use callsheet_core::shot::ShotStatus;
use callsheet_core::types::DbId;
use callsheet_core::{Project, ProjectPatch, Shot, ShotPatch, SyncError};

/// Fields for creating a project. The server assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProject {
    pub name: String,
    pub description: String,
}

/// Fields for creating a shot. The server assigns the id and the final
/// ordinal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateShot {
    pub title: String,
    pub description: String,
    pub status: ShotStatus,
    /// One-based position the shot should take within the project's set.
    /// `None` appends.
    pub position: Option<u32>,
}

/// CRUD contract for the projects collection.
#[async_trait]
pub trait ProjectApi: Send + Sync {
    async fn list_projects(&self) -> Result<Vec<Project>, SyncError>;

    async fn create_project(&self, fields: &CreateProject) -> Result<Project, SyncError>;

    /// Updates return no body; absence of an echo is treated as
    /// confirmation since the optimistic write is the accepted shape.
    async fn update_project(&self, id: DbId, patch: &ProjectPatch) -> Result<(), SyncError>;

    async fn delete_project(&self, id: DbId) -> Result<(), SyncError>;
}

/// CRUD and batch contract for a project's shot set.
#[async_trait]
pub trait ShotApi: Send + Sync {
    async fn list_shots(&self, project_id: DbId) -> Result<Vec<Shot>, SyncError>;

    async fn create_shot(&self, project_id: DbId, fields: &CreateShot) -> Result<Shot, SyncError>;

    async fn update_shot(&self, id: DbId, patch: &ShotPatch) -> Result<(), SyncError>;

    async fn delete_shot(&self, id: DbId) -> Result<(), SyncError>;

    /// Delete several shots in one round trip.
    async fn batch_delete(&self, ids: &[DbId]) -> Result<(), SyncError>;

    /// Duplicate several shots; the server returns the created clones.
    async fn duplicate(&self, ids: &[DbId], project_id: DbId) -> Result<Vec<Shot>, SyncError>;

    /// Persist a complete new ordering for the project's shot set.
    async fn reorder(&self, ids: &[DbId], project_id: DbId) -> Result<(), SyncError>;
}
