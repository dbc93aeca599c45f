//! `reqwest` implementation of the REST contract.
//!
//! The server wraps every response body in `{ "data": … }`. Transport and
//! HTTP-status failures are converted into the sync error taxonomy at this
//! boundary: list calls surface `RemoteLoad`, mutations `RemoteMutation`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use callsheet_core::types::DbId;
use callsheet_core::{Project, ProjectPatch, Shot, ShotPatch, SyncError};

use crate::api::{CreateProject, CreateShot, ProjectApi, ShotApi};

/// Standard response envelope.
#[derive(Debug, Deserialize)]
struct DataResponse<T> {
    data: T,
}

/// HTTP client for the projects/shots API.
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{path}", self.base_url.trim_end_matches('/'))
    }

    async fn read_data<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, reqwest::Error> {
        let envelope: DataResponse<T> = response.error_for_status()?.json().await?;
        Ok(envelope.data)
    }

    /// 2xx with any (or no) body counts as confirmation.
    fn confirm(response: reqwest::Response) -> Result<(), reqwest::Error> {
        response.error_for_status().map(|_| ())
    }
}

fn load_err(err: reqwest::Error) -> SyncError {
    SyncError::RemoteLoad(err.to_string())
}

fn mutation_err(err: reqwest::Error) -> SyncError {
    SyncError::RemoteMutation(err.to_string())
}

#[async_trait]
impl ProjectApi for RestClient {
    async fn list_projects(&self) -> Result<Vec<Project>, SyncError> {
        let response = self
            .http
            .get(self.url("/projects"))
            .send()
            .await
            .map_err(load_err)?;
        Self::read_data(response).await.map_err(load_err)
    }

    async fn create_project(&self, fields: &CreateProject) -> Result<Project, SyncError> {
        let response = self
            .http
            .post(self.url("/projects"))
            .json(fields)
            .send()
            .await
            .map_err(mutation_err)?;
        Self::read_data(response).await.map_err(mutation_err)
    }

    async fn update_project(&self, id: DbId, patch: &ProjectPatch) -> Result<(), SyncError> {
        let response = self
            .http
            .patch(self.url(&format!("/projects/{id}")))
            .json(patch)
            .send()
            .await
            .map_err(mutation_err)?;
        Self::confirm(response).map_err(mutation_err)
    }

    async fn delete_project(&self, id: DbId) -> Result<(), SyncError> {
        let response = self
            .http
            .delete(self.url(&format!("/projects/{id}")))
            .send()
            .await
            .map_err(mutation_err)?;
        Self::confirm(response).map_err(mutation_err)
    }
}

#[async_trait]
impl ShotApi for RestClient {
    async fn list_shots(&self, project_id: DbId) -> Result<Vec<Shot>, SyncError> {
        let response = self
            .http
            .get(self.url(&format!("/projects/{project_id}/shots")))
            .send()
            .await
            .map_err(load_err)?;
        Self::read_data(response).await.map_err(load_err)
    }

    async fn create_shot(&self, project_id: DbId, fields: &CreateShot) -> Result<Shot, SyncError> {
        let response = self
            .http
            .post(self.url(&format!("/projects/{project_id}/shots")))
            .json(fields)
            .send()
            .await
            .map_err(mutation_err)?;
        Self::read_data(response).await.map_err(mutation_err)
    }

    async fn update_shot(&self, id: DbId, patch: &ShotPatch) -> Result<(), SyncError> {
        let response = self
            .http
            .patch(self.url(&format!("/shots/{id}")))
            .json(patch)
            .send()
            .await
            .map_err(mutation_err)?;
        Self::confirm(response).map_err(mutation_err)
    }

    async fn delete_shot(&self, id: DbId) -> Result<(), SyncError> {
        let response = self
            .http
            .delete(self.url(&format!("/shots/{id}")))
            .send()
            .await
            .map_err(mutation_err)?;
        Self::confirm(response).map_err(mutation_err)
    }

    async fn batch_delete(&self, ids: &[DbId]) -> Result<(), SyncError> {
        let response = self
            .http
            .post(self.url("/shots/batch-delete"))
            .json(&json!({ "ids": ids }))
            .send()
            .await
            .map_err(mutation_err)?;
        Self::confirm(response).map_err(mutation_err)
    }

    async fn duplicate(&self, ids: &[DbId], project_id: DbId) -> Result<Vec<Shot>, SyncError> {
        let response = self
            .http
            .post(self.url(&format!("/projects/{project_id}/shots/duplicate")))
            .json(&json!({ "ids": ids }))
            .send()
            .await
            .map_err(mutation_err)?;
        Self::read_data(response).await.map_err(mutation_err)
    }

    async fn reorder(&self, ids: &[DbId], project_id: DbId) -> Result<(), SyncError> {
        let response = self
            .http
            .put(self.url(&format!("/projects/{project_id}/shots/order")))
            .json(&json!({ "ids": ids }))
            .send()
            .await
            .map_err(mutation_err)?;
        Self::confirm(response).map_err(mutation_err)
    }
}
