//! Buildpack API implementation

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::client::Client;
use super::common::{ListOptions, Metadata, MetadataRequest};
use super::error::ApiError;

#[derive(Debug, Clone, Deserialize)]
pub struct Buildpack {
    pub guid: String,
    pub name: String,
    #[serde(default)]
    pub stack: Option<String>,
    pub position: i64,
    pub enabled: bool,
    pub locked: bool,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub state: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Body of both create and update, unset fields are left to the platform
#[derive(Debug, Default, Serialize)]
pub struct BuildpackRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(skip_serializing_if = "MetadataRequest::is_empty")]
    pub metadata: MetadataRequest,
}

/// Buildpacks API for buildpack operations
pub struct BuildpacksApi<'a> {
    client: &'a Client,
}

impl<'a> BuildpacksApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /v3/buildpacks
    pub async fn list(&self, options: &ListOptions) -> Result<Vec<Buildpack>, ApiError> {
        self.client.list_all("/v3/buildpacks", options).await
    }

    /// GET /v3/buildpacks/{guid}
    pub async fn get(&self, guid: &str) -> Result<Buildpack, ApiError> {
        self.client.get(&format!("/v3/buildpacks/{}", guid)).await
    }

    /// POST /v3/buildpacks
    pub async fn create(&self, request: &BuildpackRequest) -> Result<Buildpack, ApiError> {
        self.client.post("/v3/buildpacks", request).await
    }

    /// PATCH /v3/buildpacks/{guid}
    pub async fn update(&self, guid: &str, request: &BuildpackRequest) -> Result<Buildpack, ApiError> {
        self.client
            .patch(&format!("/v3/buildpacks/{}", guid), request)
            .await
    }

    /// POST /v3/buildpacks/{guid}/upload and wait for the processing job
    pub async fn upload(&self, guid: &str, path: &Path) -> Result<Buildpack, ApiError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| {
                ApiError::InvalidInput(format!("{} is not a file path", path.display()))
            })?;
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/zip")?;
        let form = reqwest::multipart::Form::new().part("bits", part);

        let response = self
            .client
            .post_multipart::<Buildpack>(&format!("/v3/buildpacks/{}/upload", guid), form)
            .await?;
        match self.client.complete(response).await? {
            Some(buildpack) => Ok(buildpack),
            None => self.get(guid).await,
        }
    }

    /// DELETE /v3/buildpacks/{guid}, waits for the deletion job
    pub async fn delete(&self, guid: &str) -> Result<(), ApiError> {
        self.client
            .delete_and_wait(&format!("/v3/buildpacks/{}", guid))
            .await
    }
}
