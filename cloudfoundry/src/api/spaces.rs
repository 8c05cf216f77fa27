//! Space API implementation

use serde::{Deserialize, Serialize};

use super::client::Client;
use super::common::{ListOptions, Metadata, MetadataRequest, ToOneRelationship};
use super::error::ApiError;

#[derive(Debug, Clone, Deserialize)]
pub struct Space {
    pub guid: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
    pub relationships: SpaceRelationships,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SpaceRelationships {
    pub organization: ToOneRelationship,
    #[serde(default, skip_serializing)]
    pub quota: ToOneRelationship,
}

#[derive(Debug, Serialize)]
pub struct CreateSpaceRequest {
    pub name: String,
    pub relationships: SpaceRelationships,
    #[serde(skip_serializing_if = "MetadataRequest::is_empty")]
    pub metadata: MetadataRequest,
}

#[derive(Debug, Default, Serialize)]
pub struct UpdateSpaceRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "MetadataRequest::is_empty")]
    pub metadata: MetadataRequest,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpaceFeature {
    #[serde(default)]
    pub name: String,
    pub enabled: bool,
}

/// Spaces API for space operations
pub struct SpacesApi<'a> {
    client: &'a Client,
}

impl<'a> SpacesApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /v3/spaces
    pub async fn list(&self, options: &ListOptions) -> Result<Vec<Space>, ApiError> {
        self.client.list_all("/v3/spaces", options).await
    }

    /// GET /v3/spaces/{guid}
    pub async fn get(&self, guid: &str) -> Result<Space, ApiError> {
        self.client.get(&format!("/v3/spaces/{}", guid)).await
    }

    /// POST /v3/spaces
    pub async fn create(&self, request: &CreateSpaceRequest) -> Result<Space, ApiError> {
        self.client.post("/v3/spaces", request).await
    }

    /// PATCH /v3/spaces/{guid}
    pub async fn update(&self, guid: &str, request: &UpdateSpaceRequest) -> Result<Space, ApiError> {
        self.client
            .patch(&format!("/v3/spaces/{}", guid), request)
            .await
    }

    /// DELETE /v3/spaces/{guid}, waits for the deletion job
    pub async fn delete(&self, guid: &str) -> Result<(), ApiError> {
        self.client
            .delete_and_wait(&format!("/v3/spaces/{}", guid))
            .await
    }

    /// GET /v3/spaces/{guid}/features/ssh
    pub async fn ssh_enabled(&self, guid: &str) -> Result<bool, ApiError> {
        let feature: SpaceFeature = self
            .client
            .get(&format!("/v3/spaces/{}/features/ssh", guid))
            .await?;
        Ok(feature.enabled)
    }

    /// PATCH /v3/spaces/{guid}/features/ssh
    pub async fn set_ssh_enabled(&self, guid: &str, enabled: bool) -> Result<(), ApiError> {
        self.client
            .patch::<SpaceFeature, _>(
                &format!("/v3/spaces/{}/features/ssh", guid),
                &serde_json::json!({ "enabled": enabled }),
            )
            .await
            .map(|_| ())
    }

    /// GET /v3/spaces/{guid}/relationships/isolation_segment
    pub async fn isolation_segment(&self, guid: &str) -> Result<Option<String>, ApiError> {
        let relationship: ToOneRelationship = self
            .client
            .get(&format!("/v3/spaces/{}/relationships/isolation_segment", guid))
            .await?;
        Ok(relationship.guid().map(|g| g.to_string()))
    }

    /// PATCH /v3/spaces/{guid}/relationships/isolation_segment, `None` resets it
    pub async fn set_isolation_segment(
        &self,
        guid: &str,
        segment_guid: Option<&str>,
    ) -> Result<(), ApiError> {
        let body = match segment_guid {
            Some(segment) => ToOneRelationship::new(segment),
            None => ToOneRelationship::default(),
        };
        self.client
            .patch::<ToOneRelationship, _>(
                &format!("/v3/spaces/{}/relationships/isolation_segment", guid),
                &body,
            )
            .await
            .map(|_| ())
    }
}
