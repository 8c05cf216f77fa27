//! Organization API implementation

use serde::{Deserialize, Serialize};

use super::client::Client;
use super::common::{ListOptions, Metadata, MetadataRequest, ToOneRelationship};
use super::error::ApiError;

#[derive(Debug, Clone, Deserialize)]
pub struct Organization {
    pub guid: String,
    pub name: String,
    #[serde(default)]
    pub suspended: bool,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub relationships: OrganizationRelationships,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrganizationRelationships {
    #[serde(default)]
    pub quota: ToOneRelationship,
}

#[derive(Debug, Serialize)]
pub struct CreateOrganizationRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspended: Option<bool>,
    #[serde(skip_serializing_if = "MetadataRequest::is_empty")]
    pub metadata: MetadataRequest,
}

#[derive(Debug, Default, Serialize)]
pub struct UpdateOrganizationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspended: Option<bool>,
    #[serde(skip_serializing_if = "MetadataRequest::is_empty")]
    pub metadata: MetadataRequest,
}

/// Organizations API for organization operations
pub struct OrganizationsApi<'a> {
    client: &'a Client,
}

impl<'a> OrganizationsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /v3/organizations
    pub async fn list(&self, options: &ListOptions) -> Result<Vec<Organization>, ApiError> {
        self.client.list_all("/v3/organizations", options).await
    }

    /// GET /v3/organizations/{guid}
    pub async fn get(&self, guid: &str) -> Result<Organization, ApiError> {
        self.client
            .get(&format!("/v3/organizations/{}", guid))
            .await
    }

    /// POST /v3/organizations
    pub async fn create(
        &self,
        request: &CreateOrganizationRequest,
    ) -> Result<Organization, ApiError> {
        self.client.post("/v3/organizations", request).await
    }

    /// PATCH /v3/organizations/{guid}
    pub async fn update(
        &self,
        guid: &str,
        request: &UpdateOrganizationRequest,
    ) -> Result<Organization, ApiError> {
        self.client
            .patch(&format!("/v3/organizations/{}", guid), request)
            .await
    }

    /// DELETE /v3/organizations/{guid}, waits for the deletion job
    pub async fn delete(&self, guid: &str) -> Result<(), ApiError> {
        self.client
            .delete_and_wait(&format!("/v3/organizations/{}", guid))
            .await
    }

    /// PATCH /v3/organizations/{guid}/relationships/default_isolation_segment
    pub async fn set_default_isolation_segment(
        &self,
        guid: &str,
        segment_guid: Option<&str>,
    ) -> Result<(), ApiError> {
        let body = match segment_guid {
            Some(segment) => ToOneRelationship::new(segment),
            None => ToOneRelationship::default(),
        };
        self.client
            .patch::<serde_json::Value, _>(
                &format!(
                    "/v3/organizations/{}/relationships/default_isolation_segment",
                    guid
                ),
                &body,
            )
            .await
            .map(|_| ())
    }

    /// GET /v3/organizations/{guid}/relationships/default_isolation_segment
    pub async fn get_default_isolation_segment(
        &self,
        guid: &str,
    ) -> Result<Option<String>, ApiError> {
        let relationship: ToOneRelationship = self
            .client
            .get(&format!(
                "/v3/organizations/{}/relationships/default_isolation_segment",
                guid
            ))
            .await?;
        Ok(relationship.guid().map(|g| g.to_string()))
    }
}
