//! Domain API implementation

use serde::{Deserialize, Serialize};

use super::client::Client;
use super::common::{GuidRef, ListOptions, Metadata, MetadataRequest, ToManyRelationship, ToOneRelationship};
use super::error::ApiError;

#[derive(Debug, Clone, Deserialize)]
pub struct Domain {
    pub guid: String,
    pub name: String,
    #[serde(default)]
    pub internal: bool,
    #[serde(default)]
    pub router_group: Option<GuidRef>,
    #[serde(default)]
    pub supported_protocols: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub relationships: DomainRelationships,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DomainRelationships {
    #[serde(default, skip_serializing_if = "is_unset")]
    pub organization: ToOneRelationship,
    #[serde(default, skip_serializing_if = "is_empty")]
    pub shared_organizations: ToManyRelationship,
}

fn is_unset(relationship: &ToOneRelationship) -> bool {
    relationship.data.is_none()
}

fn is_empty(relationship: &ToManyRelationship) -> bool {
    relationship.data.is_empty()
}

#[derive(Debug, Serialize)]
pub struct CreateDomainRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub router_group: Option<GuidRef>,
    pub relationships: DomainRelationships,
    #[serde(skip_serializing_if = "MetadataRequest::is_empty")]
    pub metadata: MetadataRequest,
}

/// Domains API for domain operations. Only metadata is mutable after create.
pub struct DomainsApi<'a> {
    client: &'a Client,
}

impl<'a> DomainsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /v3/domains
    pub async fn list(&self, options: &ListOptions) -> Result<Vec<Domain>, ApiError> {
        self.client.list_all("/v3/domains", options).await
    }

    /// GET /v3/organizations/{guid}/domains, private domains of the org plus
    /// every shared domain
    pub async fn list_for_organization(
        &self,
        org_guid: &str,
        options: &ListOptions,
    ) -> Result<Vec<Domain>, ApiError> {
        self.client
            .list_all(&format!("/v3/organizations/{}/domains", org_guid), options)
            .await
    }

    /// GET /v3/domains/{guid}
    pub async fn get(&self, guid: &str) -> Result<Domain, ApiError> {
        self.client.get(&format!("/v3/domains/{}", guid)).await
    }

    /// POST /v3/domains
    pub async fn create(&self, request: &CreateDomainRequest) -> Result<Domain, ApiError> {
        self.client.post("/v3/domains", request).await
    }

    /// PATCH /v3/domains/{guid}
    pub async fn update_metadata(
        &self,
        guid: &str,
        metadata: &MetadataRequest,
    ) -> Result<Domain, ApiError> {
        self.client
            .patch(
                &format!("/v3/domains/{}", guid),
                &serde_json::json!({ "metadata": metadata }),
            )
            .await
    }

    /// DELETE /v3/domains/{guid}, waits for the deletion job
    pub async fn delete(&self, guid: &str) -> Result<(), ApiError> {
        self.client
            .delete_and_wait(&format!("/v3/domains/{}", guid))
            .await
    }
}
