//! Service instance API implementation
//!
//! Managed instances are provisioned by a broker through an asynchronous job.
//! User-provided instances are created synchronously.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::client::Client;
use super::common::{ListOptions, Metadata, MetadataRequest, ToOneRelationship};
use super::error::ApiError;

pub const MANAGED: &str = "managed";
pub const USER_PROVIDED: &str = "user-provided";

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceInstance {
    pub guid: String,
    pub name: String,
    #[serde(rename = "type")]
    pub instance_type: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub syslog_drain_url: Option<String>,
    #[serde(default)]
    pub route_service_url: Option<String>,
    #[serde(default)]
    pub dashboard_url: Option<String>,
    #[serde(default)]
    pub upgrade_available: Option<bool>,
    #[serde(default)]
    pub maintenance_info: Option<MaintenanceInfo>,
    #[serde(default)]
    pub last_operation: Option<LastOperation>,
    pub created_at: String,
    pub updated_at: String,
    pub relationships: ServiceInstanceRelationships,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct MaintenanceInfo {
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LastOperation {
    #[serde(rename = "type")]
    pub operation_type: String,
    pub state: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServiceInstanceRelationships {
    pub space: ToOneRelationship,
    #[serde(default, skip_serializing_if = "unset")]
    pub service_plan: ToOneRelationship,
}

fn unset(relationship: &ToOneRelationship) -> bool {
    relationship.data.is_none()
}

#[derive(Debug, Serialize)]
pub struct CreateServiceInstanceRequest {
    #[serde(rename = "type")]
    pub instance_type: String,
    pub name: String,
    pub relationships: ServiceInstanceRelationships,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syslog_drain_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_service_url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "MetadataRequest::is_empty")]
    pub metadata: MetadataRequest,
}

#[derive(Debug, Default, Serialize)]
pub struct UpdateServiceInstanceRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationships: Option<UpdateServiceInstanceRelationships>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syslog_drain_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_service_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "MetadataRequest::is_empty")]
    pub metadata: MetadataRequest,
}

#[derive(Debug, Serialize)]
pub struct UpdateServiceInstanceRelationships {
    pub service_plan: ToOneRelationship,
}

pub struct ServiceInstancesApi<'a> {
    client: &'a Client,
}

impl<'a> ServiceInstancesApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /v3/service_instances
    pub async fn list(&self, options: &ListOptions) -> Result<Vec<ServiceInstance>, ApiError> {
        self.client.list_all("/v3/service_instances", options).await
    }

    /// GET /v3/service_instances/{guid}
    pub async fn get(&self, guid: &str) -> Result<ServiceInstance, ApiError> {
        self.client
            .get(&format!("/v3/service_instances/{}", guid))
            .await
    }

    /// POST /v3/service_instances. Managed instances are looked up by name in
    /// their space once the provisioning job completes.
    pub async fn create(
        &self,
        request: &CreateServiceInstanceRequest,
    ) -> Result<ServiceInstance, ApiError> {
        let response = self
            .client
            .post_async::<ServiceInstance, _>("/v3/service_instances", request)
            .await?;
        if let Some(instance) = self.client.complete(response).await? {
            return Ok(instance);
        }

        let space_guid = request.relationships.space.guid().unwrap_or_default();
        self.find_by_name(&request.name, space_guid)
            .await?
            .ok_or_else(|| {
                ApiError::ParseError(format!(
                    "service instance {} not found after provisioning",
                    request.name
                ))
            })
    }

    pub async fn find_by_name(
        &self,
        name: &str,
        space_guid: &str,
    ) -> Result<Option<ServiceInstance>, ApiError> {
        let instances = self
            .list(
                &ListOptions::new()
                    .add("names", name)
                    .add("space_guids", space_guid),
            )
            .await?;
        Ok(instances.into_iter().next())
    }

    /// PATCH /v3/service_instances/{guid}, waits for the update job of
    /// managed instances
    pub async fn update(
        &self,
        guid: &str,
        request: &UpdateServiceInstanceRequest,
    ) -> Result<ServiceInstance, ApiError> {
        let response = self
            .client
            .patch_async::<ServiceInstance, _>(&format!("/v3/service_instances/{}", guid), request)
            .await?;
        match self.client.complete(response).await? {
            Some(instance) => Ok(instance),
            None => self.get(guid).await,
        }
    }

    /// DELETE /v3/service_instances/{guid}, waits for the deprovisioning job
    pub async fn delete(&self, guid: &str) -> Result<(), ApiError> {
        self.client
            .delete_and_wait(&format!("/v3/service_instances/{}", guid))
            .await
    }

    /// GET /v3/service_instances/{guid}/credentials (user-provided only)
    pub async fn credentials(&self, guid: &str) -> Result<HashMap<String, serde_json::Value>, ApiError> {
        self.client
            .get(&format!("/v3/service_instances/{}/credentials", guid))
            .await
    }
}
