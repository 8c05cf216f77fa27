//! Service plan and plan visibility API implementation

use serde::{Deserialize, Serialize};

use super::client::Client;
use super::common::{GuidRef, ListOptions, Metadata, ToOneRelationship};
use super::error::ApiError;
use super::service_instances::MaintenanceInfo;

pub const VISIBILITY_TYPES: &[&str] = &["public", "admin", "organization", "space"];

#[derive(Debug, Clone, Deserialize)]
pub struct ServicePlan {
    pub guid: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub visibility_type: String,
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub free: bool,
    #[serde(default)]
    pub costs: Vec<PlanCost>,
    #[serde(default)]
    pub maintenance_info: Option<MaintenanceInfo>,
    #[serde(default)]
    pub broker_catalog: BrokerCatalog,
    #[serde(default)]
    pub schemas: serde_json::Value,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub relationships: ServicePlanRelationships,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PlanCost {
    pub amount: f64,
    pub currency: String,
    pub unit: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrokerCatalog {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub maximum_polling_duration: Option<i64>,
    #[serde(default)]
    pub features: BrokerCatalogFeatures,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrokerCatalogFeatures {
    #[serde(default)]
    pub plan_updateable: bool,
    #[serde(default)]
    pub bindable: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServicePlanRelationships {
    #[serde(default)]
    pub service_offering: ToOneRelationship,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Visibility {
    #[serde(rename = "type")]
    pub visibility_type: String,
    #[serde(default)]
    pub organizations: Vec<VisibilityOrganization>,
    #[serde(default)]
    pub space: Option<GuidRef>,
}

impl Visibility {
    pub fn organization_guids(&self) -> Vec<String> {
        self.organizations.iter().map(|o| o.guid.clone()).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisibilityOrganization {
    pub guid: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
struct VisibilityRequest {
    #[serde(rename = "type")]
    visibility_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    organizations: Option<Vec<GuidRef>>,
}

pub struct ServicePlansApi<'a> {
    client: &'a Client,
}

impl<'a> ServicePlansApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /v3/service_plans
    pub async fn list(&self, options: &ListOptions) -> Result<Vec<ServicePlan>, ApiError> {
        self.client.list_all("/v3/service_plans", options).await
    }

    /// GET /v3/service_plans/{guid}
    pub async fn get(&self, guid: &str) -> Result<ServicePlan, ApiError> {
        self.client
            .get(&format!("/v3/service_plans/{}", guid))
            .await
    }

    /// GET /v3/service_plans/{guid}/visibility
    pub async fn visibility(&self, guid: &str) -> Result<Visibility, ApiError> {
        self.client
            .get(&format!("/v3/service_plans/{}/visibility", guid))
            .await
    }

    /// PATCH /v3/service_plans/{guid}/visibility, replaces the visibility.
    /// Organizations are only sent for the `organization` type.
    pub async fn replace_visibility(
        &self,
        guid: &str,
        visibility_type: &str,
        org_guids: &[String],
    ) -> Result<Visibility, ApiError> {
        let organizations = (visibility_type == "organization")
            .then(|| org_guids.iter().map(GuidRef::new).collect());
        self.client
            .patch(
                &format!("/v3/service_plans/{}/visibility", guid),
                &VisibilityRequest {
                    visibility_type: visibility_type.to_string(),
                    organizations,
                },
            )
            .await
    }

    /// POST /v3/service_plans/{guid}/visibility, appends organizations
    pub async fn add_organizations(
        &self,
        guid: &str,
        org_guids: &[String],
    ) -> Result<Visibility, ApiError> {
        self.client
            .post(
                &format!("/v3/service_plans/{}/visibility", guid),
                &VisibilityRequest {
                    visibility_type: "organization".to_string(),
                    organizations: Some(org_guids.iter().map(GuidRef::new).collect()),
                },
            )
            .await
    }

    /// DELETE /v3/service_plans/{guid}/visibility/{org}
    pub async fn remove_organization(&self, guid: &str, org_guid: &str) -> Result<(), ApiError> {
        self.client
            .delete(&format!("/v3/service_plans/{}/visibility/{}", guid, org_guid))
            .await
            .map(|_| ())
    }
}
