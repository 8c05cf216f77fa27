//! Organization resource

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tfplug::context::Context;
use tfplug::import::import_state_passthrough_id;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, UpdateResourceRequest,
    UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tfplug::validator::StringLengthValidator;

use crate::api::organizations::{
    CreateOrganizationRequest, Organization, UpdateOrganizationRequest,
};
use crate::common::{self, StringMap};
use crate::provider_data::{extract_provider_data, require_client, ConfigureTarget};
use crate::CloudFoundryProviderData;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgModel {
    pub id: Option<String>,
    pub name: String,
    pub suspended: Option<bool>,
    pub quota: Option<String>,
    pub labels: Option<StringMap>,
    pub annotations: Option<StringMap>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl From<&Organization> for OrgModel {
    fn from(org: &Organization) -> Self {
        Self {
            id: Some(org.guid.clone()),
            name: org.name.clone(),
            suspended: Some(org.suspended),
            quota: org.relationships.quota.guid().map(str::to_string),
            labels: common::labels_from(&org.metadata),
            annotations: common::annotations_from(&org.metadata),
            created_at: Some(org.created_at.clone()),
            updated_at: Some(org.updated_at.clone()),
        }
    }
}

#[derive(Default)]
pub struct OrgResource {
    provider_data: Option<CloudFoundryProviderData>,
}

impl OrgResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn create_org(&self, request: &CreateResourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let plan: OrgModel = common::decode(&request.planned_state)?;

        let org = client
            .organizations()
            .create(&CreateOrganizationRequest {
                name: plan.name.clone(),
                suspended: plan.suspended,
                metadata: common::metadata_request(&plan.labels, &plan.annotations),
            })
            .await
            .map_err(|e| common::api_error("API Error Creating Organization", &e))?;

        tracing::debug!("Created organization {} ({})", org.name, org.guid);
        common::encode(&OrgModel::from(&org))
    }

    async fn read_org(&self, request: &ReadResourceRequest) -> Result<Option<DynamicValue>, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let id = common::state_id(&request.current_state)?;

        match client.organizations().get(&id).await {
            Ok(org) => common::encode(&OrgModel::from(&org)).map(Some),
            Err(e) if e.is_not_found() => {
                tracing::warn!("Organization {} no longer exists, removing from state", id);
                Ok(None)
            }
            Err(e) => Err(common::api_error("API Error Reading Organization", &e)),
        }
    }

    async fn update_org(&self, request: &UpdateResourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let plan: OrgModel = common::decode(&request.planned_state)?;
        let prior: OrgModel = common::decode(&request.prior_state)?;
        let id = common::state_id(&request.prior_state)?;

        let org = client
            .organizations()
            .update(
                &id,
                &UpdateOrganizationRequest {
                    name: Some(plan.name.clone()),
                    suspended: plan.suspended,
                    metadata: common::metadata_patch(
                        &plan.labels,
                        &plan.annotations,
                        &prior.labels,
                        &prior.annotations,
                    ),
                },
            )
            .await
            .map_err(|e| common::api_error("API Error Updating Organization", &e))?;

        common::encode(&OrgModel::from(&org))
    }

    async fn delete_org(&self, request: &DeleteResourceRequest) -> Result<(), Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let id = common::state_id(&request.prior_state)?;

        match client.organizations().delete(&id).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(common::api_error("API Error Deleting Organization", &e)),
        }
    }
}

#[async_trait]
impl Resource for OrgResource {
    fn type_name(&self) -> &str {
        "cloudfoundry_org"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Provides a Cloud Foundry resource for managing Cloud Foundry organizations")
            .attribute(common::id_attribute("The GUID of the organization"))
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the organization")
                    .required()
                    .validator(StringLengthValidator::min(1))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("suspended", AttributeType::Bool)
                    .description("Whether an organization is suspended or not")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(common::computed_string(
                "quota",
                "The ID of quota to be applied to this organization",
            ))
            .attribute(common::labels_attribute())
            .attribute(common::annotations_attribute())
            .attribute(common::created_at_attribute())
            .attribute(common::updated_at_attribute())
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        match self.create_org(&request).await {
            Ok(new_state) => CreateResourceResponse {
                new_state,
                private: vec![],
                diagnostics: vec![],
            },
            Err(diag) => CreateResourceResponse {
                new_state: DynamicValue::null(),
                private: vec![],
                diagnostics: vec![diag],
            },
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        match self.read_org(&request).await {
            Ok(new_state) => ReadResourceResponse {
                new_state,
                diagnostics: vec![],
                private: request.private,
            },
            Err(diag) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![diag],
                private: request.private,
            },
        }
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        match self.update_org(&request).await {
            Ok(new_state) => UpdateResourceResponse {
                new_state,
                private: vec![],
                diagnostics: vec![],
            },
            Err(diag) => UpdateResourceResponse {
                new_state: request.prior_state,
                private: vec![],
                diagnostics: vec![diag],
            },
        }
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        DeleteResourceResponse {
            diagnostics: self.delete_org(&request).await.err().into_iter().collect(),
        }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for OrgResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        match extract_provider_data(request.provider_data, ConfigureTarget::Resource) {
            Ok(data) => {
                self.provider_data = data;
                ConfigureResourceResponse {
                    diagnostics: vec![],
                }
            }
            Err(diag) => ConfigureResourceResponse {
                diagnostics: vec![diag],
            },
        }
    }
}

#[async_trait]
impl ResourceWithImportState for OrgResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse::default();
        import_state_passthrough_id(&ctx, AttributePath::new("id"), &request, &mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{provider_data, resource_json, value, ORG_GUID};
    use mockito::{Matcher, Server};
    use tfplug::types::ClientCapabilities;

    async fn configured(url: &str) -> OrgResource {
        let mut resource = OrgResource::new();
        let response = resource
            .configure(
                Context::new(),
                ConfigureResourceRequest {
                    provider_data: provider_data(url),
                },
            )
            .await;
        assert!(response.diagnostics.is_empty());
        resource
    }

    fn org_body(name: &str) -> String {
        resource_json(
            ORG_GUID,
            serde_json::json!({
                "name": name,
                "suspended": false,
                "relationships": {"quota": {"data": {"guid": "quota-1"}}},
                "metadata": {"labels": {"env": "dev"}, "annotations": {}}
            }),
        )
    }

    #[test]
    fn model_maps_organization() {
        let org: Organization = serde_json::from_str(&org_body("my-org")).unwrap();
        let model = OrgModel::from(&org);

        assert_eq!(model.id.as_deref(), Some(ORG_GUID));
        assert_eq!(model.quota.as_deref(), Some("quota-1"));
        assert_eq!(model.labels.unwrap()["env"], "dev");
        assert!(model.annotations.is_none());
        assert_eq!(model.created_at.as_deref(), Some("2024-01-02T03:04:05Z"));
        assert_eq!(model.updated_at.as_deref(), Some("2024-01-02T03:04:06Z"));
    }

    #[tokio::test]
    async fn create_posts_name_and_labels() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v3/organizations")
            .match_body(Matcher::Json(serde_json::json!({
                "name": "my-org",
                "metadata": {"labels": {"env": "dev"}}
            })))
            .with_status(201)
            .with_body(org_body("my-org"))
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "cloudfoundry_org".to_string(),
                    planned_state: value(serde_json::json!({
                        "id": null, "name": "my-org", "suspended": null, "quota": null,
                        "labels": {"env": "dev"}, "annotations": null,
                        "created_at": null, "updated_at": null
                    })),
                    config: DynamicValue::null(),
                    planned_private: vec![],
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state: OrgModel = response.new_state.to_typed().unwrap();
        assert_eq!(state.id.as_deref(), Some(ORG_GUID));
        assert_eq!(state.suspended, Some(false));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn read_of_deleted_org_removes_state() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", format!("/v3/organizations/{}", ORG_GUID).as_str())
            .with_status(404)
            .with_body(r#"{"errors":[{"code":10010,"title":"CF-ResourceNotFound","detail":"Organization not found"}]}"#)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: "cloudfoundry_org".to_string(),
                    current_state: value(serde_json::json!({"id": ORG_GUID})),
                    private: vec![],
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        assert!(response.new_state.is_none());
    }

    #[tokio::test]
    async fn update_removes_dropped_labels() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PATCH", format!("/v3/organizations/{}", ORG_GUID).as_str())
            .match_body(Matcher::Json(serde_json::json!({
                "name": "renamed",
                "suspended": false,
                "metadata": {"labels": {"env": null}}
            })))
            .with_body(org_body("renamed"))
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: "cloudfoundry_org".to_string(),
                    prior_state: value(serde_json::json!({
                        "id": ORG_GUID, "name": "my-org", "suspended": false,
                        "labels": {"env": "dev"}
                    })),
                    planned_state: value(serde_json::json!({
                        "id": ORG_GUID, "name": "renamed", "suspended": false, "labels": null
                    })),
                    config: DynamicValue::null(),
                    planned_private: vec![],
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unconfigured_resource_reports_error() {
        let resource = OrgResource::new();
        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: "cloudfoundry_org".to_string(),
                    prior_state: value(serde_json::json!({"id": ORG_GUID})),
                    planned_private: vec![],
                },
            )
            .await;

        assert_eq!(response.diagnostics[0].summary, "Provider not configured");
    }
}
