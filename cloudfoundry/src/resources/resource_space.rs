//! Space resource

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
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
use tfplug::validator::{StringLengthValidator, UuidValidator};

use crate::api::spaces::{CreateSpaceRequest, Space, SpaceRelationships, UpdateSpaceRequest};
use crate::api::{ApiError, Client, ToOneRelationship};
use crate::common::{self, StringMap};
use crate::provider_data::{extract_provider_data, require_client, ConfigureTarget};
use crate::CloudFoundryProviderData;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceModel {
    pub id: Option<String>,
    pub name: String,
    pub org: String,
    pub allow_ssh: Option<bool>,
    pub isolation_segment: Option<String>,
    pub labels: Option<StringMap>,
    pub annotations: Option<StringMap>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl From<&Space> for SpaceModel {
    fn from(space: &Space) -> Self {
        Self {
            id: Some(space.guid.clone()),
            name: space.name.clone(),
            org: space
                .relationships
                .organization
                .guid()
                .unwrap_or_default()
                .to_string(),
            allow_ssh: None,
            isolation_segment: None,
            labels: common::labels_from(&space.metadata),
            annotations: common::annotations_from(&space.metadata),
            created_at: Some(space.created_at.clone()),
            updated_at: Some(space.updated_at.clone()),
        }
    }
}

/// The space plus the settings kept on sub-resources of it
pub async fn fetch_space(client: &Client, space: &Space) -> Result<SpaceModel, ApiError> {
    let spaces = client.spaces();
    let mut model = SpaceModel::from(space);
    model.allow_ssh = Some(spaces.ssh_enabled(&space.guid).await?);
    model.isolation_segment = spaces.isolation_segment(&space.guid).await?;
    Ok(model)
}

#[derive(Default)]
pub struct SpaceResource {
    provider_data: Option<CloudFoundryProviderData>,
}

impl SpaceResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn apply_settings(
        client: &Arc<Client>,
        guid: &str,
        plan: &SpaceModel,
        prior: Option<&SpaceModel>,
    ) -> Result<(), ApiError> {
        let spaces = client.spaces();

        if let Some(allow_ssh) = plan.allow_ssh {
            if prior.and_then(|p| p.allow_ssh) != Some(allow_ssh) {
                spaces.set_ssh_enabled(guid, allow_ssh).await?;
            }
        }

        let prior_segment = prior.and_then(|p| p.isolation_segment.as_deref());
        if plan.isolation_segment.as_deref() != prior_segment {
            spaces
                .set_isolation_segment(guid, plan.isolation_segment.as_deref())
                .await?;
        }
        Ok(())
    }

    async fn create_space(&self, request: &CreateResourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let plan: SpaceModel = common::decode(&request.planned_state)?;

        let space = client
            .spaces()
            .create(&CreateSpaceRequest {
                name: plan.name.clone(),
                relationships: SpaceRelationships {
                    organization: ToOneRelationship::new(plan.org.clone()),
                    quota: ToOneRelationship::default(),
                },
                metadata: common::metadata_request(&plan.labels, &plan.annotations),
            })
            .await
            .map_err(|e| common::api_error("API Error Creating Space", &e))?;
        tracing::debug!("Created space {} ({})", space.name, space.guid);

        Self::apply_settings(&client, &space.guid, &plan, None)
            .await
            .map_err(|e| common::api_error("API Error Configuring Space", &e))?;

        let model = fetch_space(&client, &space)
            .await
            .map_err(|e| common::api_error("API Error Reading Space", &e))?;
        common::encode(&model)
    }

    async fn read_space(&self, request: &ReadResourceRequest) -> Result<Option<DynamicValue>, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let id = common::state_id(&request.current_state)?;

        let space = match client.spaces().get(&id).await {
            Ok(space) => space,
            Err(e) if e.is_not_found() => {
                tracing::warn!("Space {} no longer exists, removing from state", id);
                return Ok(None);
            }
            Err(e) => return Err(common::api_error("API Error Reading Space", &e)),
        };

        let model = fetch_space(&client, &space)
            .await
            .map_err(|e| common::api_error("API Error Reading Space", &e))?;
        common::encode(&model).map(Some)
    }

    async fn update_space(&self, request: &UpdateResourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let plan: SpaceModel = common::decode(&request.planned_state)?;
        let prior: SpaceModel = common::decode(&request.prior_state)?;
        let id = common::state_id(&request.prior_state)?;

        let space = client
            .spaces()
            .update(
                &id,
                &UpdateSpaceRequest {
                    name: Some(plan.name.clone()),
                    metadata: common::metadata_patch(
                        &plan.labels,
                        &plan.annotations,
                        &prior.labels,
                        &prior.annotations,
                    ),
                },
            )
            .await
            .map_err(|e| common::api_error("API Error Updating Space", &e))?;

        Self::apply_settings(&client, &id, &plan, Some(&prior))
            .await
            .map_err(|e| common::api_error("API Error Configuring Space", &e))?;

        let model = fetch_space(&client, &space)
            .await
            .map_err(|e| common::api_error("API Error Reading Space", &e))?;
        common::encode(&model)
    }

    async fn delete_space(&self, request: &DeleteResourceRequest) -> Result<(), Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let id = common::state_id(&request.prior_state)?;

        match client.spaces().delete(&id).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(common::api_error("API Error Deleting Space", &e)),
        }
    }
}

#[async_trait]
impl Resource for SpaceResource {
    fn type_name(&self) -> &str {
        "cloudfoundry_space"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Provides a Cloud Foundry resource for managing Cloud Foundry spaces within organizations.")
            .attribute(common::id_attribute("The GUID of the space"))
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the space")
                    .required()
                    .validator(StringLengthValidator::min(1))
                    .build(),
            )
            .attribute(common::guid_reference(
                "org",
                "The GUID of the organization under which the space is created",
            ))
            .attribute(
                AttributeBuilder::new("allow_ssh", AttributeType::Bool)
                    .description("Allows SSH to application containers via the CF CLI.")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("isolation_segment", AttributeType::String)
                    .description("The GUID of the isolation segment to assign to the space")
                    .optional()
                    .validator(UuidValidator::create())
                    .build(),
            )
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
        match self.create_space(&request).await {
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
        match self.read_space(&request).await {
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
        match self.update_space(&request).await {
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
            diagnostics: self.delete_space(&request).await.err().into_iter().collect(),
        }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for SpaceResource {
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
impl ResourceWithImportState for SpaceResource {
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
    use crate::test_support::{provider_data, resource_json, value, ORG_GUID, SPACE_GUID};
    use mockito::{Matcher, Server};

    fn space_body() -> String {
        resource_json(
            SPACE_GUID,
            serde_json::json!({
                "name": "dev",
                "relationships": {
                    "organization": {"data": {"guid": ORG_GUID}},
                    "quota": {"data": null}
                }
            }),
        )
    }

    #[tokio::test]
    async fn create_applies_ssh_and_isolation_segment() {
        let mut server = Server::new_async().await;
        let create = server
            .mock("POST", "/v3/spaces")
            .match_body(Matcher::Json(serde_json::json!({
                "name": "dev",
                "relationships": {"organization": {"data": {"guid": ORG_GUID}}}
            })))
            .with_status(201)
            .with_body(space_body())
            .create_async()
            .await;
        let ssh_path = format!("/v3/spaces/{}/features/ssh", SPACE_GUID);
        let set_ssh = server
            .mock("PATCH", ssh_path.as_str())
            .match_body(Matcher::Json(serde_json::json!({"enabled": false})))
            .with_body(r#"{"name":"ssh","enabled":false}"#)
            .create_async()
            .await;
        let _get_ssh = server
            .mock("GET", ssh_path.as_str())
            .with_body(r#"{"name":"ssh","enabled":false}"#)
            .create_async()
            .await;
        let segment_path = format!("/v3/spaces/{}/relationships/isolation_segment", SPACE_GUID);
        let set_segment = server
            .mock("PATCH", segment_path.as_str())
            .match_body(Matcher::Json(serde_json::json!({"data": {"guid": "seg-1"}})))
            .with_body(r#"{"data":{"guid":"seg-1"}}"#)
            .create_async()
            .await;
        let _get_segment = server
            .mock("GET", segment_path.as_str())
            .with_body(r#"{"data":{"guid":"seg-1"}}"#)
            .create_async()
            .await;

        let mut resource = SpaceResource::new();
        resource
            .configure(
                Context::new(),
                ConfigureResourceRequest {
                    provider_data: provider_data(&server.url()),
                },
            )
            .await;

        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "cloudfoundry_space".to_string(),
                    planned_state: value(serde_json::json!({
                        "id": null, "name": "dev", "org": ORG_GUID,
                        "allow_ssh": false, "isolation_segment": "seg-1"
                    })),
                    config: DynamicValue::null(),
                    planned_private: vec![],
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state: SpaceModel = response.new_state.to_typed().unwrap();
        assert_eq!(state.org, ORG_GUID);
        assert_eq!(state.allow_ssh, Some(false));
        assert_eq!(state.isolation_segment.as_deref(), Some("seg-1"));
        create.assert_async().await;
        set_ssh.assert_async().await;
        set_segment.assert_async().await;
    }

    #[test]
    fn unset_settings_are_not_sent() {
        let space: Space = serde_json::from_str(&space_body()).unwrap();
        let model = SpaceModel::from(&space);
        assert_eq!(model.allow_ssh, None);
        assert_eq!(model.isolation_segment, None);
        assert_eq!(model.name, "dev");
    }
}
