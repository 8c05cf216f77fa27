//! Running and staging space bindings of a security group
//!
//! The resource owns the full set of bound spaces per lifecycle. Its id is
//! the security group GUID.

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
    UpdateResourceResponse, ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tfplug::validator::at_least_one_of;

use crate::api::security_groups::{SecurityGroup, SpaceLifecycle};
use crate::api::Client;
use crate::common;
use crate::diff::{self, SetDiff};
use crate::provider_data::{extract_provider_data, require_client, ConfigureTarget};
use crate::CloudFoundryProviderData;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroupSpaceBindingsModel {
    pub id: Option<String>,
    pub security_group: String,
    pub running_spaces: Option<Vec<String>>,
    pub staging_spaces: Option<Vec<String>>,
}

impl From<&SecurityGroup> for SecurityGroupSpaceBindingsModel {
    fn from(group: &SecurityGroup) -> Self {
        let non_empty = |guids: Vec<String>| (!guids.is_empty()).then_some(guids);
        Self {
            id: Some(group.guid.clone()),
            security_group: group.guid.clone(),
            running_spaces: non_empty(group.relationships.running_spaces.guids()),
            staging_spaces: non_empty(group.relationships.staging_spaces.guids()),
        }
    }
}

impl SecurityGroupSpaceBindingsModel {
    fn spaces(&self, lifecycle: SpaceLifecycle) -> &[String] {
        let spaces = match lifecycle {
            SpaceLifecycle::Running => &self.running_spaces,
            SpaceLifecycle::Staging => &self.staging_spaces,
        };
        spaces.as_deref().unwrap_or_default()
    }
}

/// Bring one lifecycle's bindings from `prior` to `planned`
async fn sync_spaces(
    client: &Client,
    group: &str,
    lifecycle: SpaceLifecycle,
    prior: &[String],
    planned: &[String],
) -> Vec<Diagnostic> {
    let api = client.security_groups();
    let api = &api;
    diff::reconcile(
        SetDiff::between(prior, planned),
        |space: String| async move {
            api.unbind_space(group, lifecycle, &space).await.map_err(|e| {
                common::api_error(
                    &format!("API Error Unbinding Security Group from {} space {}", lifecycle, space),
                    &e,
                )
            })
        },
        |spaces: Vec<String>| async move {
            api.bind_spaces(group, lifecycle, &spaces)
                .await
                .map(|_| ())
                .map_err(|e| {
                    common::api_error(
                        &format!("API Error Binding Security Group to {} spaces", lifecycle),
                        &e,
                    )
                })
        },
    )
    .await
}

#[derive(Default)]
pub struct SecurityGroupSpaceBindingsResource {
    provider_data: Option<CloudFoundryProviderData>,
}

impl SecurityGroupSpaceBindingsResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn fetch(&self, client: &Client, guid: &str, summary: &str) -> Result<DynamicValue, Diagnostic> {
        let group = client
            .security_groups()
            .get(guid)
            .await
            .map_err(|e| common::api_error(summary, &e))?;
        common::encode(&SecurityGroupSpaceBindingsModel::from(&group))
    }

    async fn read_bindings(
        &self,
        request: &ReadResourceRequest,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let id = common::state_id(&request.current_state)?;

        match client.security_groups().get(&id).await {
            Ok(group) => common::encode(&SecurityGroupSpaceBindingsModel::from(&group)).map(Some),
            Err(e) if e.is_not_found() => {
                tracing::warn!("Security group {} no longer exists, removing bindings from state", id);
                Ok(None)
            }
            Err(e) => Err(common::api_error("API Error Reading Security Group", &e)),
        }
    }
}

#[async_trait]
impl Resource for SecurityGroupSpaceBindingsResource {
    fn type_name(&self) -> &str {
        "cloudfoundry_security_group_space_bindings"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let space_set = |name: &str, description: &str| {
            AttributeBuilder::new(name, AttributeType::Set(Box::new(AttributeType::String)))
                .description(description)
                .optional()
                .build()
        };
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Provides a Cloud Foundry resource for binding a security group to spaces. Spaces bound outside of this resource are unbound on the next apply.")
            .attribute(common::id_attribute("The GUID of the security group"))
            .attribute(common::guid_reference("security_group", "The security group guid"))
            .attribute(space_set(
                "running_spaces",
                "The space guids where the security group is applied to running applications",
            ))
            .attribute(space_set(
                "staging_spaces",
                "The space guids where the security group is applied to staging applications",
            ))
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        ValidateResourceConfigResponse {
            diagnostics: at_least_one_of(&request.config, &["running_spaces", "staging_spaces"])
                .into_iter()
                .collect(),
        }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let client = match require_client(&self.provider_data) {
            Ok(client) => client,
            Err(diag) => {
                return CreateResourceResponse {
                    new_state: DynamicValue::null(),
                    private: vec![],
                    diagnostics: vec![diag],
                }
            }
        };
        let plan: SecurityGroupSpaceBindingsModel = match common::decode(&request.planned_state) {
            Ok(plan) => plan,
            Err(diag) => {
                return CreateResourceResponse {
                    new_state: DynamicValue::null(),
                    private: vec![],
                    diagnostics: vec![diag],
                }
            }
        };

        let mut diagnostics = Vec::new();
        for lifecycle in [SpaceLifecycle::Running, SpaceLifecycle::Staging] {
            let spaces = plan.spaces(lifecycle);
            if spaces.is_empty() {
                continue;
            }
            if let Err(e) = client
                .security_groups()
                .bind_spaces(&plan.security_group, lifecycle, spaces)
                .await
            {
                diagnostics.push(common::api_error(
                    &format!("API Error Binding Security Group to {} spaces", lifecycle),
                    &e,
                ));
            }
        }

        let new_state = match self
            .fetch(&client, &plan.security_group, "API Error Reading Security Group")
            .await
        {
            Ok(state) => state,
            Err(diag) => {
                diagnostics.push(diag);
                DynamicValue::null()
            }
        };

        CreateResourceResponse {
            new_state,
            private: vec![],
            diagnostics,
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let result = self.read_bindings(&request).await;

        match result {
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
        let models = require_client(&self.provider_data).and_then(|client| {
            let prior: SecurityGroupSpaceBindingsModel = common::decode(&request.prior_state)?;
            let plan: SecurityGroupSpaceBindingsModel = common::decode(&request.planned_state)?;
            Ok((client, prior, plan))
        });
        let (client, prior, plan) = match models {
            Ok(models) => models,
            Err(diag) => {
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    private: vec![],
                    diagnostics: vec![diag],
                }
            }
        };

        let mut diagnostics = Vec::new();
        for lifecycle in [SpaceLifecycle::Running, SpaceLifecycle::Staging] {
            diagnostics.extend(
                sync_spaces(
                    &client,
                    &plan.security_group,
                    lifecycle,
                    prior.spaces(lifecycle),
                    plan.spaces(lifecycle),
                )
                .await,
            );
        }

        let new_state = match self
            .fetch(&client, &plan.security_group, "API Error Reading Security Group")
            .await
        {
            Ok(state) => state,
            Err(diag) => {
                diagnostics.push(diag);
                request.prior_state
            }
        };

        UpdateResourceResponse {
            new_state,
            private: vec![],
            diagnostics,
        }
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let models = require_client(&self.provider_data).and_then(|client| {
            let prior: SecurityGroupSpaceBindingsModel = common::decode(&request.prior_state)?;
            Ok((client, prior))
        });
        let (client, prior) = match models {
            Ok(models) => models,
            Err(diag) => {
                return DeleteResourceResponse {
                    diagnostics: vec![diag],
                }
            }
        };

        let mut diagnostics = Vec::new();
        for lifecycle in [SpaceLifecycle::Running, SpaceLifecycle::Staging] {
            diagnostics.extend(
                sync_spaces(&client, &prior.security_group, lifecycle, prior.spaces(lifecycle), &[])
                    .await,
            );
        }

        DeleteResourceResponse { diagnostics }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for SecurityGroupSpaceBindingsResource {
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
impl ResourceWithImportState for SecurityGroupSpaceBindingsResource {
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
    use crate::test_support::{provider_data, value};
    use mockito::{Matcher, Server};

    const GROUP: &str = "5e6f7a8b-0000-4000-8000-000000000001";
    const SPACE_A: &str = "5e6f7a8b-0000-4000-8000-00000000000a";
    const SPACE_B: &str = "5e6f7a8b-0000-4000-8000-00000000000b";

    fn group_body(running: &[&str]) -> String {
        let data: Vec<_> = running.iter().map(|g| serde_json::json!({"guid": g})).collect();
        serde_json::json!({
            "guid": GROUP,
            "name": "public",
            "globally_enabled": {"running": false, "staging": false},
            "rules": [],
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z",
            "relationships": {
                "running_spaces": {"data": data},
                "staging_spaces": {"data": []}
            }
        })
        .to_string()
    }

    async fn configured(url: &str) -> SecurityGroupSpaceBindingsResource {
        let mut resource = SecurityGroupSpaceBindingsResource::new();
        resource
            .configure(
                Context::new(),
                ConfigureResourceRequest {
                    provider_data: provider_data(url),
                },
            )
            .await;
        resource
    }

    #[tokio::test]
    async fn create_binds_running_spaces_in_one_call() {
        let mut server = Server::new_async().await;
        let bind = server
            .mock("POST", format!("/v3/security_groups/{}/relationships/running_spaces", GROUP).as_str())
            .match_body(Matcher::Json(serde_json::json!({
                "data": [{"guid": SPACE_A}, {"guid": SPACE_B}]
            })))
            .with_body(r#"{"data":[]}"#)
            .expect(1)
            .create_async()
            .await;
        let get = server
            .mock("GET", format!("/v3/security_groups/{}", GROUP).as_str())
            .with_body(group_body(&[SPACE_A, SPACE_B]))
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "cloudfoundry_security_group_space_bindings".to_string(),
                    planned_state: value(serde_json::json!({
                        "id": null,
                        "security_group": GROUP,
                        "running_spaces": [SPACE_A, SPACE_B],
                        "staging_spaces": null
                    })),
                    config: DynamicValue::null(),
                    planned_private: vec![],
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.new_state.value.to_json();
        assert_eq!(state["id"], GROUP);
        assert_eq!(state["running_spaces"], serde_json::json!([SPACE_A, SPACE_B]));
        assert!(state["staging_spaces"].is_null());
        bind.assert_async().await;
        get.assert_async().await;
    }

    #[tokio::test]
    async fn delete_unbinds_each_space_and_collects_failures() {
        let mut server = Server::new_async().await;
        let unbind_a = server
            .mock(
                "DELETE",
                format!("/v3/security_groups/{}/relationships/running_spaces/{}", GROUP, SPACE_A).as_str(),
            )
            .with_status(500)
            .with_body(r#"{"errors":[{"code":10001,"title":"CF-UnknownError","detail":"boom"}]}"#)
            .expect(1)
            .create_async()
            .await;
        let unbind_b = server
            .mock(
                "DELETE",
                format!("/v3/security_groups/{}/relationships/running_spaces/{}", GROUP, SPACE_B).as_str(),
            )
            .with_status(204)
            .expect(1)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: "cloudfoundry_security_group_space_bindings".to_string(),
                    prior_state: value(serde_json::json!({
                        "id": GROUP,
                        "security_group": GROUP,
                        "running_spaces": [SPACE_A, SPACE_B],
                        "staging_spaces": null
                    })),
                    planned_private: vec![],
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].summary.contains(SPACE_A));
        unbind_a.assert_async().await;
        unbind_b.assert_async().await;
    }
}
