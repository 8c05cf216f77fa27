//! Isolation segment resource

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

use crate::api::isolation_segments::{IsolationSegment, IsolationSegmentRequest};
use crate::common::{self, StringMap};
use crate::provider_data::{extract_provider_data, require_client, ConfigureTarget};
use crate::CloudFoundryProviderData;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationSegmentModel {
    pub id: Option<String>,
    pub name: String,
    pub labels: Option<StringMap>,
    pub annotations: Option<StringMap>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl From<&IsolationSegment> for IsolationSegmentModel {
    fn from(segment: &IsolationSegment) -> Self {
        Self {
            id: Some(segment.guid.clone()),
            name: segment.name.clone(),
            labels: common::labels_from(&segment.metadata),
            annotations: common::annotations_from(&segment.metadata),
            created_at: Some(segment.created_at.clone()),
            updated_at: Some(segment.updated_at.clone()),
        }
    }
}

#[derive(Default)]
pub struct IsolationSegmentResource {
    provider_data: Option<CloudFoundryProviderData>,
}

impl IsolationSegmentResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn create_segment(&self, request: &CreateResourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let plan: IsolationSegmentModel = common::decode(&request.planned_state)?;

        let segment = client
            .isolation_segments()
            .create(&IsolationSegmentRequest {
                name: Some(plan.name.clone()),
                metadata: common::metadata_request(&plan.labels, &plan.annotations),
            })
            .await
            .map_err(|e| common::api_error("API Error Creating Isolation Segment", &e))?;

        tracing::debug!("Created isolation segment {} ({})", segment.name, segment.guid);
        common::encode(&IsolationSegmentModel::from(&segment))
    }

    async fn read_segment(&self, request: &ReadResourceRequest) -> Result<Option<DynamicValue>, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let id = common::state_id(&request.current_state)?;

        match client.isolation_segments().get(&id).await {
            Ok(segment) => common::encode(&IsolationSegmentModel::from(&segment)).map(Some),
            Err(e) if e.is_not_found() => {
                tracing::warn!("Isolation segment {} no longer exists, removing from state", id);
                Ok(None)
            }
            Err(e) => Err(common::api_error("API Error Reading Isolation Segment", &e)),
        }
    }

    async fn update_segment(&self, request: &UpdateResourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let plan: IsolationSegmentModel = common::decode(&request.planned_state)?;
        let prior: IsolationSegmentModel = common::decode(&request.prior_state)?;
        let id = common::state_id(&request.prior_state)?;

        let segment = client
            .isolation_segments()
            .update(
                &id,
                &IsolationSegmentRequest {
                    name: (plan.name != prior.name).then(|| plan.name.clone()),
                    metadata: common::metadata_patch(
                        &plan.labels,
                        &plan.annotations,
                        &prior.labels,
                        &prior.annotations,
                    ),
                },
            )
            .await
            .map_err(|e| common::api_error("API Error Updating Isolation Segment", &e))?;

        common::encode(&IsolationSegmentModel::from(&segment))
    }

    async fn delete_segment(&self, request: &DeleteResourceRequest) -> Result<(), Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let id = common::state_id(&request.prior_state)?;

        match client.isolation_segments().delete(&id).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(common::api_error("API Error Deleting Isolation Segment", &e)),
        }
    }
}

#[async_trait]
impl Resource for IsolationSegmentResource {
    fn type_name(&self) -> &str {
        "cloudfoundry_isolation_segment"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Provides a Cloud Foundry resource for managing isolation segments")
            .attribute(common::id_attribute("The GUID of the isolation segment"))
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Name of the isolation segment")
                    .required()
                    .validator(StringLengthValidator::min(1))
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
        match self.create_segment(&request).await {
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
        match self.read_segment(&request).await {
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
        match self.update_segment(&request).await {
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
            diagnostics: self.delete_segment(&request).await.err().into_iter().collect(),
        }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for IsolationSegmentResource {
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
impl ResourceWithImportState for IsolationSegmentResource {
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
    use crate::test_support::{provider_data, resource_json, value};
    use mockito::{Matcher, Server};

    const SEGMENT: &str = "8b9c0d1e-0000-4000-8000-0000000000e1";

    #[tokio::test]
    async fn rename_sends_only_the_name() {
        let mut server = Server::new_async().await;
        let patch = server
            .mock("PATCH", format!("/v3/isolation_segments/{}", SEGMENT).as_str())
            .match_body(Matcher::Json(serde_json::json!({"name": "gpu"})))
            .with_body(resource_json(SEGMENT, serde_json::json!({"name": "gpu"})))
            .create_async()
            .await;

        let mut resource = IsolationSegmentResource::new();
        resource
            .configure(
                Context::new(),
                ConfigureResourceRequest {
                    provider_data: provider_data(&server.url()),
                },
            )
            .await;
        let response = resource
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: "cloudfoundry_isolation_segment".to_string(),
                    prior_state: value(serde_json::json!({"id": SEGMENT, "name": "cpu"})),
                    planned_state: value(serde_json::json!({"id": SEGMENT, "name": "gpu"})),
                    config: DynamicValue::null(),
                    planned_private: vec![],
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.new_state.value.to_json();
        assert_eq!(state["name"], "gpu");
        assert_eq!(state["created_at"], "2024-01-02T03:04:05Z");
        patch.assert_async().await;
    }
}
