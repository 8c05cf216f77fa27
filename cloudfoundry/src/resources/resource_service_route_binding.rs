//! Binding of a route to a route service instance

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tfplug::context::Context;
use tfplug::import::import_state_passthrough_id;
use tfplug::plan_modifier::RequiresReplace;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, UpdateResourceRequest,
    UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, NestedType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};

use super::resource_service_instance::{last_operation_attributes, LastOperationModel};
use crate::api::service_route_bindings::{
    CreateServiceRouteBindingRequest, ServiceRouteBinding, ServiceRouteBindingRelationships,
};
use crate::api::ToOneRelationship;
use crate::common::{self, StringMap};
use crate::provider_data::{extract_provider_data, require_client, ConfigureTarget};
use crate::CloudFoundryProviderData;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRouteBindingModel {
    pub id: Option<String>,
    pub service_instance: String,
    pub route: String,
    pub parameters: Option<String>,
    pub route_service_url: Option<String>,
    pub last_operation: Option<LastOperationModel>,
    pub labels: Option<StringMap>,
    pub annotations: Option<StringMap>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl From<&ServiceRouteBinding> for ServiceRouteBindingModel {
    fn from(binding: &ServiceRouteBinding) -> Self {
        let relationships = &binding.relationships;
        Self {
            id: Some(binding.guid.clone()),
            service_instance: relationships
                .service_instance
                .guid()
                .unwrap_or_default()
                .to_string(),
            route: relationships.route.guid().unwrap_or_default().to_string(),
            parameters: None,
            route_service_url: binding.route_service_url.clone(),
            last_operation: binding.last_operation.as_ref().map(LastOperationModel::from),
            labels: common::labels_from(&binding.metadata),
            annotations: common::annotations_from(&binding.metadata),
            created_at: Some(binding.created_at.clone()),
            updated_at: Some(binding.updated_at.clone()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BindingParameters {
    parameters: Option<String>,
}

#[derive(Default)]
pub struct ServiceRouteBindingResource {
    provider_data: Option<CloudFoundryProviderData>,
}

impl ServiceRouteBindingResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn create_binding(&self, request: &CreateResourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let plan: ServiceRouteBindingModel = common::decode(&request.planned_state)?;

        let binding = client
            .service_route_bindings()
            .create(&CreateServiceRouteBindingRequest {
                relationships: ServiceRouteBindingRelationships {
                    service_instance: ToOneRelationship::new(plan.service_instance.clone()),
                    route: ToOneRelationship::new(plan.route.clone()),
                },
                parameters: common::parse_json_attribute("parameters", &plan.parameters)?,
                metadata: common::metadata_request(&plan.labels, &plan.annotations),
            })
            .await
            .map_err(|e| common::api_error("API Error Creating Service Route Binding", &e))?;

        tracing::debug!("Bound route {} to service instance {}", plan.route, plan.service_instance);
        let mut model = ServiceRouteBindingModel::from(&binding);
        model.parameters = plan.parameters;
        common::encode(&model)
    }

    async fn read_binding(&self, request: &ReadResourceRequest) -> Result<Option<DynamicValue>, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let id = common::state_id(&request.current_state)?;
        let stored: BindingParameters = common::decode(&request.current_state)?;

        match client.service_route_bindings().get(&id).await {
            Ok(binding) => {
                let mut model = ServiceRouteBindingModel::from(&binding);
                model.parameters = stored.parameters;
                common::encode(&model).map(Some)
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!("Service route binding {} no longer exists, removing from state", id);
                Ok(None)
            }
            Err(e) => Err(common::api_error("API Error Reading Service Route Binding", &e)),
        }
    }

    /// Only metadata changes in place
    async fn update_binding(&self, request: &UpdateResourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let plan: ServiceRouteBindingModel = common::decode(&request.planned_state)?;
        let prior: ServiceRouteBindingModel = common::decode(&request.prior_state)?;
        let id = common::state_id(&request.prior_state)?;

        let metadata = common::metadata_patch(
            &plan.labels,
            &plan.annotations,
            &prior.labels,
            &prior.annotations,
        );
        let binding = client
            .service_route_bindings()
            .update_metadata(&id, &metadata)
            .await
            .map_err(|e| common::api_error("API Error Updating Service Route Binding", &e))?;

        let mut model = ServiceRouteBindingModel::from(&binding);
        model.parameters = plan.parameters;
        common::encode(&model)
    }

    async fn delete_binding(&self, request: &DeleteResourceRequest) -> Result<(), Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let id = common::state_id(&request.prior_state)?;

        match client.service_route_bindings().delete(&id).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(common::api_error("API Error Deleting Service Route Binding", &e)),
        }
    }
}

#[async_trait]
impl Resource for ServiceRouteBindingResource {
    fn type_name(&self) -> &str {
        "cloudfoundry_service_route_binding"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Provides a resource for binding a route to a route service instance. Any change other than metadata recreates the binding.")
            .attribute(common::id_attribute("The GUID of the service route binding"))
            .attribute(common::guid_reference("service_instance", "The service instance that the route is bound to"))
            .attribute(common::guid_reference("route", "The route that the service instance is bound to"))
            .attribute(
                AttributeBuilder::new("parameters", AttributeType::String)
                    .description("A JSON object that is passed to the service broker")
                    .optional()
                    .sensitive()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(common::computed_string(
                "route_service_url",
                "The URL for the route service",
            ))
            .attribute(
                AttributeBuilder::nested("last_operation", NestedType::single(last_operation_attributes()))
                    .description("The last operation of this binding")
                    .computed()
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
        match self.create_binding(&request).await {
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
        match self.read_binding(&request).await {
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
        match self.update_binding(&request).await {
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
            diagnostics: self.delete_binding(&request).await.err().into_iter().collect(),
        }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for ServiceRouteBindingResource {
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
impl ResourceWithImportState for ServiceRouteBindingResource {
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

    const BINDING: &str = "7a8b9c0d-0000-4000-8000-0000000000d1";
    const INSTANCE: &str = "7a8b9c0d-0000-4000-8000-0000000000d2";
    const ROUTE: &str = "7a8b9c0d-0000-4000-8000-0000000000d3";

    #[tokio::test]
    async fn create_binds_route_and_keeps_parameters() {
        let mut server = Server::new_async().await;
        let create = server
            .mock("POST", "/v3/service_route_bindings")
            .match_body(Matcher::Json(serde_json::json!({
                "relationships": {
                    "service_instance": {"data": {"guid": INSTANCE}},
                    "route": {"data": {"guid": ROUTE}}
                },
                "parameters": {"rate_limit": 100}
            })))
            .with_status(201)
            .with_body(resource_json(
                BINDING,
                serde_json::json!({
                    "route_service_url": "https://limiter.example.com",
                    "last_operation": {"type": "create", "state": "succeeded"},
                    "relationships": {
                        "service_instance": {"data": {"guid": INSTANCE}},
                        "route": {"data": {"guid": ROUTE}}
                    }
                }),
            ))
            .create_async()
            .await;

        let mut resource = ServiceRouteBindingResource::new();
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
                    type_name: "cloudfoundry_service_route_binding".to_string(),
                    planned_state: value(serde_json::json!({
                        "service_instance": INSTANCE,
                        "route": ROUTE,
                        "parameters": "{\"rate_limit\": 100}"
                    })),
                    config: DynamicValue::null(),
                    planned_private: vec![],
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.new_state.value.to_json();
        assert_eq!(state["id"], BINDING);
        assert_eq!(state["route_service_url"], "https://limiter.example.com");
        assert_eq!(state["parameters"], "{\"rate_limit\": 100}");
        assert_eq!(state["last_operation"]["state"], "succeeded");
        create.assert_async().await;
    }
}
