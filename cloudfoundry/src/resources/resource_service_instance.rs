//! Managed and user-provided service instance resource
//!
//! Managed instances are provisioned by the broker through asynchronous jobs.
//! Broker parameters and user-provided credentials are never returned by the
//! platform, so they are carried over from the configuration.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tfplug::context::Context;
use tfplug::import::import_state_passthrough_id;
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, UpdateResourceRequest,
    UpdateResourceResponse, ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, NestedType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::{StringOneOfValidator, UuidValidator};

use crate::api::service_instances::{
    CreateServiceInstanceRequest, LastOperation, MaintenanceInfo, ServiceInstance,
    ServiceInstanceRelationships, UpdateServiceInstanceRelationships,
    UpdateServiceInstanceRequest, MANAGED, USER_PROVIDED,
};
use crate::api::ToOneRelationship;
use crate::common::{self, StringMap};
use crate::provider_data::{extract_provider_data, require_client, ConfigureTarget};
use crate::CloudFoundryProviderData;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceInfoModel {
    pub version: String,
    pub description: Option<String>,
}

impl From<&MaintenanceInfo> for MaintenanceInfoModel {
    fn from(info: &MaintenanceInfo) -> Self {
        Self {
            version: info.version.clone(),
            description: info.description.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastOperationModel {
    #[serde(rename = "type")]
    pub operation_type: String,
    pub state: String,
    pub description: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl From<&LastOperation> for LastOperationModel {
    fn from(op: &LastOperation) -> Self {
        Self {
            operation_type: op.operation_type.clone(),
            state: op.state.clone(),
            description: op.description.clone(),
            created_at: op.created_at.clone(),
            updated_at: op.updated_at.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInstanceModel {
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub instance_type: String,
    pub space: String,
    pub service_plan: Option<String>,
    pub parameters: Option<String>,
    pub credentials: Option<String>,
    pub syslog_drain_url: Option<String>,
    pub route_service_url: Option<String>,
    pub tags: Option<Vec<String>>,
    pub dashboard_url: Option<String>,
    pub upgrade_available: Option<bool>,
    pub maintenance_info: Option<MaintenanceInfoModel>,
    pub last_operation: Option<LastOperationModel>,
    pub labels: Option<StringMap>,
    pub annotations: Option<StringMap>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl From<&ServiceInstance> for ServiceInstanceModel {
    fn from(instance: &ServiceInstance) -> Self {
        Self {
            id: Some(instance.guid.clone()),
            name: instance.name.clone(),
            instance_type: instance.instance_type.clone(),
            space: instance
                .relationships
                .space
                .guid()
                .unwrap_or_default()
                .to_string(),
            service_plan: instance
                .relationships
                .service_plan
                .guid()
                .map(str::to_string),
            parameters: None,
            credentials: None,
            syslog_drain_url: instance.syslog_drain_url.clone().filter(|s| !s.is_empty()),
            route_service_url: instance.route_service_url.clone().filter(|s| !s.is_empty()),
            tags: (!instance.tags.is_empty()).then(|| instance.tags.clone()),
            dashboard_url: instance.dashboard_url.clone(),
            upgrade_available: instance.upgrade_available,
            maintenance_info: instance.maintenance_info.as_ref().map(MaintenanceInfoModel::from),
            last_operation: instance.last_operation.as_ref().map(LastOperationModel::from),
            labels: common::labels_from(&instance.metadata),
            annotations: common::annotations_from(&instance.metadata),
            created_at: Some(instance.created_at.clone()),
            updated_at: Some(instance.updated_at.clone()),
        }
    }
}

/// Attributes only known from the configuration
#[derive(Debug, Default, Deserialize)]
struct Secrets {
    parameters: Option<String>,
    credentials: Option<String>,
}

impl ServiceInstanceModel {
    fn with_secrets(mut self, secrets: Secrets) -> Self {
        self.parameters = secrets.parameters;
        self.credentials = secrets.credentials;
        self
    }

    fn secrets(&self) -> Secrets {
        Secrets {
            parameters: self.parameters.clone(),
            credentials: self.credentials.clone(),
        }
    }

    fn is_managed(&self) -> bool {
        self.instance_type == MANAGED
    }
}

/// Attributes that only apply to one instance type
fn check_type_attributes(config: &DynamicValue) -> Vec<Diagnostic> {
    let Some(instance_type) = config
        .get(&AttributePath::new("type"))
        .and_then(Dynamic::as_string)
    else {
        return vec![];
    };
    let (required, forbidden): (&[&str], &[&str]) = match instance_type {
        MANAGED => (
            &["service_plan"],
            &["credentials", "syslog_drain_url", "route_service_url"],
        ),
        USER_PROVIDED => (&[], &["service_plan", "parameters"]),
        _ => return vec![],
    };

    let attribute = |name: &str| config.get(&AttributePath::new(name));
    let missing = required
        .iter()
        .copied()
        .filter(|&name| attribute(name).map_or(true, Dynamic::is_null))
        .map(|name| {
            Diagnostic::error(
                "Missing Attribute Configuration",
                format!("Attribute {} must be set for {} service instances", name, instance_type),
            )
            .with_attribute(AttributePath::new(name))
        });
    let unsupported = forbidden
        .iter()
        .copied()
        .filter(|&name| attribute(name).is_some_and(|v| !v.is_null() && !v.is_unknown()))
        .map(|name| {
            Diagnostic::error(
                "Invalid Attribute Combination",
                format!("Attribute {} cannot be set for {} service instances", name, instance_type),
            )
            .with_attribute(AttributePath::new(name))
        });

    missing.chain(unsupported).collect()
}

#[derive(Default)]
pub struct ServiceInstanceResource {
    provider_data: Option<CloudFoundryProviderData>,
}

impl ServiceInstanceResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn create_instance(&self, request: &CreateResourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let plan: ServiceInstanceModel = common::decode(&request.planned_state)?;

        let managed = plan.is_managed();
        let create = CreateServiceInstanceRequest {
            instance_type: plan.instance_type.clone(),
            name: plan.name.clone(),
            relationships: ServiceInstanceRelationships {
                space: ToOneRelationship::new(plan.space.clone()),
                service_plan: plan
                    .service_plan
                    .clone()
                    .map(ToOneRelationship::new)
                    .unwrap_or_default(),
            },
            parameters: common::parse_json_attribute("parameters", &plan.parameters)?,
            credentials: common::parse_json_attribute("credentials", &plan.credentials)?,
            syslog_drain_url: plan.syslog_drain_url.clone().filter(|_| !managed),
            route_service_url: plan.route_service_url.clone().filter(|_| !managed),
            tags: plan.tags.clone().unwrap_or_default(),
            metadata: common::metadata_request(&plan.labels, &plan.annotations),
        };

        let instance = client
            .service_instances()
            .create(&create)
            .await
            .map_err(|e| common::api_error("API Error Creating Service Instance", &e))?;

        tracing::debug!(
            "Created {} service instance {} ({})",
            instance.instance_type,
            instance.name,
            instance.guid
        );
        common::encode(&ServiceInstanceModel::from(&instance).with_secrets(plan.secrets()))
    }

    async fn read_instance(&self, request: &ReadResourceRequest) -> Result<Option<DynamicValue>, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let id = common::state_id(&request.current_state)?;
        let secrets: Secrets = common::decode(&request.current_state)?;

        match client.service_instances().get(&id).await {
            Ok(instance) => {
                common::encode(&ServiceInstanceModel::from(&instance).with_secrets(secrets)).map(Some)
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!("Service instance {} no longer exists, removing from state", id);
                Ok(None)
            }
            Err(e) => Err(common::api_error("API Error Reading Service Instance", &e)),
        }
    }

    async fn update_instance(&self, request: &UpdateResourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let plan: ServiceInstanceModel = common::decode(&request.planned_state)?;
        let prior: ServiceInstanceModel = common::decode(&request.prior_state)?;
        let id = common::state_id(&request.prior_state)?;

        let mut update = UpdateServiceInstanceRequest {
            name: Some(plan.name.clone()),
            tags: Some(plan.tags.clone().unwrap_or_default()),
            metadata: common::metadata_patch(
                &plan.labels,
                &plan.annotations,
                &prior.labels,
                &prior.annotations,
            ),
            ..Default::default()
        };
        if plan.is_managed() {
            if plan.service_plan != prior.service_plan {
                update.relationships = plan.service_plan.clone().map(|guid| {
                    UpdateServiceInstanceRelationships {
                        service_plan: ToOneRelationship::new(guid),
                    }
                });
            }
            if plan.parameters != prior.parameters {
                update.parameters = common::parse_json_attribute("parameters", &plan.parameters)?
                    .or(Some(serde_json::json!({})));
            }
        } else {
            if plan.credentials != prior.credentials {
                update.credentials = common::parse_json_attribute("credentials", &plan.credentials)?
                    .or(Some(serde_json::json!({})));
            }
            update.syslog_drain_url = Some(plan.syslog_drain_url.clone().unwrap_or_default());
            update.route_service_url = Some(plan.route_service_url.clone().unwrap_or_default());
        }

        let instance = client
            .service_instances()
            .update(&id, &update)
            .await
            .map_err(|e| common::api_error("API Error Updating Service Instance", &e))?;

        common::encode(&ServiceInstanceModel::from(&instance).with_secrets(plan.secrets()))
    }

    async fn delete_instance(&self, request: &DeleteResourceRequest) -> Result<(), Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let id = common::state_id(&request.prior_state)?;

        match client.service_instances().delete(&id).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(common::api_error("API Error Deleting Service Instance", &e)),
        }
    }
}

pub fn maintenance_info_attributes() -> Vec<tfplug::schema::Attribute> {
    vec![
        common::computed_string("version", "The current semantic version of the service instance"),
        common::computed_string("description", "A textual explanation associated with this version"),
    ]
}

pub fn last_operation_attributes() -> Vec<tfplug::schema::Attribute> {
    vec![
        common::computed_string("type", "Either create, update or delete"),
        common::computed_string("state", "Either initial, in progress, succeeded or failed"),
        common::computed_string("description", "A textual explanation associated with this state"),
        common::computed_string("created_at", "The time with zone when the operation started"),
        common::computed_string("updated_at", "The time with zone when the operation was last updated"),
    ]
}

#[async_trait]
impl Resource for ServiceInstanceResource {
    fn type_name(&self) -> &str {
        "cloudfoundry_service_instance"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Creates a service instance in a Cloud Foundry space. Managed instances are provisioned by a service broker; user-provided instances expose externally managed credentials.")
            .attribute(common::id_attribute("The GUID of the service instance"))
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Name of the service instance")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("type", AttributeType::String)
                    .description("Type of the service instance. Either managed or user-provided.")
                    .required()
                    .validator(StringOneOfValidator::create(&[MANAGED, USER_PROVIDED]))
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(common::guid_reference("space", "The space GUID the service instance is created in"))
            .attribute(
                AttributeBuilder::new("service_plan", AttributeType::String)
                    .description("The ID of the service plan from which to create the service instance. Required for managed instances.")
                    .optional()
                    .validator(UuidValidator::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("parameters", AttributeType::String)
                    .description("A JSON object that is passed to the service broker for managed service instances")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("credentials", AttributeType::String)
                    .description("A JSON object that is made available to apps bound to this user-provided service instance")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("syslog_drain_url", AttributeType::String)
                    .description("URL to which logs for bound applications will be streamed; only for user-provided service instances")
                    .optional()
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("route_service_url", AttributeType::String)
                    .description("URL to which requests for bound routes will be forwarded; only for user-provided service instances")
                    .optional()
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("tags", AttributeType::List(Box::new(AttributeType::String)))
                    .description("Set of tags used by apps to identify service instances")
                    .optional()
                    .build(),
            )
            .attribute(common::computed_string(
                "dashboard_url",
                "The URL to the service instance dashboard (or null if there is none); only shown on managed service instances",
            ))
            .attribute(common::computed_bool(
                "upgrade_available",
                "Whether or not an upgrade of this service instance is available on the current Service Plan",
            ))
            .attribute(
                AttributeBuilder::nested("maintenance_info", NestedType::single(maintenance_info_attributes()))
                    .description("Information about the version of this service instance")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::nested("last_operation", NestedType::single(last_operation_attributes()))
                    .description("The last operation of this service instance")
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

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        ValidateResourceConfigResponse {
            diagnostics: check_type_attributes(&request.config),
        }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        match self.create_instance(&request).await {
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
        match self.read_instance(&request).await {
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
        match self.update_instance(&request).await {
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
            diagnostics: self.delete_instance(&request).await.err().into_iter().collect(),
        }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for ServiceInstanceResource {
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
impl ResourceWithImportState for ServiceInstanceResource {
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
    use crate::test_support::{page_json, provider_data, resource_json, value, SPACE_GUID};
    use mockito::{Matcher, Server};

    const INSTANCE_GUID: &str = "3c4d5e6f-0000-4000-8000-0000000000a1";
    const PLAN_GUID: &str = "3c4d5e6f-0000-4000-8000-0000000000a2";

    fn managed_body() -> String {
        resource_json(
            INSTANCE_GUID,
            serde_json::json!({
                "name": "db",
                "type": "managed",
                "tags": ["sql"],
                "dashboard_url": "https://dashboard.example.com/db",
                "upgrade_available": false,
                "maintenance_info": {"version": "1.2.0"},
                "last_operation": {"type": "create", "state": "succeeded"},
                "relationships": {
                    "space": {"data": {"guid": SPACE_GUID}},
                    "service_plan": {"data": {"guid": PLAN_GUID}}
                }
            }),
        )
    }

    async fn configured(url: &str) -> ServiceInstanceResource {
        let mut resource = ServiceInstanceResource::new();
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

    #[test]
    fn model_flattens_nested_objects() {
        let instance: ServiceInstance = serde_json::from_str(&managed_body()).unwrap();
        let model = ServiceInstanceModel::from(&instance);

        assert_eq!(model.space, SPACE_GUID);
        assert_eq!(model.service_plan.as_deref(), Some(PLAN_GUID));
        assert_eq!(model.maintenance_info.unwrap().version, "1.2.0");
        assert_eq!(model.last_operation.unwrap().state, "succeeded");
        assert_eq!(model.tags, Some(vec!["sql".to_string()]));
        assert!(model.labels.is_none());
    }

    #[tokio::test]
    async fn managed_create_waits_for_job_and_keeps_parameters() {
        let mut server = Server::new_async().await;
        let create = server
            .mock("POST", "/v3/service_instances")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "type": "managed",
                "name": "db",
                "parameters": {"size": "small"},
                "relationships": {"service_plan": {"data": {"guid": PLAN_GUID}}}
            })))
            .with_status(202)
            .with_header("location", &format!("{}/v3/jobs/job-1", server.url()))
            .create_async()
            .await;
        let job = server
            .mock("GET", "/v3/jobs/job-1")
            .with_body(r#"{"guid":"job-1","state":"COMPLETE"}"#)
            .create_async()
            .await;
        let lookup = server
            .mock("GET", "/v3/service_instances")
            .match_query(Matcher::UrlEncoded("names".into(), "db".into()))
            .with_body(page_json(&[managed_body()]))
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "cloudfoundry_service_instance".to_string(),
                    planned_state: value(serde_json::json!({
                        "name": "db",
                        "type": "managed",
                        "space": SPACE_GUID,
                        "service_plan": PLAN_GUID,
                        "parameters": "{\"size\": \"small\"}",
                        "tags": ["sql"]
                    })),
                    config: DynamicValue::null(),
                    planned_private: vec![],
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.new_state.value.to_json();
        assert_eq!(state["id"], INSTANCE_GUID);
        assert_eq!(state["parameters"], "{\"size\": \"small\"}");
        assert_eq!(state["maintenance_info"]["version"], "1.2.0");
        create.assert_async().await;
        job.assert_async().await;
        lookup.assert_async().await;
    }

    #[tokio::test]
    async fn invalid_parameters_fail_before_any_request() {
        let server = Server::new_async().await;
        let resource = configured(&server.url()).await;

        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "cloudfoundry_service_instance".to_string(),
                    planned_state: value(serde_json::json!({
                        "name": "db",
                        "type": "managed",
                        "space": SPACE_GUID,
                        "service_plan": PLAN_GUID,
                        "parameters": "{not json"
                    })),
                    config: DynamicValue::null(),
                    planned_private: vec![],
                },
            )
            .await;

        assert_eq!(response.diagnostics[0].summary, "Invalid JSON");
        assert!(response.new_state.is_null());
    }

    #[test]
    fn type_specific_attributes_are_checked() {
        let managed = check_type_attributes(&value(serde_json::json!({
            "type": "managed",
            "credentials": "{}"
        })));
        let summaries: Vec<_> = managed.iter().map(|d| d.summary.as_str()).collect();
        assert_eq!(
            summaries,
            vec!["Missing Attribute Configuration", "Invalid Attribute Combination"]
        );

        let user_provided = check_type_attributes(&value(serde_json::json!({
            "type": "user-provided",
            "credentials": "{}"
        })));
        assert!(user_provided.is_empty());
    }
}
