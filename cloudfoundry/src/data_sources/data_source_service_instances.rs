//! Service instances of a space or an organization

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse, ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, NestedType, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};
use tfplug::validator::{at_least_one_of, UuidValidator};

use crate::api::ListOptions;
use crate::common::{self, StringMap};
use crate::provider_data::require_client;
use crate::resources::{
    last_operation_attributes, maintenance_info_attributes, LastOperationModel,
    MaintenanceInfoModel, ServiceInstanceModel,
};
use crate::CloudFoundryProviderData;

/// A listed service instance, without the secrets only known to its owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInstanceEntryModel {
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub instance_type: String,
    pub space: String,
    pub service_plan: Option<String>,
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

impl From<ServiceInstanceModel> for ServiceInstanceEntryModel {
    fn from(model: ServiceInstanceModel) -> Self {
        Self {
            id: model.id,
            name: model.name,
            instance_type: model.instance_type,
            space: model.space,
            service_plan: model.service_plan,
            syslog_drain_url: model.syslog_drain_url,
            route_service_url: model.route_service_url,
            tags: model.tags,
            dashboard_url: model.dashboard_url,
            upgrade_available: model.upgrade_available,
            maintenance_info: model.maintenance_info,
            last_operation: model.last_operation,
            labels: model.labels,
            annotations: model.annotations,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInstancesModel {
    pub space: Option<String>,
    pub org: Option<String>,
    pub name: Option<String>,
    pub service_instances: Option<Vec<ServiceInstanceEntryModel>>,
}

#[derive(Default)]
pub struct ServiceInstancesDataSource {
    provider_data: Option<CloudFoundryProviderData>,
}

impl ServiceInstancesDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_instances(&self, request: &ReadDataSourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let mut model: ServiceInstancesModel = common::decode(&request.config)?;

        let instances = client
            .service_instances()
            .list(
                &ListOptions::new()
                    .add_optional("space_guids", model.space.as_ref())
                    .add_optional("organization_guids", model.org.as_ref())
                    .add_optional("names", model.name.as_ref()),
            )
            .await
            .map_err(|e| common::api_error("API Error Reading Service Instances", &e))?;

        if instances.is_empty() {
            return Err(super::nothing_found(
                "Unable to find any service instance in list",
                &[("name", &model.name), ("space", &model.space), ("org", &model.org)],
            ));
        }

        model.service_instances = Some(
            instances
                .iter()
                .map(|instance| ServiceInstanceModel::from(instance).into())
                .collect(),
        );
        common::encode(&model)
    }
}

#[async_trait]
impl DataSource for ServiceInstancesDataSource {
    fn type_name(&self) -> &str {
        "cloudfoundry_service_instances"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let mut attributes = vec![
            common::computed_string("id", "The GUID of the service instance"),
            common::computed_string("name", "The name of the service instance"),
            common::computed_string("type", "The type of the service instance, managed or user-provided"),
            common::computed_string("space", "The GUID of the space"),
            common::computed_string("service_plan", "The GUID of the service plan of a managed instance"),
            common::computed_string("syslog_drain_url", "URL to which logs are streamed"),
            common::computed_string("route_service_url", "URL to which requests for bound routes are forwarded"),
            common::computed_string_list("tags", "Tags used by apps to identify the instance"),
            common::computed_string("dashboard_url", "The URL to the service instance dashboard"),
            common::computed_bool("upgrade_available", "Whether a newer plan version is available"),
            AttributeBuilder::nested("maintenance_info", NestedType::single(maintenance_info_attributes()))
                .description("Information about the version of this service instance")
                .computed()
                .build(),
            AttributeBuilder::nested("last_operation", NestedType::single(last_operation_attributes()))
                .description("The last operation of this service instance")
                .computed()
                .build(),
        ];
        attributes.extend(common::computed_common_attributes());

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Gets information on the service instances of a space or an organization.")
            .attribute(
                AttributeBuilder::new("space", AttributeType::String)
                    .description("The GUID of the space to filter by")
                    .optional()
                    .validator(UuidValidator::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("org", AttributeType::String)
                    .description("The GUID of the organization to filter by")
                    .optional()
                    .validator(UuidValidator::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the service instance to filter by")
                    .optional()
                    .build(),
            )
            .attribute(super::results_attribute(
                "service_instances",
                "The list of service instances",
                attributes,
            ))
            .build();

        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse {
        ValidateDataSourceConfigResponse {
            diagnostics: at_least_one_of(&request.config, &["space", "org"])
                .into_iter()
                .collect(),
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        super::respond(self.read_instances(&request).await)
    }
}

#[async_trait]
impl DataSourceWithConfigure for ServiceInstancesDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        super::configure(&mut self.provider_data, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        configured_data_source, page_json, read_request, resource_json, value, ORG_GUID, SPACE_GUID,
    };
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn space_or_org_is_required() {
        let data_source = ServiceInstancesDataSource::new();
        let response = data_source
            .validate(
                Context::new(),
                ValidateDataSourceConfigRequest {
                    type_name: "cloudfoundry_service_instances".to_string(),
                    config: value(serde_json::json!({"name": "db"})),
                },
            )
            .await;
        assert_eq!(response.diagnostics.len(), 1);

        let response = data_source
            .validate(
                Context::new(),
                ValidateDataSourceConfigRequest {
                    type_name: "cloudfoundry_service_instances".to_string(),
                    config: value(serde_json::json!({"org": ORG_GUID})),
                },
            )
            .await;
        assert!(response.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn instances_omit_secrets() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v3/service_instances")
            .match_query(Matcher::UrlEncoded("space_guids".into(), SPACE_GUID.into()))
            .with_body(page_json(&[resource_json(
                "3d4e5f6a-0000-4000-8000-0000000000c1",
                serde_json::json!({
                    "name": "db",
                    "type": "managed",
                    "tags": ["sql"],
                    "relationships": {
                        "space": {"data": {"guid": SPACE_GUID}},
                        "service_plan": {"data": {"guid": "3d4e5f6a-0000-4000-8000-0000000000b1"}}
                    }
                }),
            )]))
            .create_async()
            .await;

        let data_source = configured_data_source(ServiceInstancesDataSource::new(), &server.url()).await;
        let response = data_source
            .read(
                Context::new(),
                read_request("cloudfoundry_service_instances", serde_json::json!({"space": SPACE_GUID})),
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let instance = response.state.value.to_json()["service_instances"][0].clone();
        assert_eq!(instance["name"], "db");
        assert_eq!(instance["tags"], serde_json::json!(["sql"]));
        assert!(instance.get("credentials").is_none());
        mock.assert_async().await;
    }
}
