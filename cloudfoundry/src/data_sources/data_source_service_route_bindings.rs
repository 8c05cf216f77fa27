//! Route bindings of route services

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, NestedType, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};
use tfplug::validator::UuidValidator;

use crate::api::ListOptions;
use crate::common::{self, StringMap};
use crate::provider_data::require_client;
use crate::resources::{last_operation_attributes, LastOperationModel, ServiceRouteBindingModel};
use crate::CloudFoundryProviderData;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteBindingEntryModel {
    pub id: Option<String>,
    pub service_instance: String,
    pub route: String,
    pub route_service_url: Option<String>,
    pub last_operation: Option<LastOperationModel>,
    pub labels: Option<StringMap>,
    pub annotations: Option<StringMap>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl From<ServiceRouteBindingModel> for RouteBindingEntryModel {
    fn from(model: ServiceRouteBindingModel) -> Self {
        Self {
            id: model.id,
            service_instance: model.service_instance,
            route: model.route,
            route_service_url: model.route_service_url,
            last_operation: model.last_operation,
            labels: model.labels,
            annotations: model.annotations,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRouteBindingsModel {
    pub service_instance: Option<String>,
    pub route: Option<String>,
    pub route_bindings: Option<Vec<RouteBindingEntryModel>>,
}

#[derive(Default)]
pub struct ServiceRouteBindingsDataSource {
    provider_data: Option<CloudFoundryProviderData>,
}

impl ServiceRouteBindingsDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_bindings(&self, request: &ReadDataSourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let mut model: ServiceRouteBindingsModel = common::decode(&request.config)?;

        let bindings = client
            .service_route_bindings()
            .list(
                &ListOptions::new()
                    .add_optional("service_instance_guids", model.service_instance.as_ref())
                    .add_optional("route_guids", model.route.as_ref()),
            )
            .await
            .map_err(|e| common::api_error("API Error Reading Service Route Bindings", &e))?;

        if bindings.is_empty() {
            return Err(super::nothing_found(
                "Unable to find any route binding in list",
                &[("service_instance", &model.service_instance), ("route", &model.route)],
            ));
        }

        model.route_bindings = Some(
            bindings
                .iter()
                .map(|binding| ServiceRouteBindingModel::from(binding).into())
                .collect(),
        );
        common::encode(&model)
    }
}

fn optional_guid(name: &str, description: &str) -> tfplug::schema::Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .description(description)
        .optional()
        .validator(UuidValidator::create())
        .build()
}

#[async_trait]
impl DataSource for ServiceRouteBindingsDataSource {
    fn type_name(&self) -> &str {
        "cloudfoundry_service_route_bindings"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let mut attributes = vec![
            common::computed_string("id", "The GUID of the route binding"),
            common::computed_string("service_instance", "The GUID of the route service instance"),
            common::computed_string("route", "The GUID of the bound route"),
            common::computed_string("route_service_url", "The URL requests are forwarded to"),
            AttributeBuilder::nested("last_operation", NestedType::single(last_operation_attributes()))
                .description("The last operation of the binding")
                .computed()
                .build(),
        ];
        attributes.extend(common::computed_common_attributes());

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Gets information on the route bindings of route service instances.")
            .attribute(optional_guid("service_instance", "The GUID of the service instance to filter by"))
            .attribute(optional_guid("route", "The GUID of the route to filter by"))
            .attribute(super::results_attribute(
                "route_bindings",
                "The list of route bindings",
                attributes,
            ))
            .build();

        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        super::respond(self.read_bindings(&request).await)
    }
}

#[async_trait]
impl DataSourceWithConfigure for ServiceRouteBindingsDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        super::configure(&mut self.provider_data, request)
    }
}
