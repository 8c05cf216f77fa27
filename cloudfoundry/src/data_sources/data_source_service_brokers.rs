//! Service brokers

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};
use tfplug::validator::UuidValidator;

use crate::api::ListOptions;
use crate::common::{self, StringMap};
use crate::provider_data::require_client;
use crate::resources::ServiceBrokerModel;
use crate::CloudFoundryProviderData;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceBrokerEntryModel {
    pub id: Option<String>,
    pub name: String,
    pub url: String,
    pub space: Option<String>,
    pub labels: Option<StringMap>,
    pub annotations: Option<StringMap>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl From<ServiceBrokerModel> for ServiceBrokerEntryModel {
    fn from(model: ServiceBrokerModel) -> Self {
        Self {
            id: model.id,
            name: model.name,
            url: model.url,
            space: model.space,
            labels: model.labels,
            annotations: model.annotations,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceBrokersModel {
    pub name: Option<String>,
    pub space: Option<String>,
    pub service_brokers: Option<Vec<ServiceBrokerEntryModel>>,
}

#[derive(Default)]
pub struct ServiceBrokersDataSource {
    provider_data: Option<CloudFoundryProviderData>,
}

impl ServiceBrokersDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_brokers(&self, request: &ReadDataSourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let mut model: ServiceBrokersModel = common::decode(&request.config)?;

        let brokers = client
            .service_brokers()
            .list(
                &ListOptions::new()
                    .add_optional("names", model.name.as_ref())
                    .add_optional("space_guids", model.space.as_ref()),
            )
            .await
            .map_err(|e| common::api_error("API Error Reading Service Brokers", &e))?;

        if brokers.is_empty() {
            return Err(super::nothing_found(
                "Unable to find any service broker in list",
                &[("name", &model.name), ("space", &model.space)],
            ));
        }

        model.service_brokers = Some(
            brokers
                .iter()
                .map(|broker| ServiceBrokerModel::from(broker).into())
                .collect(),
        );
        common::encode(&model)
    }
}

#[async_trait]
impl DataSource for ServiceBrokersDataSource {
    fn type_name(&self) -> &str {
        "cloudfoundry_service_brokers"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let mut attributes = vec![
            common::computed_string("id", "The GUID of the service broker"),
            common::computed_string("name", "The name of the service broker"),
            common::computed_string("url", "The URL of the service broker"),
            common::computed_string("space", "The GUID of the space a space-scoped broker belongs to"),
        ];
        attributes.extend(common::computed_common_attributes());

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Gets information on the service brokers registered with the platform.")
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the service broker to filter by")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("space", AttributeType::String)
                    .description("The GUID of the space to filter by")
                    .optional()
                    .validator(UuidValidator::create())
                    .build(),
            )
            .attribute(super::results_attribute(
                "service_brokers",
                "The list of service brokers",
                attributes,
            ))
            .build();

        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        super::respond(self.read_brokers(&request).await)
    }
}

#[async_trait]
impl DataSourceWithConfigure for ServiceBrokersDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        super::configure(&mut self.provider_data, request)
    }
}
