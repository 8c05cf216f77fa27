//! Security groups

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse,
};
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType, NestedType, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};

use crate::api::ListOptions;
use crate::common;
use crate::provider_data::require_client;
use crate::resources::SecurityGroupModel;
use crate::CloudFoundryProviderData;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroupsModel {
    pub name: Option<String>,
    pub security_groups: Option<Vec<SecurityGroupModel>>,
}

#[derive(Default)]
pub struct SecurityGroupsDataSource {
    provider_data: Option<CloudFoundryProviderData>,
}

impl SecurityGroupsDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_groups(&self, request: &ReadDataSourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let mut model: SecurityGroupsModel = common::decode(&request.config)?;

        let groups = client
            .security_groups()
            .list(&ListOptions::new().add_optional("names", model.name.as_ref()))
            .await
            .map_err(|e| common::api_error("API Error Reading Security Groups", &e))?;

        if groups.is_empty() {
            return Err(super::nothing_found(
                "Unable to find any security group in list",
                &[("name", &model.name)],
            ));
        }

        model.security_groups = Some(groups.iter().map(SecurityGroupModel::from).collect());
        common::encode(&model)
    }
}

fn group_attributes() -> Vec<Attribute> {
    let rules = vec![
        common::computed_string("protocol", "Protocol type, one of tcp, udp, icmp or all"),
        common::computed_string("destination", "Destinations that the rule applies to"),
        common::computed_string("ports", "Ports that the rule applies to"),
        common::computed_number("type", "ICMP type"),
        common::computed_number("code", "ICMP code"),
        common::computed_string("description", "A description for the rule"),
        common::computed_bool("log", "Whether logging is enabled for the rule"),
    ];

    vec![
        common::computed_string("id", "The GUID of the security group"),
        common::computed_string("name", "Name of the security group"),
        common::computed_bool(
            "globally_enabled_running",
            "Whether the group applies to all running apps",
        ),
        common::computed_bool(
            "globally_enabled_staging",
            "Whether the group applies to all staging apps",
        ),
        AttributeBuilder::nested("rules", NestedType::list(rules))
            .description("Rules that will be applied by this security group")
            .computed()
            .build(),
        common::computed_string_list("running_spaces", "Spaces where the group applies to running apps"),
        common::computed_string_list("staging_spaces", "Spaces where the group applies to staging apps"),
        common::computed_string("created_at", "The date and time when the resource was created in RFC3339 format."),
        common::computed_string("updated_at", "The date and time when the resource was updated in RFC3339 format."),
    ]
}

#[async_trait]
impl DataSource for SecurityGroupsDataSource {
    fn type_name(&self) -> &str {
        "cloudfoundry_security_groups"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Gets information on the security groups visible to the user.")
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the security group to filter by")
                    .optional()
                    .build(),
            )
            .attribute(super::results_attribute(
                "security_groups",
                "The list of security groups",
                group_attributes(),
            ))
            .build();

        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        super::respond(self.read_groups(&request).await)
    }
}

#[async_trait]
impl DataSourceWithConfigure for SecurityGroupsDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        super::configure(&mut self.provider_data, request)
    }
}
