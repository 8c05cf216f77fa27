//! Domains visible to an organization

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse,
};
use tfplug::schema::SchemaBuilder;
use tfplug::types::{Diagnostic, DynamicValue};

use crate::api::ListOptions;
use crate::common;
use crate::provider_data::require_client;
use crate::resources::DomainModel;
use crate::CloudFoundryProviderData;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainsModel {
    pub org: String,
    pub domains: Option<Vec<DomainModel>>,
}

#[derive(Default)]
pub struct DomainsDataSource {
    provider_data: Option<CloudFoundryProviderData>,
}

impl DomainsDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_domains(&self, request: &ReadDataSourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let mut model: DomainsModel = common::decode(&request.config)?;

        let domains = client
            .domains()
            .list_for_organization(&model.org, &ListOptions::new())
            .await
            .map_err(|e| common::api_error("API Error Reading Domains", &e))?;

        if domains.is_empty() {
            return Err(Diagnostic::error(
                "Unable to find any domain in the list",
                format!("No domains are available to org {}", model.org),
            ));
        }

        model.domains = Some(domains.iter().map(DomainModel::from).collect());
        common::encode(&model)
    }
}

#[async_trait]
impl DataSource for DomainsDataSource {
    fn type_name(&self) -> &str {
        "cloudfoundry_domains"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let mut attributes = vec![
            common::computed_string("id", "The GUID of the domain"),
            common::computed_string("name", "The name of the domain"),
            common::computed_string("org", "The GUID of the owning organization, null for shared domains"),
            common::computed_bool("internal", "Whether the domain is used for internal traffic"),
            common::computed_string("router_group", "The GUID of the router group of a TCP domain"),
            common::computed_string_list("shared_orgs", "Organizations the domain is shared with"),
            common::computed_string_list("supported_protocols", "Protocols the domain supports"),
        ];
        attributes.extend(common::computed_common_attributes());

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Gets the private and shared domains available to an organization.")
            .attribute(common::guid_filter("org", "The GUID of the organization"))
            .attribute(super::results_attribute("domains", "The list of domains", attributes))
            .build();

        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        super::respond(self.read_domains(&request).await)
    }
}

#[async_trait]
impl DataSourceWithConfigure for DomainsDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        super::configure(&mut self.provider_data, request)
    }
}
