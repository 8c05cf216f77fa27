//! Organization lookups

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse,
};
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};
use tfplug::validator::StringLengthValidator;

use crate::api::ListOptions;
use crate::common;
use crate::provider_data::require_client;
use crate::resources::OrgModel;
use crate::CloudFoundryProviderData;

fn org_attributes() -> Vec<Attribute> {
    let mut attributes = vec![
        common::computed_string("id", "The GUID of the organization"),
        common::computed_bool("suspended", "Whether the organization is suspended"),
        common::computed_string("quota", "The GUID of the organization quota"),
    ];
    attributes.extend(common::computed_common_attributes());
    attributes
}

#[derive(Deserialize)]
struct OrgFilter {
    name: String,
}

#[derive(Default)]
pub struct OrgDataSource {
    provider_data: Option<CloudFoundryProviderData>,
}

impl OrgDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_org(&self, request: &ReadDataSourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let filter: OrgFilter = common::decode(&request.config)?;

        let orgs = client
            .organizations()
            .list(&ListOptions::new().add("names", &filter.name))
            .await
            .map_err(|e| common::api_error("API Error Reading Org", &e))?;

        let org = orgs.first().ok_or_else(|| {
            Diagnostic::error(
                "Unable to find org data in list",
                format!("Given name {} not in the list of orgs.", filter.name),
            )
        })?;
        common::encode(&OrgModel::from(org))
    }
}

#[async_trait]
impl DataSource for OrgDataSource {
    fn type_name(&self) -> &str {
        "cloudfoundry_org"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let mut builder = SchemaBuilder::new()
            .version(0)
            .description("Gets information on a Cloud Foundry organization.")
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the organization to look up")
                    .required()
                    .validator(StringLengthValidator::min(1))
                    .build(),
            );
        for attribute in org_attributes() {
            builder = builder.attribute(attribute);
        }

        DataSourceSchemaResponse {
            schema: builder.build(),
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        super::respond(self.read_org(&request).await)
    }
}

#[async_trait]
impl DataSourceWithConfigure for OrgDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        super::configure(&mut self.provider_data, request)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgsModel {
    pub name: Option<String>,
    pub orgs: Option<Vec<OrgModel>>,
}

#[derive(Default)]
pub struct OrgsDataSource {
    provider_data: Option<CloudFoundryProviderData>,
}

impl OrgsDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_orgs(&self, request: &ReadDataSourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let mut model: OrgsModel = common::decode(&request.config)?;

        let orgs = client
            .organizations()
            .list(&ListOptions::new().add_optional("names", model.name.as_ref()))
            .await
            .map_err(|e| common::api_error("API Error Reading Orgs", &e))?;

        tracing::debug!("Found {} organizations", orgs.len());
        model.orgs = Some(orgs.iter().map(OrgModel::from).collect());
        common::encode(&model)
    }
}

#[async_trait]
impl DataSource for OrgsDataSource {
    fn type_name(&self) -> &str {
        "cloudfoundry_orgs"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let mut attributes = vec![AttributeBuilder::new("name", AttributeType::String)
            .description("The name of the organization")
            .computed()
            .build()];
        attributes.extend(org_attributes());

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Gets information on Cloud Foundry organizations the user has access to.")
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the organization to filter by")
                    .optional()
                    .build(),
            )
            .attribute(super::results_attribute(
                "orgs",
                "The list of organizations",
                attributes,
            ))
            .build();

        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        super::respond(self.read_orgs(&request).await)
    }
}

#[async_trait]
impl DataSourceWithConfigure for OrgsDataSource {
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
        configured_data_source, page_json, read_request, resource_json, ORG_GUID,
    };
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn org_is_found_by_name() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v3/organizations")
            .match_query(Matcher::UrlEncoded("names".into(), "demo".into()))
            .with_body(page_json(&[resource_json(
                ORG_GUID,
                serde_json::json!({"name": "demo", "suspended": false}),
            )]))
            .create_async()
            .await;

        let data_source = configured_data_source(OrgDataSource::new(), &server.url()).await;
        let response = data_source
            .read(Context::new(), read_request("cloudfoundry_org", serde_json::json!({"name": "demo"})))
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.state.value.to_json();
        assert_eq!(state["id"], ORG_GUID);
        assert_eq!(state["suspended"], false);
        assert_eq!(state["created_at"], "2024-01-02T03:04:05Z");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_org_is_an_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v3/organizations")
            .match_query(Matcher::Any)
            .with_body(page_json(&[]))
            .create_async()
            .await;

        let data_source = configured_data_source(OrgDataSource::new(), &server.url()).await;
        let response = data_source
            .read(Context::new(), read_request("cloudfoundry_org", serde_json::json!({"name": "nope"})))
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Unable to find org data in list");
    }

    #[tokio::test]
    async fn empty_orgs_list_is_not_an_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v3/organizations")
            .with_body(page_json(&[]))
            .create_async()
            .await;

        let data_source = configured_data_source(OrgsDataSource::new(), &server.url()).await;
        let response = data_source
            .read(Context::new(), read_request("cloudfoundry_orgs", serde_json::json!({})))
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(response.state.value.to_json()["orgs"], serde_json::json!([]));
    }
}
