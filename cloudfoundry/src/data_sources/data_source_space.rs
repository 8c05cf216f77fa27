//! Space lookups

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
use tfplug::validator::StringLengthValidator;

use crate::api::spaces::Space;
use crate::api::ListOptions;
use crate::common::{self, StringMap};
use crate::provider_data::require_client;
use crate::resources::fetch_space;
use crate::CloudFoundryProviderData;

#[derive(Deserialize)]
struct SpaceFilter {
    name: String,
    org: String,
}

#[derive(Default)]
pub struct SpaceDataSource {
    provider_data: Option<CloudFoundryProviderData>,
}

impl SpaceDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_space(&self, request: &ReadDataSourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let filter: SpaceFilter = common::decode(&request.config)?;

        let spaces = client
            .spaces()
            .list(
                &ListOptions::new()
                    .add("names", &filter.name)
                    .add("organization_guids", &filter.org),
            )
            .await
            .map_err(|e| common::api_error("API Error Reading Space", &e))?;

        let space = spaces.first().ok_or_else(|| {
            Diagnostic::error(
                "Unable to find space data in list",
                format!(
                    "Given name {} not in the list of spaces of org {}.",
                    filter.name, filter.org
                ),
            )
        })?;

        let model = fetch_space(&client, space)
            .await
            .map_err(|e| common::api_error("API Error Reading Space", &e))?;
        common::encode(&model)
    }
}

#[async_trait]
impl DataSource for SpaceDataSource {
    fn type_name(&self) -> &str {
        "cloudfoundry_space"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let mut builder = SchemaBuilder::new()
            .version(0)
            .description("Gets information on a Cloud Foundry space within an organization.")
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the space to look up")
                    .required()
                    .validator(StringLengthValidator::min(1))
                    .build(),
            )
            .attribute(common::guid_filter("org", "The GUID of the organization the space belongs to"))
            .attribute(common::computed_string("id", "The GUID of the space"))
            .attribute(common::computed_bool("allow_ssh", "Whether SSH is enabled for apps in the space"))
            .attribute(common::computed_string(
                "isolation_segment",
                "The GUID of the isolation segment assigned to the space",
            ));
        for attribute in common::computed_common_attributes() {
            builder = builder.attribute(attribute);
        }

        DataSourceSchemaResponse {
            schema: builder.build(),
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        super::respond(self.read_space(&request).await)
    }
}

#[async_trait]
impl DataSourceWithConfigure for SpaceDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        super::configure(&mut self.provider_data, request)
    }
}

/// A space as listed, without its per-space settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceSummaryModel {
    pub id: String,
    pub name: String,
    pub org: Option<String>,
    pub labels: Option<StringMap>,
    pub annotations: Option<StringMap>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Space> for SpaceSummaryModel {
    fn from(space: &Space) -> Self {
        Self {
            id: space.guid.clone(),
            name: space.name.clone(),
            org: space.relationships.organization.guid().map(str::to_string),
            labels: common::labels_from(&space.metadata),
            annotations: common::annotations_from(&space.metadata),
            created_at: space.created_at.clone(),
            updated_at: space.updated_at.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpacesModel {
    pub org: String,
    pub name: Option<String>,
    pub spaces: Option<Vec<SpaceSummaryModel>>,
}

#[derive(Default)]
pub struct SpacesDataSource {
    provider_data: Option<CloudFoundryProviderData>,
}

impl SpacesDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_spaces(&self, request: &ReadDataSourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let mut model: SpacesModel = common::decode(&request.config)?;

        let spaces = client
            .spaces()
            .list(
                &ListOptions::new()
                    .add("organization_guids", &model.org)
                    .add_optional("names", model.name.as_ref()),
            )
            .await
            .map_err(|e| common::api_error("API Error Reading Spaces", &e))?;

        model.spaces = Some(spaces.iter().map(SpaceSummaryModel::from).collect());
        common::encode(&model)
    }
}

#[async_trait]
impl DataSource for SpacesDataSource {
    fn type_name(&self) -> &str {
        "cloudfoundry_spaces"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let mut attributes = vec![
            common::computed_string("id", "The GUID of the space"),
            common::computed_string("name", "The name of the space"),
            common::computed_string("org", "The GUID of the organization"),
        ];
        attributes.extend(common::computed_common_attributes());

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Gets information on the Cloud Foundry spaces of an organization.")
            .attribute(common::guid_filter("org", "The GUID of the organization"))
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the space to filter by")
                    .optional()
                    .build(),
            )
            .attribute(super::results_attribute("spaces", "The list of spaces", attributes))
            .build();

        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        super::respond(self.read_spaces(&request).await)
    }
}

#[async_trait]
impl DataSourceWithConfigure for SpacesDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        super::configure(&mut self.provider_data, request)
    }
}
