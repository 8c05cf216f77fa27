//! Admin buildpacks

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

use crate::api::buildpacks::Buildpack;
use crate::api::ListOptions;
use crate::common::{self, StringMap};
use crate::provider_data::require_client;
use crate::CloudFoundryProviderData;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildpackEntryModel {
    pub id: String,
    pub name: String,
    pub stack: Option<String>,
    pub position: i64,
    pub enabled: bool,
    pub locked: bool,
    pub filename: Option<String>,
    pub state: String,
    pub labels: Option<StringMap>,
    pub annotations: Option<StringMap>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Buildpack> for BuildpackEntryModel {
    fn from(buildpack: &Buildpack) -> Self {
        Self {
            id: buildpack.guid.clone(),
            name: buildpack.name.clone(),
            stack: buildpack.stack.clone(),
            position: buildpack.position,
            enabled: buildpack.enabled,
            locked: buildpack.locked,
            filename: buildpack.filename.clone(),
            state: buildpack.state.clone(),
            labels: common::labels_from(&buildpack.metadata),
            annotations: common::annotations_from(&buildpack.metadata),
            created_at: buildpack.created_at.clone(),
            updated_at: buildpack.updated_at.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildpacksModel {
    pub name: Option<String>,
    pub stack: Option<String>,
    pub buildpacks: Option<Vec<BuildpackEntryModel>>,
}

#[derive(Default)]
pub struct BuildpacksDataSource {
    provider_data: Option<CloudFoundryProviderData>,
}

impl BuildpacksDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_buildpacks(&self, request: &ReadDataSourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let mut model: BuildpacksModel = common::decode(&request.config)?;

        let buildpacks = client
            .buildpacks()
            .list(
                &ListOptions::new()
                    .add_optional("names", model.name.as_ref())
                    .add_optional("stacks", model.stack.as_ref()),
            )
            .await
            .map_err(|e| common::api_error("API Error Reading Buildpacks", &e))?;

        if buildpacks.is_empty() {
            return Err(super::nothing_found(
                "Unable to find any buildpack in the list",
                &[("name", &model.name), ("stack", &model.stack)],
            ));
        }

        model.buildpacks = Some(buildpacks.iter().map(BuildpackEntryModel::from).collect());
        common::encode(&model)
    }
}

#[async_trait]
impl DataSource for BuildpacksDataSource {
    fn type_name(&self) -> &str {
        "cloudfoundry_buildpacks"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let mut attributes = vec![
            common::computed_string("id", "The GUID of the buildpack"),
            common::computed_string("name", "The name of the buildpack"),
            common::computed_string("stack", "The stack the buildpack is compatible with"),
            common::computed_number("position", "The order in which buildpacks are checked during detection"),
            common::computed_bool("enabled", "Whether the buildpack can be used for staging"),
            common::computed_bool("locked", "Whether the buildpack is locked against updates"),
            common::computed_string("filename", "The filename of the uploaded buildpack"),
            common::computed_string("state", "The state of the buildpack, AWAITING_UPLOAD or READY"),
        ];
        attributes.extend(common::computed_common_attributes());

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Gets information on the Cloud Foundry admin buildpacks.")
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the buildpack to filter by")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("stack", AttributeType::String)
                    .description("The name of the stack to filter by")
                    .optional()
                    .build(),
            )
            .attribute(super::results_attribute("buildpacks", "The list of buildpacks", attributes))
            .build();

        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        super::respond(self.read_buildpacks(&request).await)
    }
}

#[async_trait]
impl DataSourceWithConfigure for BuildpacksDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        super::configure(&mut self.provider_data, request)
    }
}
