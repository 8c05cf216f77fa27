//! Stacks

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

use crate::api::stacks::Stack;
use crate::api::ListOptions;
use crate::common::{self, StringMap};
use crate::provider_data::require_client;
use crate::CloudFoundryProviderData;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackModel {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub build_rootfs_image: Option<String>,
    pub run_rootfs_image: Option<String>,
    pub default: bool,
    pub labels: Option<StringMap>,
    pub annotations: Option<StringMap>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Stack> for StackModel {
    fn from(stack: &Stack) -> Self {
        Self {
            id: stack.guid.clone(),
            name: stack.name.clone(),
            description: stack.description.clone(),
            build_rootfs_image: stack.build_rootfs_image.clone(),
            run_rootfs_image: stack.run_rootfs_image.clone(),
            default: stack.default,
            labels: common::labels_from(&stack.metadata),
            annotations: common::annotations_from(&stack.metadata),
            created_at: stack.created_at.clone(),
            updated_at: stack.updated_at.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StacksModel {
    pub name: Option<String>,
    pub stacks: Option<Vec<StackModel>>,
}

#[derive(Default)]
pub struct StacksDataSource {
    provider_data: Option<CloudFoundryProviderData>,
}

impl StacksDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_stacks(&self, request: &ReadDataSourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let mut model: StacksModel = common::decode(&request.config)?;

        let stacks = client
            .stacks()
            .list(&ListOptions::new().add_optional("names", model.name.as_ref()))
            .await
            .map_err(|e| common::api_error("API Error Reading Stacks", &e))?;

        model.stacks = Some(stacks.iter().map(StackModel::from).collect());
        common::encode(&model)
    }
}

#[async_trait]
impl DataSource for StacksDataSource {
    fn type_name(&self) -> &str {
        "cloudfoundry_stacks"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let mut attributes = vec![
            common::computed_string("id", "The GUID of the stack"),
            common::computed_string("name", "The name of the stack"),
            common::computed_string("description", "The description of the stack"),
            common::computed_string("build_rootfs_image", "The image used to stage apps"),
            common::computed_string("run_rootfs_image", "The image used to run apps"),
            common::computed_bool("default", "Whether the stack is the platform default"),
        ];
        attributes.extend(common::computed_common_attributes());

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Gets information on the stacks of the platform.")
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the stack to filter by")
                    .optional()
                    .build(),
            )
            .attribute(super::results_attribute("stacks", "The list of stacks", attributes))
            .build();

        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        super::respond(self.read_stacks(&request).await)
    }
}

#[async_trait]
impl DataSourceWithConfigure for StacksDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        super::configure(&mut self.provider_data, request)
    }
}
