//! Multi-target applications deployed in a space

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

use crate::api::mtas::Mta;
use crate::common;
use crate::provider_data::require_client;
use crate::resources::{
    mta_metadata_attributes, mta_module_attributes, MtaMetadataModel, MtaModel, MtaModuleModel,
};
use crate::CloudFoundryProviderData;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MtaEntryModel {
    pub mta: Option<MtaMetadataModel>,
    pub modules: Option<Vec<MtaModuleModel>>,
    pub services: Option<Vec<String>>,
}

impl MtaEntryModel {
    fn new(space: &str, mta: &Mta) -> Self {
        let model = MtaModel::from_mta(space, mta);
        Self {
            mta: model.mta,
            modules: model.modules,
            services: model.services,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MtasModel {
    pub space: String,
    pub id: Option<String>,
    pub deploy_url: Option<String>,
    pub mtas: Option<Vec<MtaEntryModel>>,
}

#[derive(Default)]
pub struct MtasDataSource {
    provider_data: Option<CloudFoundryProviderData>,
}

impl MtasDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_mtas(&self, request: &ReadDataSourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let mut model: MtasModel = common::decode(&request.config)?;
        let api = client.mtas(model.deploy_url.as_deref());

        let mtas = match &model.id {
            Some(id) => match api.get(&model.space, id).await {
                Ok(mta) => vec![mta],
                Err(e) if e.is_not_found() => {
                    tracing::debug!("MTA {} is not deployed in space {}", id, model.space);
                    vec![]
                }
                Err(e) => return Err(common::api_error("API Error Reading MTA", &e)),
            },
            None => api
                .list(&model.space)
                .await
                .map_err(|e| common::api_error("API Error Reading MTAs", &e))?,
        };

        model.deploy_url = Some(api.base_url().to_string());
        model.mtas = Some(mtas.iter().map(|mta| MtaEntryModel::new(&model.space, mta)).collect());
        common::encode(&model)
    }
}

#[async_trait]
impl DataSource for MtasDataSource {
    fn type_name(&self) -> &str {
        "cloudfoundry_mtas"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Gets the multi-target applications deployed in a space.")
            .attribute(common::guid_filter("space", "The GUID of the space"))
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("The MTA id to look up")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("deploy_url", AttributeType::String)
                    .description("The URL of the MultiApps controller; derived from the API URL when unset")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(super::results_attribute(
                "mtas",
                "The list of deployed MTAs",
                vec![
                    AttributeBuilder::nested("mta", NestedType::single(mta_metadata_attributes()))
                        .description("Identity of the MTA")
                        .computed()
                        .build(),
                    AttributeBuilder::nested("modules", NestedType::list(mta_module_attributes()))
                        .description("The deployed modules")
                        .computed()
                        .build(),
                    common::computed_string_list("services", "Service instances created for the MTA"),
                ],
            ))
            .build();

        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        super::respond(self.read_mtas(&request).await)
    }
}

#[async_trait]
impl DataSourceWithConfigure for MtasDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        super::configure(&mut self.provider_data, request)
    }
}
