//! Multi-target application (MTA) deployed through the MultiApps controller
//!
//! Deployment uploads the archive and its extension descriptors to the
//! space, then runs a DEPLOY operation. The MTA id comes from the archive.
//! Changing the archive or descriptors redeploys in place.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tfplug::context::Context;
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ImportedResource,
    ReadResourceRequest, ReadResourceResponse, Resource, ResourceSchemaRequest,
    ResourceSchemaResponse, ResourceWithConfigure, ResourceWithImportState,
    UpdateResourceRequest, UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, NestedType, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};
use uuid::Uuid;

use crate::api::mtas::{Mta, MtaModule, MtasApi};
use crate::api::Client;
use crate::common;
use crate::provider_data::{extract_provider_data, require_client, ConfigureTarget};
use crate::CloudFoundryProviderData;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MtaModuleModel {
    pub module_name: String,
    pub app_name: String,
    pub created_on: Option<String>,
    pub updated_on: Option<String>,
    pub provided_dependency_names: Vec<String>,
    pub services: Vec<String>,
    pub uris: Vec<String>,
}

impl From<&MtaModule> for MtaModuleModel {
    fn from(module: &MtaModule) -> Self {
        Self {
            module_name: module.module_name.clone(),
            app_name: module.app_name.clone(),
            created_on: module.created_on.clone(),
            updated_on: module.updated_on.clone(),
            provided_dependency_names: module.provided_dendency_names.clone(),
            services: module.services.clone(),
            uris: module.uris.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MtaMetadataModel {
    pub id: String,
    pub version: Option<String>,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MtaModel {
    pub id: Option<String>,
    pub space: String,
    pub mtar_path: Option<String>,
    pub source_code_hash: Option<String>,
    pub extension_descriptors: Option<Vec<String>>,
    pub namespace: Option<String>,
    pub deploy_url: Option<String>,
    pub mta: Option<MtaMetadataModel>,
    pub modules: Option<Vec<MtaModuleModel>>,
    pub services: Option<Vec<String>>,
}

impl MtaModel {
    /// Server-side view of a deployed MTA; archive inputs stay unset
    pub fn from_mta(space: &str, mta: &Mta) -> Self {
        Self {
            id: Some(mta.metadata.id.clone()),
            space: space.to_string(),
            mtar_path: None,
            source_code_hash: None,
            extension_descriptors: None,
            namespace: mta.metadata.namespace.clone(),
            deploy_url: None,
            mta: Some(MtaMetadataModel {
                id: mta.metadata.id.clone(),
                version: mta.metadata.version.clone(),
                namespace: mta.metadata.namespace.clone(),
            }),
            modules: Some(mta.modules.iter().map(MtaModuleModel::from).collect()),
            services: Some(mta.services.clone()),
        }
    }

    fn with_inputs(mut self, inputs: ArchiveInputs, deploy_url: &str) -> Self {
        self.mtar_path = inputs.mtar_path;
        self.source_code_hash = inputs.source_code_hash;
        self.extension_descriptors = inputs.extension_descriptors;
        self.deploy_url = Some(deploy_url.to_string());
        self
    }

    fn inputs(&self) -> ArchiveInputs {
        ArchiveInputs {
            mtar_path: self.mtar_path.clone(),
            source_code_hash: self.source_code_hash.clone(),
            extension_descriptors: self.extension_descriptors.clone(),
        }
    }
}

/// Attributes only known from the configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
struct ArchiveInputs {
    mtar_path: Option<String>,
    source_code_hash: Option<String>,
    extension_descriptors: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct Location {
    space: Option<String>,
    namespace: Option<String>,
    deploy_url: Option<String>,
}

/// Split an import id of the form `space_guid/mta_id`
fn parse_import_id(id: &str) -> Result<(String, String), Diagnostic> {
    let invalid = || {
        Diagnostic::error(
            "Invalid import identifier",
            format!("Expected space_guid/mta_id, got {:?}", id),
        )
    };
    let (space, mta_id) = id.split_once('/').ok_or_else(invalid)?;
    if mta_id.is_empty() || Uuid::parse_str(space).is_err() {
        return Err(invalid());
    }
    Ok((space.to_string(), mta_id.to_string()))
}

/// Upload the archive and descriptors, deploy, and read back the MTA
async fn deploy(api: &MtasApi<'_>, plan: &MtaModel) -> Result<Mta, Diagnostic> {
    let namespace = plan.namespace.as_deref();
    let mtar_path = plan.mtar_path.as_deref().ok_or_else(|| {
        Diagnostic::error("Missing MTA archive", "mtar_path must be set to deploy an MTA")
    })?;

    let archive = api
        .upload_file(&plan.space, Path::new(mtar_path), namespace)
        .await
        .map_err(|e| common::api_error("API Error Uploading MTA Archive", &e))?;

    let mut descriptor_ids = Vec::new();
    for descriptor in plan.extension_descriptors.iter().flatten() {
        let file = api
            .upload_file(&plan.space, Path::new(descriptor), namespace)
            .await
            .map_err(|e| common::api_error("API Error Uploading MTA Extension Descriptor", &e))?;
        descriptor_ids.push(file.id);
    }

    let operation = api
        .deploy(&plan.space, &archive.id, &descriptor_ids, namespace)
        .await
        .map_err(|e| common::api_error("API Error Deploying MTA", &e))?;
    let mta_id = operation.mta_id.ok_or_else(|| {
        Diagnostic::error(
            "API Error Deploying MTA",
            format!("Operation {} did not report an MTA id", operation.process_id),
        )
    })?;
    tracing::debug!("Deployed MTA {} to space {}", mta_id, plan.space);

    api.get(&plan.space, &mta_id)
        .await
        .map_err(|e| common::api_error("API Error Reading MTA", &e))
}

fn mtas<'a>(client: &'a Client, deploy_url: &Option<String>) -> MtasApi<'a> {
    client.mtas(deploy_url.as_deref())
}

#[derive(Default)]
pub struct MtaResource {
    provider_data: Option<CloudFoundryProviderData>,
}

impl MtaResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn create_mta(&self, request: &CreateResourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let plan: MtaModel = common::decode(&request.planned_state)?;
        let api = mtas(&client, &plan.deploy_url);

        let mta = deploy(&api, &plan).await?;
        common::encode(&MtaModel::from_mta(&plan.space, &mta).with_inputs(plan.inputs(), api.base_url()))
    }

    async fn read_mta(&self, request: &ReadResourceRequest) -> Result<Option<DynamicValue>, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let id = common::state_id(&request.current_state)?;
        let location: Location = common::decode(&request.current_state)?;
        let inputs: ArchiveInputs = common::decode(&request.current_state)?;
        let space = location.space.ok_or_else(|| {
            Diagnostic::error("Missing MTA space", "The state does not contain a space")
        })?;
        let api = mtas(&client, &location.deploy_url);

        match api.get(&space, &id).await {
            Ok(mta) => {
                let mut model = MtaModel::from_mta(&space, &mta).with_inputs(inputs, api.base_url());
                model.namespace = model.namespace.or(location.namespace);
                common::encode(&model).map(Some)
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!("MTA {} no longer exists in space {}, removing from state", id, space);
                Ok(None)
            }
            Err(e) => Err(common::api_error("API Error Reading MTA", &e)),
        }
    }

    async fn update_mta(&self, request: &UpdateResourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let plan: MtaModel = common::decode(&request.planned_state)?;
        let prior: MtaModel = common::decode(&request.prior_state)?;
        let api = mtas(&client, &plan.deploy_url);

        let mta = if plan.inputs() != prior.inputs() {
            deploy(&api, &plan).await?
        } else {
            let id = common::state_id(&request.prior_state)?;
            api.get(&plan.space, &id)
                .await
                .map_err(|e| common::api_error("API Error Reading MTA", &e))?
        };

        common::encode(&MtaModel::from_mta(&plan.space, &mta).with_inputs(plan.inputs(), api.base_url()))
    }

    async fn delete_mta(&self, request: &DeleteResourceRequest) -> Result<(), Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let id = common::state_id(&request.prior_state)?;
        let prior: MtaModel = common::decode(&request.prior_state)?;
        let api = mtas(&client, &prior.deploy_url);

        match api.undeploy(&prior.space, &id, prior.namespace.as_deref()).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(common::api_error("API Error Undeploying MTA", &e)),
        }
    }
}

pub fn module_attributes() -> Vec<tfplug::schema::Attribute> {
    vec![
        common::computed_string("module_name", "Name of the module in the deployment descriptor"),
        common::computed_string("app_name", "Name of the application deployed for the module"),
        common::computed_string("created_on", "Time the module was first deployed"),
        common::computed_string("updated_on", "Time the module was last updated"),
        common::computed_string_list("provided_dependency_names", "Dependencies provided by the module"),
        common::computed_string_list("services", "Services the module is bound to"),
        common::computed_string_list("uris", "Routes of the module"),
    ]
}

pub fn metadata_attributes() -> Vec<tfplug::schema::Attribute> {
    vec![
        common::computed_string("id", "The MTA id from the deployment descriptor"),
        common::computed_string("version", "The MTA version"),
        common::computed_string("namespace", "The MTA namespace"),
    ]
}

#[async_trait]
impl Resource for MtaResource {
    fn type_name(&self) -> &str {
        "cloudfoundry_mta"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Deploys a multi-target application archive (mtar) to a space using the MultiApps controller")
            .attribute(common::id_attribute("The id of the deployed MTA"))
            .attribute(common::guid_reference("space", "The GUID of the space to deploy the MTA to"))
            .attribute(
                AttributeBuilder::new("mtar_path", AttributeType::String)
                    .description("Local path to the MTA archive")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("source_code_hash", AttributeType::String)
                    .description("Hash of the archive used to trigger a redeployment when the archive content changes")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "extension_descriptors",
                    AttributeType::List(Box::new(AttributeType::String)),
                )
                .description("Local paths to MTA extension descriptors applied to the deployment")
                .optional()
                .build(),
            )
            .attribute(
                AttributeBuilder::new("namespace", AttributeType::String)
                    .description("Namespace to deploy the MTA into")
                    .optional()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("deploy_url", AttributeType::String)
                    .description("URL of the MultiApps controller; derived from the API URL when unset")
                    .optional()
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::nested("mta", NestedType::single(metadata_attributes()))
                    .description("Metadata of the deployed MTA")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::nested("modules", NestedType::list(module_attributes()))
                    .description("Modules of the deployed MTA")
                    .computed()
                    .build(),
            )
            .attribute(common::computed_string_list("services", "Services of the deployed MTA"))
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        match self.create_mta(&request).await {
            Ok(new_state) => CreateResourceResponse {
                new_state,
                private: vec![],
                diagnostics: vec![],
            },
            Err(diag) => CreateResourceResponse {
                new_state: DynamicValue::null(),
                private: vec![],
                diagnostics: vec![diag],
            },
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        match self.read_mta(&request).await {
            Ok(new_state) => ReadResourceResponse {
                new_state,
                diagnostics: vec![],
                private: request.private,
            },
            Err(diag) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![diag],
                private: request.private,
            },
        }
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        match self.update_mta(&request).await {
            Ok(new_state) => UpdateResourceResponse {
                new_state,
                private: vec![],
                diagnostics: vec![],
            },
            Err(diag) => UpdateResourceResponse {
                new_state: request.prior_state,
                private: vec![],
                diagnostics: vec![diag],
            },
        }
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        DeleteResourceResponse {
            diagnostics: self.delete_mta(&request).await.err().into_iter().collect(),
        }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for MtaResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        match extract_provider_data(request.provider_data, ConfigureTarget::Resource) {
            Ok(data) => {
                self.provider_data = data;
                ConfigureResourceResponse {
                    diagnostics: vec![],
                }
            }
            Err(diag) => ConfigureResourceResponse {
                diagnostics: vec![diag],
            },
        }
    }
}

#[async_trait]
impl ResourceWithImportState for MtaResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse::default();
        match parse_import_id(&request.id) {
            Ok((space, mta_id)) => response.imported_resources.push(ImportedResource {
                type_name: request.type_name.clone(),
                state: DynamicValue::new(serde_json::json!({"id": mta_id, "space": space}).into()),
                private: Vec::new(),
            }),
            Err(diag) => response.diagnostics.push(diag),
        }
        response
    }
}
