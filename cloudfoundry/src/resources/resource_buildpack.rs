//! Buildpack resource

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tfplug::context::Context;
use tfplug::import::import_state_passthrough_id;
use tfplug::plan_modifier::UseStateForUnknown;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, UpdateResourceRequest,
    UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tfplug::validator::{NumberRangeValidator, StringLengthValidator};

use crate::api::buildpacks::{Buildpack, BuildpackRequest};
use crate::common::{self, StringMap};
use crate::provider_data::{extract_provider_data, require_client, ConfigureTarget};
use crate::CloudFoundryProviderData;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildpackModel {
    pub id: Option<String>,
    pub name: String,
    pub stack: Option<String>,
    pub position: Option<i64>,
    pub enabled: Option<bool>,
    pub locked: Option<bool>,
    pub path: Option<String>,
    pub source_code_hash: Option<String>,
    pub filename: Option<String>,
    pub state: Option<String>,
    pub labels: Option<StringMap>,
    pub annotations: Option<StringMap>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl From<&Buildpack> for BuildpackModel {
    fn from(buildpack: &Buildpack) -> Self {
        Self {
            id: Some(buildpack.guid.clone()),
            name: buildpack.name.clone(),
            stack: buildpack.stack.clone(),
            position: Some(buildpack.position),
            enabled: Some(buildpack.enabled),
            locked: Some(buildpack.locked),
            path: None,
            source_code_hash: None,
            filename: buildpack.filename.clone(),
            state: Some(buildpack.state.clone()),
            labels: common::labels_from(&buildpack.metadata),
            annotations: common::annotations_from(&buildpack.metadata),
            created_at: Some(buildpack.created_at.clone()),
            updated_at: Some(buildpack.updated_at.clone()),
        }
    }
}

/// Upload inputs, only known from configuration
#[derive(Debug, Default, Deserialize)]
struct UploadSource {
    path: Option<String>,
    source_code_hash: Option<String>,
}

impl BuildpackModel {
    fn with_source(mut self, source: UploadSource) -> Self {
        self.path = source.path;
        self.source_code_hash = source.source_code_hash;
        self
    }
}

#[derive(Default)]
pub struct BuildpackResource {
    provider_data: Option<CloudFoundryProviderData>,
}

impl BuildpackResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn create_buildpack(&self, request: &CreateResourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let plan: BuildpackModel = common::decode(&request.planned_state)?;

        let mut buildpack = client
            .buildpacks()
            .create(&BuildpackRequest {
                name: Some(plan.name.clone()),
                stack: plan.stack.clone(),
                position: plan.position,
                enabled: plan.enabled,
                locked: plan.locked,
                metadata: common::metadata_request(&plan.labels, &plan.annotations),
            })
            .await
            .map_err(|e| common::api_error("API Error Creating Buildpack", &e))?;
        tracing::debug!("Created buildpack {} ({})", buildpack.name, buildpack.guid);

        if let Some(path) = &plan.path {
            buildpack = client
                .buildpacks()
                .upload(&buildpack.guid, Path::new(path))
                .await
                .map_err(|e| common::api_error("API Error Uploading Buildpack", &e))?;
        }

        common::encode(&BuildpackModel::from(&buildpack).with_source(UploadSource {
            path: plan.path,
            source_code_hash: plan.source_code_hash,
        }))
    }

    async fn read_buildpack(&self, request: &ReadResourceRequest) -> Result<Option<DynamicValue>, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let id = common::state_id(&request.current_state)?;
        let source: UploadSource = common::decode(&request.current_state)?;

        match client.buildpacks().get(&id).await {
            Ok(buildpack) => common::encode(&BuildpackModel::from(&buildpack).with_source(source)).map(Some),
            Err(e) if e.is_not_found() => {
                tracing::warn!("Buildpack {} no longer exists, removing from state", id);
                Ok(None)
            }
            Err(e) => Err(common::api_error("API Error Reading Buildpack", &e)),
        }
    }

    async fn update_buildpack(&self, request: &UpdateResourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let plan: BuildpackModel = common::decode(&request.planned_state)?;
        let prior: BuildpackModel = common::decode(&request.prior_state)?;
        let id = common::state_id(&request.prior_state)?;

        let mut buildpack = client
            .buildpacks()
            .update(
                &id,
                &BuildpackRequest {
                    name: Some(plan.name.clone()),
                    stack: plan.stack.clone(),
                    position: plan.position,
                    enabled: plan.enabled,
                    locked: plan.locked,
                    metadata: common::metadata_patch(
                        &plan.labels,
                        &plan.annotations,
                        &prior.labels,
                        &prior.annotations,
                    ),
                },
            )
            .await
            .map_err(|e| common::api_error("API Error Updating Buildpack", &e))?;

        let source_changed =
            plan.path != prior.path || plan.source_code_hash != prior.source_code_hash;
        if let (Some(path), true) = (&plan.path, source_changed) {
            buildpack = client
                .buildpacks()
                .upload(&id, Path::new(path))
                .await
                .map_err(|e| common::api_error("API Error Uploading Buildpack", &e))?;
        }

        common::encode(&BuildpackModel::from(&buildpack).with_source(UploadSource {
            path: plan.path,
            source_code_hash: plan.source_code_hash,
        }))
    }

    async fn delete_buildpack(&self, request: &DeleteResourceRequest) -> Result<(), Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let id = common::state_id(&request.prior_state)?;

        match client.buildpacks().delete(&id).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(common::api_error("API Error Deleting Buildpack", &e)),
        }
    }
}

#[async_trait]
impl Resource for BuildpackResource {
    fn type_name(&self) -> &str {
        "cloudfoundry_buildpack"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Provides a Cloud Foundry resource for managing Cloud Foundry admin buildpacks")
            .attribute(common::id_attribute("The GUID of the buildpack"))
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Name of the buildpack")
                    .required()
                    .validator(StringLengthValidator::min(1))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("stack", AttributeType::String)
                    .description("The name of the stack that the buildpack will use")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("position", AttributeType::Number)
                    .description("The order in which the buildpacks are checked during buildpack auto-detection")
                    .optional()
                    .computed()
                    .validator(NumberRangeValidator::at_least(1.0))
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("enabled", AttributeType::Bool)
                    .description("Whether or not the buildpack can be used for staging")
                    .optional()
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("locked", AttributeType::Bool)
                    .description("Whether or not the buildpack is locked to prevent updating the bits")
                    .optional()
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("path", AttributeType::String)
                    .description("Path to the buildpack zip file to upload")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("source_code_hash", AttributeType::String)
                    .description("Used to trigger updates. Must be set to a base64-encoded SHA256 hash of the buildpack zip file")
                    .optional()
                    .build(),
            )
            .attribute(common::computed_string(
                "filename",
                "The filename of the buildpack",
            ))
            .attribute(common::computed_string(
                "state",
                "The state of the buildpack: AWAITING_UPLOAD or READY",
            ))
            .attribute(common::labels_attribute())
            .attribute(common::annotations_attribute())
            .attribute(common::created_at_attribute())
            .attribute(common::updated_at_attribute())
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        match self.create_buildpack(&request).await {
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
        match self.read_buildpack(&request).await {
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
        match self.update_buildpack(&request).await {
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
            diagnostics: self.delete_buildpack(&request).await.err().into_iter().collect(),
        }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for BuildpackResource {
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
impl ResourceWithImportState for BuildpackResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse::default();
        import_state_passthrough_id(&ctx, AttributePath::new("id"), &request, &mut response);
        response
    }
}
