//! Application resource
//!
//! An app is deployed in four steps: create the app, create a package
//! (docker image or uploaded zip), stage the package into a droplet and make
//! it the current droplet, then scale and start. Once the app exists, later
//! failures still return its state so Terraform can track (and taint) it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
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
    UpdateResourceResponse, ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tfplug::validator::{
    also_requires, conflicts_with, exactly_one_of, NumberRangeValidator, StringLengthValidator,
    StringOneOfValidator,
};

use crate::api::apps::{
    App, AppRelationships, CreateAppRequest, DockerCredentials, Lifecycle, Process,
    ScaleRequest, UpdateAppRequest,
};
use crate::api::{ApiError, Client, ToOneRelationship};
use crate::common::{self, StringMap};
use crate::provider_data::{extract_provider_data, require_client, ConfigureTarget};
use crate::CloudFoundryProviderData;

pub const STARTED: &str = "STARTED";
pub const STOPPED: &str = "STOPPED";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppModel {
    pub id: Option<String>,
    pub name: String,
    pub space: String,
    pub docker_image: Option<String>,
    pub docker_username: Option<String>,
    pub docker_password: Option<String>,
    pub path: Option<String>,
    pub source_code_hash: Option<String>,
    pub buildpacks: Option<Vec<String>>,
    pub stack: Option<String>,
    pub instances: Option<i64>,
    pub memory: Option<i64>,
    pub disk_quota: Option<i64>,
    pub state: Option<String>,
    pub environment: Option<StringMap>,
    pub labels: Option<StringMap>,
    pub annotations: Option<StringMap>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl From<&App> for AppModel {
    fn from(app: &App) -> Self {
        Self {
            id: Some(app.guid.clone()),
            name: app.name.clone(),
            space: app.relationships.space.guid().unwrap_or_default().to_string(),
            docker_image: None,
            docker_username: None,
            docker_password: None,
            path: None,
            source_code_hash: None,
            buildpacks: (!app.lifecycle.data.buildpacks.is_empty())
                .then(|| app.lifecycle.data.buildpacks.clone()),
            stack: app.lifecycle.data.stack.clone(),
            instances: None,
            memory: None,
            disk_quota: None,
            state: Some(app.state.clone()),
            environment: None,
            labels: common::labels_from(&app.metadata),
            annotations: common::annotations_from(&app.metadata),
            created_at: Some(app.created_at.clone()),
            updated_at: Some(app.updated_at.clone()),
        }
    }
}

impl AppModel {
    fn with_process(mut self, process: &Process) -> Self {
        self.instances = Some(process.instances);
        self.memory = Some(process.memory_in_mb);
        self.disk_quota = Some(process.disk_in_mb);
        self
    }

    /// Carry over the attributes the platform does not report back
    fn with_source(mut self, source: &AppSource) -> Self {
        self.docker_image = source.docker_image.clone();
        self.docker_username = source.docker_username.clone();
        self.docker_password = source.docker_password.clone();
        self.path = source.path.clone();
        self.source_code_hash = source.source_code_hash.clone();
        self
    }

    fn lifecycle(&self) -> Lifecycle {
        if self.docker_image.is_some() {
            Lifecycle::docker()
        } else {
            Lifecycle::buildpack(self.buildpacks.clone().unwrap_or_default(), self.stack.clone())
        }
    }

    fn scale_request(&self) -> ScaleRequest {
        ScaleRequest {
            instances: self.instances,
            memory_in_mb: self.memory,
            disk_in_mb: self.disk_quota,
        }
    }

    fn wants_started(&self) -> bool {
        self.state.as_deref() != Some(STOPPED)
    }
}

/// Where the app's code comes from. Only known from configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
struct AppSource {
    docker_image: Option<String>,
    docker_username: Option<String>,
    docker_password: Option<String>,
    path: Option<String>,
    source_code_hash: Option<String>,
}

impl From<&AppModel> for AppSource {
    fn from(model: &AppModel) -> Self {
        Self {
            docker_image: model.docker_image.clone(),
            docker_username: model.docker_username.clone(),
            docker_password: model.docker_password.clone(),
            path: model.path.clone(),
            source_code_hash: model.source_code_hash.clone(),
        }
    }
}

fn env_patch(planned: &Option<StringMap>, prior: &Option<StringMap>) -> HashMap<String, Option<String>> {
    let mut patch: HashMap<String, Option<String>> = planned
        .iter()
        .flatten()
        .map(|(k, v)| (k.clone(), Some(v.clone())))
        .collect();
    for key in prior.iter().flatten().map(|(k, _)| k) {
        patch.entry(key.clone()).or_insert(None);
    }
    patch
}

async fn fetch_app(client: &Client, guid: &str, source: &AppSource) -> Result<AppModel, ApiError> {
    let apps = client.apps();
    let app = apps.get(guid).await?;
    let process = apps.web_process(guid).await?;
    let environment = apps.environment_variables(guid).await?;

    let mut model = AppModel::from(&app).with_process(&process).with_source(source);
    model.environment = (!environment.is_empty()).then_some(environment);
    Ok(model)
}

/// Package the app's code, stage it and make the droplet current
async fn deploy_source(client: &Client, guid: &str, source: &AppSource) -> Result<(), ApiError> {
    let apps = client.apps();

    let package = match (&source.docker_image, &source.path) {
        (Some(image), _) => {
            let credentials = match (&source.docker_username, &source.docker_password) {
                (Some(username), Some(password)) => Some(DockerCredentials {
                    username: username.clone(),
                    password: password.clone(),
                }),
                _ => None,
            };
            apps.create_docker_package(guid, image, credentials.as_ref())
                .await?
        }
        (None, Some(path)) => {
            let package = apps.create_bits_package(guid).await?;
            apps.upload_bits(&package.guid, Path::new(path)).await?
        }
        (None, None) => {
            return Err(ApiError::InvalidInput(
                "either docker_image or path must be set".to_string(),
            ))
        }
    };
    tracing::debug!("Created {} package {} for app {}", package.package_type, package.guid, guid);

    let build = apps.stage(&package.guid).await?;
    let droplet = build.droplet.ok_or_else(|| ApiError::OperationFailed {
        operation: format!("build {}", build.guid),
        state: "STAGED without droplet".to_string(),
    })?;
    apps.set_current_droplet(guid, &droplet.guid).await
}

#[derive(Default)]
pub struct AppResource {
    provider_data: Option<CloudFoundryProviderData>,
}

impl AppResource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything after the app object exists
    async fn provision(client: &Client, guid: &str, plan: &AppModel) -> Result<(), ApiError> {
        deploy_source(client, guid, &AppSource::from(plan)).await?;

        let scale = plan.scale_request();
        if scale.instances.is_some() || scale.memory_in_mb.is_some() || scale.disk_in_mb.is_some() {
            client.apps().scale(guid, &scale).await?;
        }

        if plan.wants_started() {
            client.apps().start(guid).await?;
        }
        Ok(())
    }

    async fn create_app(
        &self,
        request: &CreateResourceRequest,
    ) -> Result<(DynamicValue, Vec<Diagnostic>), Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let plan: AppModel = common::decode(&request.planned_state)?;

        let app = client
            .apps()
            .create(&CreateAppRequest {
                name: plan.name.clone(),
                relationships: AppRelationships {
                    space: ToOneRelationship::new(plan.space.clone()),
                },
                lifecycle: plan.lifecycle(),
                environment_variables: plan.environment.clone().unwrap_or_default(),
                metadata: common::metadata_request(&plan.labels, &plan.annotations),
            })
            .await
            .map_err(|e| common::api_error("API Error Creating App", &e))?;
        tracing::debug!("Created app {} ({})", app.name, app.guid);

        let mut diagnostics = vec![];
        if let Err(e) = Self::provision(&client, &app.guid, &plan).await {
            diagnostics.push(common::api_error("API Error Deploying App", &e));
        }

        let model = match fetch_app(&client, &app.guid, &AppSource::from(&plan)).await {
            Ok(model) => model,
            Err(e) => {
                diagnostics.push(common::api_error("API Error Reading App", &e));
                AppModel::from(&app).with_source(&AppSource::from(&plan))
            }
        };
        Ok((common::encode(&model)?, diagnostics))
    }

    async fn read_app(&self, request: &ReadResourceRequest) -> Result<Option<DynamicValue>, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let id = common::state_id(&request.current_state)?;
        let source: AppSource = common::decode(&request.current_state)?;

        match fetch_app(&client, &id, &source).await {
            Ok(model) => common::encode(&model).map(Some),
            Err(e) if e.is_not_found() => {
                tracing::warn!("App {} no longer exists, removing from state", id);
                Ok(None)
            }
            Err(e) => Err(common::api_error("API Error Reading App", &e)),
        }
    }

    async fn update_app(&self, request: &UpdateResourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let plan: AppModel = common::decode(&request.planned_state)?;
        let prior: AppModel = common::decode(&request.prior_state)?;
        let id = common::state_id(&request.prior_state)?;
        let apps = client.apps();

        apps.update(
            &id,
            &UpdateAppRequest {
                name: Some(plan.name.clone()),
                lifecycle: Some(plan.lifecycle()),
                metadata: common::metadata_patch(
                    &plan.labels,
                    &plan.annotations,
                    &prior.labels,
                    &prior.annotations,
                ),
            },
        )
        .await
        .map_err(|e| common::api_error("API Error Updating App", &e))?;

        if plan.environment != prior.environment {
            apps.update_environment_variables(&id, env_patch(&plan.environment, &prior.environment))
                .await
                .map_err(|e| common::api_error("API Error Updating App Environment", &e))?;
        }

        let source = AppSource::from(&plan);
        let redeployed = source != AppSource::from(&prior);
        if redeployed {
            deploy_source(&client, &id, &source)
                .await
                .map_err(|e| common::api_error("API Error Deploying App", &e))?;
        }

        let scale = ScaleRequest {
            instances: plan.instances.filter(|v| Some(*v) != prior.instances),
            memory_in_mb: plan.memory.filter(|v| Some(*v) != prior.memory),
            disk_in_mb: plan.disk_quota.filter(|v| Some(*v) != prior.disk_quota),
        };
        if scale.instances.is_some() || scale.memory_in_mb.is_some() || scale.disk_in_mb.is_some() {
            apps.scale(&id, &scale)
                .await
                .map_err(|e| common::api_error("API Error Scaling App", &e))?;
        }

        // A new droplet or new environment only takes effect after a restart
        let needs_restart = redeployed || plan.environment != prior.environment;
        let state_result = if !plan.wants_started() {
            apps.stop(&id).await.map(|_| ())
        } else if needs_restart || prior.state.as_deref() != Some(STARTED) {
            match apps.stop(&id).await {
                Ok(_) => apps.start(&id).await.map(|_| ()),
                Err(e) => Err(e),
            }
        } else {
            Ok(())
        };
        state_result.map_err(|e| common::api_error("API Error Changing App State", &e))?;

        let model = fetch_app(&client, &id, &source)
            .await
            .map_err(|e| common::api_error("API Error Reading App", &e))?;
        common::encode(&model)
    }

    async fn delete_app(&self, request: &DeleteResourceRequest) -> Result<(), Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let id = common::state_id(&request.prior_state)?;

        match client.apps().delete(&id).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(common::api_error("API Error Deleting App", &e)),
        }
    }
}

#[async_trait]
impl Resource for AppResource {
    fn type_name(&self) -> &str {
        "cloudfoundry_app"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Provides a Cloud Foundry resource for managing Cloud Foundry applications. Apps are deployed from a docker image or from a zip archive staged with buildpacks.")
            .attribute(common::id_attribute("The GUID of the application"))
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the application")
                    .required()
                    .validator(StringLengthValidator::min(1))
                    .build(),
            )
            .attribute(common::guid_reference(
                "space",
                "The GUID of the space in which the application is deployed",
            ))
            .attribute(
                AttributeBuilder::new("docker_image", AttributeType::String)
                    .description("The URL to the docker image with tag e.g registry.example.com:5000/user/repository/tag or docker image name from the public repo e.g. redis:4.0")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("docker_username", AttributeType::String)
                    .description("The user name for a private docker registry")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("docker_password", AttributeType::String)
                    .description("The password for a private docker registry")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("path", AttributeType::String)
                    .description("Path to a zip archive of the application bits to push")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("source_code_hash", AttributeType::String)
                    .description("Used to trigger updates. Set to a hash of the zip archive given in path")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("buildpacks", AttributeType::List(Box::new(AttributeType::String)))
                    .description("Multiple buildpacks used to stage the application")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("stack", AttributeType::String)
                    .description("The base operating system and file system your application will run on")
                    .optional()
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("instances", AttributeType::Number)
                    .description("The number of app instances that you want to start")
                    .optional()
                    .computed()
                    .validator(NumberRangeValidator::at_least(0.0))
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("memory", AttributeType::Number)
                    .description("The memory limit for each application instance in megabytes")
                    .optional()
                    .computed()
                    .validator(NumberRangeValidator::at_least(1.0))
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("disk_quota", AttributeType::Number)
                    .description("The disk space to be allocated for each application instance in megabytes")
                    .optional()
                    .computed()
                    .validator(NumberRangeValidator::at_least(1.0))
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("state", AttributeType::String)
                    .description("The desired state of the application, STARTED or STOPPED")
                    .optional()
                    .computed()
                    .validator(StringOneOfValidator::create(&[STARTED, STOPPED]))
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("environment", AttributeType::Map(Box::new(AttributeType::String)))
                    .description("Key/value pairs of custom environment variables to set in your app")
                    .optional()
                    .sensitive()
                    .build(),
            )
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

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        let config = &request.config;
        let diagnostics = [
            exactly_one_of(config, &["docker_image", "path"]),
            conflicts_with(config, "docker_image", &["buildpacks", "source_code_hash"]),
            also_requires(config, "docker_username", &["docker_image", "docker_password"]),
        ]
        .into_iter()
        .flatten()
        .collect();

        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        match self.create_app(&request).await {
            Ok((new_state, diagnostics)) => CreateResourceResponse {
                new_state,
                private: vec![],
                diagnostics,
            },
            Err(diag) => CreateResourceResponse {
                new_state: DynamicValue::null(),
                private: vec![],
                diagnostics: vec![diag],
            },
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        match self.read_app(&request).await {
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
        match self.update_app(&request).await {
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
            diagnostics: self.delete_app(&request).await.err().into_iter().collect(),
        }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for AppResource {
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
impl ResourceWithImportState for AppResource {
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
