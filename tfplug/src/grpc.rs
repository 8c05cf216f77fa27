//! gRPC service implementation
//!
//! Implements the Terraform Plugin Protocol v6 on top of the factory based
//! `Provider` trait. Every RPC that touches a resource or data source builds a
//! fresh instance from the provider's factory and configures it with the data
//! returned by the last ConfigureProvider call.

use crate::context::Context;
use crate::data_source::{
    ConfigureDataSourceRequest, DataSourceSchemaRequest, DataSourceWithConfigure,
    ReadDataSourceRequest, ValidateDataSourceConfigRequest,
};
use crate::error::TfplugError;
use crate::plan_modifier::values_equal;
use crate::proto;
use crate::proto::provider_server::Provider as ProtoProvider;
use crate::provider::{
    ConfigureProviderRequest, DataSourceFactory, Provider, ProviderMetadataRequest,
    ProviderSchemaRequest, ResourceFactory, StopProviderRequest, ValidateProviderConfigRequest,
};
use crate::resource::{
    ConfigureResourceRequest, CreateResourceRequest, DeleteResourceRequest,
    ImportResourceStateRequest, ReadResourceRequest, ResourceSchemaRequest, ResourceWithConfigure,
    UpdateResourceRequest, ValidateResourceConfigRequest,
};
use crate::schema::{
    Attribute, DefaultRequest, ObjectNestingMode, PlanModifierRequest, Schema, StringKind,
};
use crate::types::{
    has_errors, AttributePath, AttributePathStep, ClientCapabilities, Diagnostic,
    DiagnosticSeverity, Dynamic, DynamicValue, ServerCapabilities,
};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tonic::{Request, Response, Status};
use tracing::Instrument;

type ProviderData = Option<Arc<dyn Any + Send + Sync>>;

/// Terraform facing side of a provider
pub struct ProviderService<P: Provider> {
    provider: Arc<RwLock<P>>,
    provider_data: Arc<RwLock<ProviderData>>,
    resource_factories: Arc<HashMap<String, ResourceFactory>>,
    data_source_factories: Arc<HashMap<String, DataSourceFactory>>,
    resource_schemas: Arc<OnceCell<HashMap<String, Schema>>>,
    data_source_schemas: Arc<OnceCell<HashMap<String, Schema>>>,
}

impl<P: Provider + 'static> ProviderService<P> {
    pub fn new(provider: P) -> Self {
        let resource_factories = provider.resources();
        let data_source_factories = provider.data_sources();

        Self {
            provider: Arc::new(RwLock::new(provider)),
            provider_data: Arc::new(RwLock::new(None)),
            resource_factories: Arc::new(resource_factories),
            data_source_factories: Arc::new(data_source_factories),
            resource_schemas: Arc::new(OnceCell::new()),
            data_source_schemas: Arc::new(OnceCell::new()),
        }
    }

    async fn resource_schemas(&self) -> &HashMap<String, Schema> {
        self.resource_schemas
            .get_or_init(|| async {
                let mut schemas = HashMap::new();
                for (name, factory) in self.resource_factories.iter() {
                    let resource = factory();
                    let response = resource
                        .schema(Context::new(), ResourceSchemaRequest)
                        .await;
                    schemas.insert(name.clone(), response.schema);
                }
                schemas
            })
            .await
    }

    async fn data_source_schemas(&self) -> &HashMap<String, Schema> {
        self.data_source_schemas
            .get_or_init(|| async {
                let mut schemas = HashMap::new();
                for (name, factory) in self.data_source_factories.iter() {
                    let data_source = factory();
                    let response = data_source
                        .schema(Context::new(), DataSourceSchemaRequest)
                        .await;
                    schemas.insert(name.clone(), response.schema);
                }
                schemas
            })
            .await
    }

    async fn resource_schema(&self, type_name: &str) -> Result<&Schema, Vec<Diagnostic>> {
        self.resource_schemas()
            .await
            .get(type_name)
            .ok_or_else(|| vec![not_found_diagnostic(TfplugError::ResourceNotFound(type_name.to_string()))])
    }

    async fn data_source_schema(&self, type_name: &str) -> Result<&Schema, Vec<Diagnostic>> {
        self.data_source_schemas()
            .await
            .get(type_name)
            .ok_or_else(|| {
                vec![not_found_diagnostic(TfplugError::DataSourceNotFound(
                    type_name.to_string(),
                ))]
            })
    }

    /// Build and configure a resource for one RPC
    async fn configured_resource(
        &self,
        ctx: &Context,
        type_name: &str,
    ) -> Result<Box<dyn ResourceWithConfigure>, Vec<Diagnostic>> {
        let factory = self.resource_factories.get(type_name).ok_or_else(|| {
            vec![not_found_diagnostic(TfplugError::ResourceNotFound(
                type_name.to_string(),
            ))]
        })?;

        let mut resource = factory();
        let provider_data = self.provider_data.read().await.clone();
        let response = resource
            .configure(ctx.clone(), ConfigureResourceRequest { provider_data })
            .await;
        if has_errors(&response.diagnostics) {
            return Err(response.diagnostics);
        }
        Ok(resource)
    }

    async fn configured_data_source(
        &self,
        ctx: &Context,
        type_name: &str,
    ) -> Result<Box<dyn DataSourceWithConfigure>, Vec<Diagnostic>> {
        let factory = self.data_source_factories.get(type_name).ok_or_else(|| {
            vec![not_found_diagnostic(TfplugError::DataSourceNotFound(
                type_name.to_string(),
            ))]
        })?;

        let mut data_source = factory();
        let provider_data = self.provider_data.read().await.clone();
        let response = data_source
            .configure(ctx.clone(), ConfigureDataSourceRequest { provider_data })
            .await;
        if has_errors(&response.diagnostics) {
            return Err(response.diagnostics);
        }
        Ok(data_source)
    }
}

// RPC bodies, run inside the span of their Context
impl<P: Provider + 'static> ProviderService<P> {
    async fn handle_validate_resource_config(
        &self,
        ctx: Context,
        req: proto::validate_resource_config::Request,
    ) -> Result<Response<proto::validate_resource_config::Response>, Status> {
        let config = decode_dynamic_value(&req.config)?;
        let schema = match self.resource_schema(&req.type_name).await {
            Ok(schema) => schema,
            Err(diagnostics) => {
                return Ok(Response::new(proto::validate_resource_config::Response {
                    diagnostics: diagnostics_to_proto(diagnostics),
                }))
            }
        };

        let mut diagnostics = schema.validate_config(&config);
        if !has_errors(&diagnostics) {
            if let Some(factory) = self.resource_factories.get(&req.type_name) {
                let resource = factory();
                let response = resource
                    .validate(
                        ctx.clone(),
                        ValidateResourceConfigRequest {
                            type_name: req.type_name.clone(),
                            config,
                            client_capabilities: client_capabilities_from_proto(
                                req.client_capabilities.as_ref(),
                            ),
                        },
                    )
                    .await;
                diagnostics.extend(response.diagnostics);
            }
        }
        tracing::debug!(errors = has_errors(&diagnostics), "validated resource config");

        Ok(Response::new(proto::validate_resource_config::Response {
            diagnostics: diagnostics_to_proto(diagnostics),
        }))
    }

    async fn handle_validate_data_resource_config(
        &self,
        ctx: Context,
        req: proto::validate_data_resource_config::Request,
    ) -> Result<Response<proto::validate_data_resource_config::Response>, Status> {
        let config = decode_dynamic_value(&req.config)?;
        let schema = match self.data_source_schema(&req.type_name).await {
            Ok(schema) => schema,
            Err(diagnostics) => {
                return Ok(Response::new(proto::validate_data_resource_config::Response {
                    diagnostics: diagnostics_to_proto(diagnostics),
                }))
            }
        };

        let mut diagnostics = schema.validate_config(&config);
        if !has_errors(&diagnostics) {
            if let Some(factory) = self.data_source_factories.get(&req.type_name) {
                let data_source = factory();
                let response = data_source
                    .validate(
                        ctx.clone(),
                        ValidateDataSourceConfigRequest {
                            type_name: req.type_name.clone(),
                            config,
                        },
                    )
                    .await;
                diagnostics.extend(response.diagnostics);
            }
        }

        Ok(Response::new(proto::validate_data_resource_config::Response {
            diagnostics: diagnostics_to_proto(diagnostics),
        }))
    }

    async fn handle_configure_provider(
        &self,
        ctx: Context,
        req: proto::configure_provider::Request,
    ) -> Result<Response<proto::configure_provider::Response>, Status> {
        let config = decode_dynamic_value(&req.config)?;

        let mut provider = self.provider.write().await;
        let response = provider
            .configure(
                ctx,
                ConfigureProviderRequest {
                    terraform_version: req.terraform_version,
                    config,
                    client_capabilities: client_capabilities_from_proto(
                        req.client_capabilities.as_ref(),
                    ),
                },
            )
            .await;

        if !has_errors(&response.diagnostics) {
            *self.provider_data.write().await = response.provider_data;
            tracing::info!("provider configured");
        }

        Ok(Response::new(proto::configure_provider::Response {
            diagnostics: diagnostics_to_proto(response.diagnostics),
        }))
    }

    async fn handle_read_resource(
        &self,
        ctx: Context,
        req: proto::read_resource::Request,
    ) -> Result<Response<proto::read_resource::Response>, Status> {
        let current_state = decode_dynamic_value(&req.current_state)?;
        let error_response = |diagnostics: Vec<Diagnostic>| {
            Ok(Response::new(proto::read_resource::Response {
                new_state: req.current_state.clone(),
                diagnostics: diagnostics_to_proto(diagnostics),
                private: req.private.clone(),
                deferred: None,
            }))
        };

        let schema = match self.resource_schema(&req.type_name).await {
            Ok(schema) => schema,
            Err(diagnostics) => return error_response(diagnostics),
        };
        let resource = match self.configured_resource(&ctx, &req.type_name).await {
            Ok(resource) => resource,
            Err(diagnostics) => return error_response(diagnostics),
        };

        let response = resource
            .read(
                ctx,
                ReadResourceRequest {
                    type_name: req.type_name.clone(),
                    current_state,
                    private: req.private.clone(),
                    client_capabilities: client_capabilities_from_proto(
                        req.client_capabilities.as_ref(),
                    ),
                },
            )
            .await;

        let new_state = match response.new_state {
            Some(state) => schema.normalize(&state, true),
            None => {
                tracing::info!("resource no longer exists, removing from state");
                DynamicValue::null()
            }
        };

        Ok(Response::new(proto::read_resource::Response {
            new_state: Some(encode_dynamic_value(&new_state)?),
            diagnostics: diagnostics_to_proto(response.diagnostics),
            private: response.private,
            deferred: None,
        }))
    }

    async fn handle_plan_resource_change(
        &self,
        _ctx: Context,
        req: proto::plan_resource_change::Request,
    ) -> Result<Response<proto::plan_resource_change::Response>, Status> {
        let prior_state = decode_dynamic_value(&req.prior_state)?;
        let proposed_new_state = decode_dynamic_value(&req.proposed_new_state)?;
        let config = decode_dynamic_value(&req.config)?;

        let schema = match self.resource_schema(&req.type_name).await {
            Ok(schema) => schema,
            Err(diagnostics) => {
                return Ok(Response::new(proto::plan_resource_change::Response {
                    planned_state: req.proposed_new_state.clone(),
                    requires_replace: vec![],
                    planned_private: vec![],
                    diagnostics: diagnostics_to_proto(diagnostics),
                    legacy_type_system: false,
                    deferred: None,
                }))
            }
        };

        // Destroy plans are passed through untouched
        if proposed_new_state.is_null() {
            return Ok(Response::new(proto::plan_resource_change::Response {
                planned_state: Some(encode_dynamic_value(&proposed_new_state)?),
                requires_replace: vec![],
                planned_private: req.prior_private,
                diagnostics: vec![],
                legacy_type_system: false,
                deferred: None,
            }));
        }

        let outcome = plan_change(schema, &prior_state, &proposed_new_state, &config);
        tracing::debug!(
            replace = outcome.requires_replace.len(),
            "planned resource change"
        );

        Ok(Response::new(proto::plan_resource_change::Response {
            planned_state: Some(encode_dynamic_value(&outcome.planned_state)?),
            requires_replace: outcome
                .requires_replace
                .iter()
                .map(attribute_path_to_proto)
                .collect(),
            planned_private: req.prior_private,
            diagnostics: diagnostics_to_proto(outcome.diagnostics),
            legacy_type_system: false,
            deferred: None,
        }))
    }

    async fn handle_apply_resource_change(
        &self,
        ctx: Context,
        req: proto::apply_resource_change::Request,
    ) -> Result<Response<proto::apply_resource_change::Response>, Status> {
        let prior_state = decode_dynamic_value(&req.prior_state)?;
        let planned_state = decode_dynamic_value(&req.planned_state)?;
        let config = decode_dynamic_value(&req.config)?;

        let error_response = |diagnostics: Vec<Diagnostic>| {
            Ok(Response::new(proto::apply_resource_change::Response {
                new_state: req.prior_state.clone(),
                private: vec![],
                diagnostics: diagnostics_to_proto(diagnostics),
                legacy_type_system: false,
            }))
        };

        let schema = match self.resource_schema(&req.type_name).await {
            Ok(schema) => schema,
            Err(diagnostics) => return error_response(diagnostics),
        };
        let resource = match self.configured_resource(&ctx, &req.type_name).await {
            Ok(resource) => resource,
            Err(diagnostics) => return error_response(diagnostics),
        };

        let (new_state, private, diagnostics) = if planned_state.is_null() {
            tracing::info!("deleting resource");
            let response = resource
                .delete(
                    ctx,
                    DeleteResourceRequest {
                        type_name: req.type_name.clone(),
                        prior_state: prior_state.clone(),
                        planned_private: req.planned_private,
                    },
                )
                .await;
            // A failed delete keeps the resource in state
            let new_state = if has_errors(&response.diagnostics) {
                prior_state
            } else {
                DynamicValue::null()
            };
            (new_state, vec![], response.diagnostics)
        } else if prior_state.is_null() {
            tracing::info!("creating resource");
            let response = resource
                .create(
                    ctx,
                    CreateResourceRequest {
                        type_name: req.type_name.clone(),
                        planned_state,
                        config,
                        planned_private: req.planned_private,
                    },
                )
                .await;
            (
                schema.normalize(&response.new_state, true),
                response.private,
                response.diagnostics,
            )
        } else {
            tracing::info!("updating resource");
            let response = resource
                .update(
                    ctx,
                    UpdateResourceRequest {
                        type_name: req.type_name.clone(),
                        prior_state,
                        planned_state,
                        config,
                        planned_private: req.planned_private,
                    },
                )
                .await;
            (
                schema.normalize(&response.new_state, true),
                response.private,
                response.diagnostics,
            )
        };

        Ok(Response::new(proto::apply_resource_change::Response {
            new_state: Some(encode_dynamic_value(&new_state)?),
            private,
            diagnostics: diagnostics_to_proto(diagnostics),
            legacy_type_system: false,
        }))
    }

    async fn handle_import_resource_state(
        &self,
        ctx: Context,
        req: proto::import_resource_state::Request,
    ) -> Result<Response<proto::import_resource_state::Response>, Status> {
        let error_response = |diagnostics: Vec<Diagnostic>| {
            Ok(Response::new(proto::import_resource_state::Response {
                imported_resources: vec![],
                diagnostics: diagnostics_to_proto(diagnostics),
                deferred: None,
            }))
        };

        let schema = match self.resource_schema(&req.type_name).await {
            Ok(schema) => schema,
            Err(diagnostics) => return error_response(diagnostics),
        };
        let resource = match self.configured_resource(&ctx, &req.type_name).await {
            Ok(resource) => resource,
            Err(diagnostics) => return error_response(diagnostics),
        };
        let importer = match resource.as_import_state() {
            Some(importer) => importer,
            None => {
                return error_response(vec![Diagnostic::error(
                    "Resource Import Not Implemented",
                    format!("{} does not support import", req.type_name),
                )])
            }
        };

        let response = importer
            .import_state(
                ctx,
                ImportResourceStateRequest {
                    type_name: req.type_name.clone(),
                    id: req.id.clone(),
                    client_capabilities: client_capabilities_from_proto(
                        req.client_capabilities.as_ref(),
                    ),
                },
            )
            .await;

        let mut imported_resources = Vec::with_capacity(response.imported_resources.len());
        for imported in response.imported_resources {
            let state = schema.normalize(&imported.state, true);
            imported_resources.push(proto::import_resource_state::ImportedResource {
                type_name: imported.type_name,
                state: Some(encode_dynamic_value(&state)?),
                private: imported.private,
            });
        }

        Ok(Response::new(proto::import_resource_state::Response {
            imported_resources,
            diagnostics: diagnostics_to_proto(response.diagnostics),
            deferred: None,
        }))
    }

    async fn handle_read_data_source(
        &self,
        ctx: Context,
        req: proto::read_data_source::Request,
    ) -> Result<Response<proto::read_data_source::Response>, Status> {
        let config = decode_dynamic_value(&req.config)?;
        let error_response = |diagnostics: Vec<Diagnostic>| {
            Ok(Response::new(proto::read_data_source::Response {
                state: None,
                diagnostics: diagnostics_to_proto(diagnostics),
                deferred: None,
            }))
        };

        let schema = match self.data_source_schema(&req.type_name).await {
            Ok(schema) => schema,
            Err(diagnostics) => return error_response(diagnostics),
        };
        let data_source = match self.configured_data_source(&ctx, &req.type_name).await {
            Ok(data_source) => data_source,
            Err(diagnostics) => return error_response(diagnostics),
        };

        let response = data_source
            .read(
                ctx,
                ReadDataSourceRequest {
                    type_name: req.type_name.clone(),
                    config,
                    client_capabilities: client_capabilities_from_proto(
                        req.client_capabilities.as_ref(),
                    ),
                },
            )
            .await;

        if has_errors(&response.diagnostics) {
            return error_response(response.diagnostics);
        }

        let state = schema.normalize(&response.state, true);
        Ok(Response::new(proto::read_data_source::Response {
            state: Some(encode_dynamic_value(&state)?),
            diagnostics: diagnostics_to_proto(response.diagnostics),
            deferred: None,
        }))
    }
}

#[tonic::async_trait]
impl<P: Provider + 'static> ProtoProvider for ProviderService<P> {
    async fn get_metadata(
        &self,
        _request: Request<proto::get_metadata::Request>,
    ) -> Result<Response<proto::get_metadata::Response>, Status> {
        let provider = self.provider.read().await;
        let metadata = provider
            .metadata(Context::new(), ProviderMetadataRequest)
            .await;

        Ok(Response::new(proto::get_metadata::Response {
            server_capabilities: Some(server_capabilities_to_proto(&metadata.server_capabilities)),
            diagnostics: vec![],
            data_sources: self
                .data_source_factories
                .keys()
                .map(|name| proto::get_metadata::DataSourceMetadata {
                    type_name: name.clone(),
                })
                .collect(),
            resources: self
                .resource_factories
                .keys()
                .map(|name| proto::get_metadata::ResourceMetadata {
                    type_name: name.clone(),
                })
                .collect(),
        }))
    }

    async fn get_provider_schema(
        &self,
        _request: Request<proto::get_provider_schema::Request>,
    ) -> Result<Response<proto::get_provider_schema::Response>, Status> {
        let (provider_schema, server_capabilities) = {
            let provider = self.provider.read().await;
            let schema = provider.schema(Context::new(), ProviderSchemaRequest).await;
            let metadata = provider
                .metadata(Context::new(), ProviderMetadataRequest)
                .await;
            (schema, metadata.server_capabilities)
        };

        let resource_schemas = self
            .resource_schemas()
            .await
            .iter()
            .map(|(name, schema)| (name.clone(), schema_to_proto(schema)))
            .collect();
        let data_source_schemas = self
            .data_source_schemas()
            .await
            .iter()
            .map(|(name, schema)| (name.clone(), schema_to_proto(schema)))
            .collect();

        Ok(Response::new(proto::get_provider_schema::Response {
            provider: Some(schema_to_proto(&provider_schema.schema)),
            resource_schemas,
            data_source_schemas,
            diagnostics: diagnostics_to_proto(provider_schema.diagnostics),
            provider_meta: None,
            server_capabilities: Some(server_capabilities_to_proto(&server_capabilities)),
        }))
    }

    async fn validate_provider_config(
        &self,
        request: Request<proto::validate_provider_config::Request>,
    ) -> Result<Response<proto::validate_provider_config::Response>, Status> {
        let req = request.into_inner();
        let config = decode_dynamic_value(&req.config)?;

        let provider = self.provider.read().await;
        let schema = provider.schema(Context::new(), ProviderSchemaRequest).await;
        let mut diagnostics = schema.schema.validate_config(&config);
        if !has_errors(&diagnostics) {
            let response = provider
                .validate(Context::new(), ValidateProviderConfigRequest { config })
                .await;
            diagnostics.extend(response.diagnostics);
        }

        Ok(Response::new(proto::validate_provider_config::Response {
            diagnostics: diagnostics_to_proto(diagnostics),
        }))
    }

    async fn validate_resource_config(
        &self,
        request: Request<proto::validate_resource_config::Request>,
    ) -> Result<Response<proto::validate_resource_config::Response>, Status> {
        let req = request.into_inner();
        let ctx = Context::for_rpc("ValidateResourceConfig", &req.type_name);
        let span = ctx.span().clone();
        self.handle_validate_resource_config(ctx, req).instrument(span).await
    }

    async fn validate_data_resource_config(
        &self,
        request: Request<proto::validate_data_resource_config::Request>,
    ) -> Result<Response<proto::validate_data_resource_config::Response>, Status> {
        let req = request.into_inner();
        let ctx = Context::for_rpc("ValidateDataResourceConfig", &req.type_name);
        let span = ctx.span().clone();
        self.handle_validate_data_resource_config(ctx, req).instrument(span).await
    }

    async fn upgrade_resource_state(
        &self,
        request: Request<proto::upgrade_resource_state::Request>,
    ) -> Result<Response<proto::upgrade_resource_state::Response>, Status> {
        let req = request.into_inner();

        let schema = match self.resource_schema(&req.type_name).await {
            Ok(schema) => schema,
            Err(diagnostics) => {
                return Ok(Response::new(proto::upgrade_resource_state::Response {
                    upgraded_state: None,
                    diagnostics: diagnostics_to_proto(diagnostics),
                }))
            }
        };

        let raw_json = req.raw_state.as_ref().map(|raw| raw.json.as_slice()).unwrap_or_default();
        if raw_json.is_empty() {
            let diagnostics = vec![Diagnostic::error(
                "Unable to upgrade resource state",
                "Stored state has no JSON representation. Flatmap state from Terraform 0.11 and earlier is not supported.",
            )];
            return Ok(Response::new(proto::upgrade_resource_state::Response {
                upgraded_state: None,
                diagnostics: diagnostics_to_proto(diagnostics),
            }));
        }

        if req.version > schema.version {
            let diagnostics = vec![Diagnostic::error(
                "Unable to upgrade resource state",
                format!(
                    "Stored state version {} is newer than the provider schema version {}",
                    req.version, schema.version
                ),
            )];
            return Ok(Response::new(proto::upgrade_resource_state::Response {
                upgraded_state: None,
                diagnostics: diagnostics_to_proto(diagnostics),
            }));
        }

        let state = DynamicValue::decode_json(raw_json).map_err(Status::from)?;
        let upgraded = schema.normalize(&state, true);

        Ok(Response::new(proto::upgrade_resource_state::Response {
            upgraded_state: Some(encode_dynamic_value(&upgraded)?),
            diagnostics: vec![],
        }))
    }

    async fn configure_provider(
        &self,
        request: Request<proto::configure_provider::Request>,
    ) -> Result<Response<proto::configure_provider::Response>, Status> {
        let req = request.into_inner();
        let ctx = Context::for_rpc("ConfigureProvider", "provider");
        let span = ctx.span().clone();
        self.handle_configure_provider(ctx, req).instrument(span).await
    }

    async fn read_resource(
        &self,
        request: Request<proto::read_resource::Request>,
    ) -> Result<Response<proto::read_resource::Response>, Status> {
        let req = request.into_inner();
        let ctx = Context::for_rpc("ReadResource", &req.type_name);
        let span = ctx.span().clone();
        self.handle_read_resource(ctx, req).instrument(span).await
    }

    async fn plan_resource_change(
        &self,
        request: Request<proto::plan_resource_change::Request>,
    ) -> Result<Response<proto::plan_resource_change::Response>, Status> {
        let req = request.into_inner();
        let ctx = Context::for_rpc("PlanResourceChange", &req.type_name);
        let span = ctx.span().clone();
        self.handle_plan_resource_change(ctx, req).instrument(span).await
    }

    async fn apply_resource_change(
        &self,
        request: Request<proto::apply_resource_change::Request>,
    ) -> Result<Response<proto::apply_resource_change::Response>, Status> {
        let req = request.into_inner();
        let ctx = Context::for_rpc("ApplyResourceChange", &req.type_name);
        let span = ctx.span().clone();
        self.handle_apply_resource_change(ctx, req).instrument(span).await
    }

    async fn import_resource_state(
        &self,
        request: Request<proto::import_resource_state::Request>,
    ) -> Result<Response<proto::import_resource_state::Response>, Status> {
        let req = request.into_inner();
        let ctx = Context::for_rpc("ImportResourceState", &req.type_name);
        let span = ctx.span().clone();
        self.handle_import_resource_state(ctx, req).instrument(span).await
    }

    async fn read_data_source(
        &self,
        request: Request<proto::read_data_source::Request>,
    ) -> Result<Response<proto::read_data_source::Response>, Status> {
        let req = request.into_inner();
        let ctx = Context::for_rpc("ReadDataSource", &req.type_name);
        let span = ctx.span().clone();
        self.handle_read_data_source(ctx, req).instrument(span).await
    }

    async fn stop_provider(
        &self,
        _request: Request<proto::stop_provider::Request>,
    ) -> Result<Response<proto::stop_provider::Response>, Status> {
        let provider = self.provider.read().await;
        let response = provider.stop(Context::new(), StopProviderRequest).await;

        Ok(Response::new(proto::stop_provider::Response {
            error: response.error.unwrap_or_default(),
        }))
    }
}

/// Result of the framework planning pass
pub(crate) struct PlanOutcome {
    pub planned_state: DynamicValue,
    pub requires_replace: Vec<AttributePath>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Framework planning for a create or update:
/// 1. apply defaults to attributes that are null in config
/// 2. mark computed attributes without config as unknown when the resource changes
/// 3. run attribute plan modifiers
pub(crate) fn plan_change(
    schema: &Schema,
    prior_state: &DynamicValue,
    proposed_new_state: &DynamicValue,
    config: &DynamicValue,
) -> PlanOutcome {
    let is_create = prior_state.is_null();
    let mut planned = schema.normalize(proposed_new_state, false);
    let mut diagnostics = Vec::new();
    let mut requires_replace = Vec::new();

    let config_value = |attr: &Attribute| {
        config
            .get(&AttributePath::new(&attr.name))
            .cloned()
            .unwrap_or(Dynamic::Null)
    };

    apply_defaults(
        &schema.block.attributes,
        &mut planned.value,
        &config.value,
        &AttributePath::root(),
    );

    let changed = is_create || !values_equal(&planned.value, &prior_state.value);
    if changed {
        for attr in &schema.block.attributes {
            if attr.computed && attr.default.is_none() && config_value(attr).is_null() {
                let _ = planned.mark_unknown(&AttributePath::new(&attr.name));
            }
        }
    }

    for attr in &schema.block.attributes {
        if attr.plan_modifiers.is_empty() {
            continue;
        }
        let path = AttributePath::new(&attr.name);
        let state_value = prior_state.get(&path).cloned().unwrap_or(Dynamic::Null);
        let mut plan_value = planned.get(&path).cloned().unwrap_or(Dynamic::Null);

        for modifier in &attr.plan_modifiers {
            let response = modifier.modify(PlanModifierRequest {
                config_value: DynamicValue::new(config_value(attr)),
                state_value: DynamicValue::new(state_value.clone()),
                plan_value: DynamicValue::new(plan_value),
                path: path.clone(),
                is_create,
            });
            plan_value = response.plan_value.value;
            diagnostics.extend(response.diagnostics);
            if response.requires_replace && !requires_replace.contains(&path) {
                requires_replace.push(path.clone());
            }
        }

        let _ = planned.set_value(&path, plan_value);
    }

    PlanOutcome {
        planned_state: planned,
        requires_replace,
        diagnostics,
    }
}

/// Fills defaults for attributes that are null in config, descending into
/// nested attributes. Elements of nested lists and sets are paired with the
/// config element at the same index, map elements by key.
fn apply_defaults(
    attributes: &[Attribute],
    planned: &mut Dynamic,
    config: &Dynamic,
    path: &AttributePath,
) {
    let Dynamic::Map(planned) = planned else {
        return;
    };
    for attr in attributes {
        let attr_path = path.clone().attribute(&attr.name);
        let config_value = match config {
            Dynamic::Map(m) => m.get(&attr.name).unwrap_or(&Dynamic::Null),
            _ => &Dynamic::Null,
        };

        if let Some(default) = &attr.default {
            if config_value.is_null() {
                let response = default.default_value(DefaultRequest { path: attr_path });
                planned.insert(attr.name.clone(), response.value.value);
            }
            continue;
        }

        let (Some(nested), Some(value)) = (&attr.nested_type, planned.get_mut(&attr.name)) else {
            continue;
        };
        match (&nested.nesting, value) {
            (ObjectNestingMode::Single, value) => {
                apply_defaults(&nested.attributes, value, config_value, &attr_path)
            }
            (ObjectNestingMode::List | ObjectNestingMode::Set, Dynamic::List(items)) => {
                for (i, item) in items.iter_mut().enumerate() {
                    let item_config = match config_value {
                        Dynamic::List(c) => c.get(i).unwrap_or(&Dynamic::Null),
                        _ => &Dynamic::Null,
                    };
                    apply_defaults(
                        &nested.attributes,
                        item,
                        item_config,
                        &attr_path.clone().index(i as i64),
                    );
                }
            }
            (ObjectNestingMode::Map, Dynamic::Map(entries)) => {
                for (key, item) in entries.iter_mut() {
                    let item_config = match config_value {
                        Dynamic::Map(c) => c.get(key).unwrap_or(&Dynamic::Null),
                        _ => &Dynamic::Null,
                    };
                    apply_defaults(&nested.attributes, item, item_config, &attr_path.clone().key(key));
                }
            }
            _ => {}
        }
    }
}

fn not_found_diagnostic(err: TfplugError) -> Diagnostic {
    Diagnostic::error(err.to_string(), "The provider does not implement this type.")
}

fn decode_dynamic_value(value: &Option<proto::DynamicValue>) -> Result<DynamicValue, Status> {
    match value {
        None => Ok(DynamicValue::null()),
        Some(v) if !v.msgpack.is_empty() => {
            DynamicValue::decode_msgpack(&v.msgpack).map_err(Status::from)
        }
        Some(v) => DynamicValue::decode_json(&v.json).map_err(Status::from),
    }
}

fn encode_dynamic_value(value: &DynamicValue) -> Result<proto::DynamicValue, Status> {
    Ok(proto::DynamicValue {
        msgpack: value.encode_msgpack().map_err(Status::from)?,
        json: vec![],
    })
}

fn client_capabilities_from_proto(caps: Option<&proto::ClientCapabilities>) -> ClientCapabilities {
    caps.map(|c| ClientCapabilities {
        deferral_allowed: c.deferral_allowed,
        write_only_attributes_allowed: c.write_only_attributes_allowed,
    })
    .unwrap_or_default()
}

fn server_capabilities_to_proto(caps: &ServerCapabilities) -> proto::ServerCapabilities {
    proto::ServerCapabilities {
        plan_destroy: caps.plan_destroy,
        get_provider_schema_optional: caps.get_provider_schema_optional,
        move_resource_state: caps.move_resource_state,
    }
}

fn attribute_path_to_proto(path: &AttributePath) -> proto::AttributePath {
    use proto::attribute_path::step::Selector;

    proto::AttributePath {
        steps: path
            .steps
            .iter()
            .map(|step| proto::attribute_path::Step {
                selector: Some(match step {
                    AttributePathStep::AttributeName(name) => Selector::AttributeName(name.clone()),
                    AttributePathStep::ElementKeyString(key) => {
                        Selector::ElementKeyString(key.clone())
                    }
                    AttributePathStep::ElementKeyInt(idx) => Selector::ElementKeyInt(*idx),
                }),
            })
            .collect(),
    }
}

fn diagnostics_to_proto(diagnostics: Vec<Diagnostic>) -> Vec<proto::Diagnostic> {
    diagnostics
        .into_iter()
        .map(|d| proto::Diagnostic {
            severity: match d.severity {
                DiagnosticSeverity::Invalid => proto::diagnostic::Severity::Invalid,
                DiagnosticSeverity::Error => proto::diagnostic::Severity::Error,
                DiagnosticSeverity::Warning => proto::diagnostic::Severity::Warning,
            } as i32,
            summary: d.summary,
            detail: d.detail,
            attribute: d.attribute.as_ref().map(attribute_path_to_proto),
        })
        .collect()
}

fn string_kind_to_proto(kind: StringKind) -> i32 {
    match kind {
        StringKind::Plain => proto::StringKind::Plain as i32,
        StringKind::Markdown => proto::StringKind::Markdown as i32,
    }
}

fn attribute_to_proto(attr: &Attribute) -> proto::schema::Attribute {
    use proto::schema::object::NestingMode;

    let nested_type = attr.nested_type.as_ref().map(|nested| proto::schema::Object {
        attributes: nested.attributes.iter().map(attribute_to_proto).collect(),
        nesting: match nested.nesting {
            ObjectNestingMode::Single => NestingMode::Single,
            ObjectNestingMode::List => NestingMode::List,
            ObjectNestingMode::Set => NestingMode::Set,
            ObjectNestingMode::Map => NestingMode::Map,
        } as i32,
    });

    proto::schema::Attribute {
        name: attr.name.clone(),
        // Nested attributes carry their type in nested_type only
        r#type: if nested_type.is_some() {
            vec![]
        } else {
            attr.r#type.to_bytes()
        },
        nested_type,
        description: attr.description.clone(),
        required: attr.required,
        optional: attr.optional,
        computed: attr.computed,
        sensitive: attr.sensitive,
        description_kind: proto::StringKind::Markdown as i32,
        deprecated: attr.deprecated,
        write_only: false,
    }
}

fn schema_to_proto(schema: &Schema) -> proto::Schema {
    proto::Schema {
        version: schema.version,
        block: Some(proto::schema::Block {
            version: schema.block.version,
            attributes: schema.block.attributes.iter().map(attribute_to_proto).collect(),
            block_types: vec![],
            description: schema.block.description.clone(),
            description_kind: string_kind_to_proto(schema.block.description_kind),
            deprecated: schema.block.deprecated,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::{
        ConfigureDataSourceResponse, DataSource, DataSourceSchemaResponse, ReadDataSourceResponse,
    };
    use crate::defaults::StaticDefault;
    use crate::import::import_state_passthrough_id;
    use crate::plan_modifier::{RequiresReplace, UseStateForUnknown};
    use crate::provider::{ConfigureProviderResponse, ProviderSchemaResponse};
    use crate::resource::{
        ConfigureResourceResponse, CreateResourceResponse, DeleteResourceResponse,
        ImportResourceStateResponse, ReadResourceResponse, Resource, ResourceSchemaResponse,
        ResourceWithImportState, UpdateResourceResponse,
    };
    use crate::schema::{AttributeBuilder, AttributeType, NestedType, SchemaBuilder};
    use async_trait::async_trait;

    struct TestProvider;

    #[async_trait]
    impl Provider for TestProvider {
        fn type_name(&self) -> &str {
            "test"
        }

        async fn schema(
            &self,
            _ctx: Context,
            _request: ProviderSchemaRequest,
        ) -> ProviderSchemaResponse {
            ProviderSchemaResponse {
                schema: SchemaBuilder::new()
                    .attribute(
                        AttributeBuilder::new("endpoint", AttributeType::String)
                            .optional()
                            .build(),
                    )
                    .build(),
                diagnostics: vec![],
            }
        }

        async fn configure(
            &mut self,
            _ctx: Context,
            _request: ConfigureProviderRequest,
        ) -> ConfigureProviderResponse {
            ConfigureProviderResponse {
                diagnostics: vec![],
                provider_data: Some(Arc::new("configured".to_string())),
            }
        }

        fn resources(&self) -> HashMap<String, ResourceFactory> {
            let mut factories: HashMap<String, ResourceFactory> = HashMap::new();
            factories.insert(
                "test_thing".to_string(),
                Box::new(|| Box::new(ThingResource::default()) as Box<dyn ResourceWithConfigure>),
            );
            factories
        }

        fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
            let mut factories: HashMap<String, DataSourceFactory> = HashMap::new();
            factories.insert(
                "test_thing".to_string(),
                Box::new(|| {
                    Box::new(ThingDataSource::default()) as Box<dyn DataSourceWithConfigure>
                }),
            );
            factories
        }
    }

    #[derive(Default)]
    struct ThingResource {
        configured: bool,
    }

    fn thing_schema() -> Schema {
        SchemaBuilder::new()
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("org", AttributeType::String)
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("enabled", AttributeType::Bool)
                    .default(StaticDefault::bool(true))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("updated_at", AttributeType::String)
                    .computed()
                    .build(),
            )
            .build()
    }

    #[async_trait]
    impl Resource for ThingResource {
        fn type_name(&self) -> &str {
            "test_thing"
        }

        async fn schema(
            &self,
            _ctx: Context,
            _request: ResourceSchemaRequest,
        ) -> ResourceSchemaResponse {
            ResourceSchemaResponse {
                schema: thing_schema(),
                diagnostics: vec![],
            }
        }

        async fn create(
            &self,
            _ctx: Context,
            request: CreateResourceRequest,
        ) -> CreateResourceResponse {
            if !self.configured {
                return CreateResourceResponse {
                    new_state: DynamicValue::null(),
                    private: vec![],
                    diagnostics: vec![Diagnostic::error("Provider not configured", "")],
                };
            }
            let mut state = request.planned_state;
            state
                .set_string(&AttributePath::new("id"), "guid-1".to_string())
                .unwrap();
            CreateResourceResponse {
                new_state: state,
                private: vec![],
                diagnostics: vec![],
            }
        }

        async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
            let id = request
                .current_state
                .get_string(&AttributePath::new("id"))
                .unwrap_or_default();
            ReadResourceResponse {
                new_state: if id == "gone" {
                    None
                } else {
                    Some(request.current_state)
                },
                diagnostics: vec![],
                private: request.private,
            }
        }

        async fn update(
            &self,
            _ctx: Context,
            request: UpdateResourceRequest,
        ) -> UpdateResourceResponse {
            UpdateResourceResponse {
                new_state: request.planned_state,
                private: vec![],
                diagnostics: vec![],
            }
        }

        async fn delete(
            &self,
            _ctx: Context,
            _request: DeleteResourceRequest,
        ) -> DeleteResourceResponse {
            DeleteResourceResponse {
                diagnostics: vec![],
            }
        }

        fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
            Some(self)
        }
    }

    #[async_trait]
    impl ResourceWithConfigure for ThingResource {
        async fn configure(
            &mut self,
            _ctx: Context,
            request: ConfigureResourceRequest,
        ) -> ConfigureResourceResponse {
            self.configured = request.provider_data.is_some();
            ConfigureResourceResponse {
                diagnostics: vec![],
            }
        }
    }

    #[async_trait]
    impl ResourceWithImportState for ThingResource {
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

    #[derive(Default)]
    struct ThingDataSource;

    #[async_trait]
    impl DataSource for ThingDataSource {
        fn type_name(&self) -> &str {
            "test_thing"
        }

        async fn schema(
            &self,
            _ctx: Context,
            _request: DataSourceSchemaRequest,
        ) -> DataSourceSchemaResponse {
            DataSourceSchemaResponse {
                schema: SchemaBuilder::new()
                    .attribute(
                        AttributeBuilder::new("name", AttributeType::String)
                            .required()
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("id", AttributeType::String)
                            .computed()
                            .build(),
                    )
                    .build(),
                diagnostics: vec![],
            }
        }

        async fn read(
            &self,
            _ctx: Context,
            request: ReadDataSourceRequest,
        ) -> ReadDataSourceResponse {
            ReadDataSourceResponse {
                state: request.config,
                diagnostics: vec![],
            }
        }
    }

    #[async_trait]
    impl DataSourceWithConfigure for ThingDataSource {
        async fn configure(
            &mut self,
            _ctx: Context,
            _request: ConfigureDataSourceRequest,
        ) -> ConfigureDataSourceResponse {
            ConfigureDataSourceResponse {
                diagnostics: vec![],
            }
        }
    }

    fn object(entries: Vec<(&str, Dynamic)>) -> DynamicValue {
        DynamicValue::new(Dynamic::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        ))
    }

    fn wire(value: &DynamicValue) -> Option<proto::DynamicValue> {
        Some(encode_dynamic_value(value).unwrap())
    }

    fn unwire(value: Option<proto::DynamicValue>) -> DynamicValue {
        decode_dynamic_value(&value).unwrap()
    }

    fn string(s: &str) -> Dynamic {
        Dynamic::String(s.to_string())
    }

    async fn configured_service() -> ProviderService<TestProvider> {
        let service = ProviderService::new(TestProvider);
        service
            .configure_provider(Request::new(proto::configure_provider::Request {
                terraform_version: "1.9.0".to_string(),
                config: wire(&object(vec![("endpoint", Dynamic::Null)])),
                client_capabilities: None,
            }))
            .await
            .unwrap();
        service
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn schema_lists_resources_and_data_sources() {
        let service = ProviderService::new(TestProvider);
        let response = service
            .get_provider_schema(Request::new(proto::get_provider_schema::Request {}))
            .await
            .unwrap()
            .into_inner();

        assert!(response.resource_schemas.contains_key("test_thing"));
        assert!(response.data_source_schemas.contains_key("test_thing"));
        let block = response.resource_schemas["test_thing"].block.as_ref().unwrap();
        let id = block.attributes.iter().find(|a| a.name == "id").unwrap();
        assert_eq!(id.r#type, b"\"string\"".to_vec());
        assert!(id.computed);
    }

    #[test]
    fn plan_on_create_applies_defaults_and_marks_computed_unknown() {
        let config = object(vec![
            ("name", string("a")),
            ("org", string("o1")),
            ("enabled", Dynamic::Null),
            ("id", Dynamic::Null),
            ("updated_at", Dynamic::Null),
        ]);

        let outcome = plan_change(&thing_schema(), &DynamicValue::null(), &config, &config);
        let planned = outcome.planned_state;

        assert!(planned.get(&AttributePath::new("id")).unwrap().is_unknown());
        assert!(planned
            .get(&AttributePath::new("updated_at"))
            .unwrap()
            .is_unknown());
        assert!(planned.get_bool(&AttributePath::new("enabled")).unwrap());
        assert!(outcome.requires_replace.is_empty());
    }

    #[test]
    fn plan_on_update_keeps_id_and_requires_replace_for_org() {
        let prior = object(vec![
            ("id", string("guid-1")),
            ("name", string("a")),
            ("org", string("o1")),
            ("enabled", Dynamic::Bool(true)),
            ("updated_at", string("2024-01-01T00:00:00Z")),
        ]);
        let config = object(vec![
            ("id", Dynamic::Null),
            ("name", string("a")),
            ("org", string("o2")),
            ("enabled", Dynamic::Null),
            ("updated_at", Dynamic::Null),
        ]);
        let mut proposed = prior.clone();
        proposed
            .set_string(&AttributePath::new("org"), "o2".to_string())
            .unwrap();

        let outcome = plan_change(&thing_schema(), &prior, &proposed, &config);

        assert_eq!(outcome.requires_replace, vec![AttributePath::new("org")]);
        assert_eq!(
            outcome
                .planned_state
                .get_string(&AttributePath::new("id"))
                .unwrap(),
            "guid-1"
        );
        assert!(outcome
            .planned_state
            .get(&AttributePath::new("updated_at"))
            .unwrap()
            .is_unknown());
    }

    #[test]
    fn plan_without_changes_keeps_computed_values() {
        let prior = object(vec![
            ("id", string("guid-1")),
            ("name", string("a")),
            ("org", string("o1")),
            ("enabled", Dynamic::Bool(true)),
            ("updated_at", string("2024-01-01T00:00:00Z")),
        ]);
        let config = object(vec![
            ("id", Dynamic::Null),
            ("name", string("a")),
            ("org", string("o1")),
            ("enabled", Dynamic::Null),
            ("updated_at", Dynamic::Null),
        ]);

        let outcome = plan_change(&thing_schema(), &prior, &prior, &config);
        assert_eq!(outcome.planned_state, prior);
    }

    #[test]
    fn plan_fills_defaults_inside_nested_set_elements() {
        let schema = SchemaBuilder::new()
            .attribute(
                AttributeBuilder::nested(
                    "rules",
                    NestedType::set(vec![
                        AttributeBuilder::new("port", AttributeType::String)
                            .required()
                            .build(),
                        AttributeBuilder::new("protocol", AttributeType::String)
                            .default(StaticDefault::string("tcp"))
                            .build(),
                    ]),
                )
                .required()
                .build(),
            )
            .build();
        let rule = |protocol: Dynamic| {
            Dynamic::Map(HashMap::from([
                ("port".to_string(), string("8080")),
                ("protocol".to_string(), protocol),
            ]))
        };
        let config = object(vec![(
            "rules",
            Dynamic::List(vec![rule(Dynamic::Null), rule(string("udp"))]),
        )]);

        let outcome = plan_change(&schema, &DynamicValue::null(), &config, &config);

        let rules = outcome.planned_state.value.to_json()["rules"].clone();
        assert_eq!(rules[0]["protocol"], "tcp");
        assert_eq!(rules[1]["protocol"], "udp");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn apply_create_returns_state_without_unknowns() {
        let service = configured_service().await;
        let planned = object(vec![
            ("id", Dynamic::Unknown),
            ("name", string("a")),
            ("org", string("o1")),
            ("enabled", Dynamic::Bool(true)),
            ("updated_at", Dynamic::Unknown),
        ]);

        let response = service
            .apply_resource_change(Request::new(proto::apply_resource_change::Request {
                type_name: "test_thing".to_string(),
                prior_state: wire(&DynamicValue::null()),
                planned_state: wire(&planned),
                config: wire(&planned),
                planned_private: vec![],
                provider_meta: None,
            }))
            .await
            .unwrap()
            .into_inner();

        assert!(response.diagnostics.is_empty());
        let state = unwire(response.new_state);
        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "guid-1");
        assert!(state.get(&AttributePath::new("updated_at")).unwrap().is_null());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn apply_without_configure_reports_provider_not_configured() {
        let service = ProviderService::new(TestProvider);
        let planned = object(vec![("name", string("a")), ("org", string("o1"))]);

        let response = service
            .apply_resource_change(Request::new(proto::apply_resource_change::Request {
                type_name: "test_thing".to_string(),
                prior_state: None,
                planned_state: wire(&planned),
                config: wire(&planned),
                planned_private: vec![],
                provider_meta: None,
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Provider not configured");
        assert!(unwire(response.new_state).is_null());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn read_of_missing_resource_returns_null_state() {
        let service = configured_service().await;
        let current = object(vec![("id", string("gone")), ("name", string("a"))]);

        let response = service
            .read_resource(Request::new(proto::read_resource::Request {
                type_name: "test_thing".to_string(),
                current_state: wire(&current),
                private: vec![],
                provider_meta: None,
                client_capabilities: None,
            }))
            .await
            .unwrap()
            .into_inner();

        assert!(unwire(response.new_state).is_null());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn import_passes_id_through() {
        let service = configured_service().await;

        let response = service
            .import_resource_state(Request::new(proto::import_resource_state::Request {
                type_name: "test_thing".to_string(),
                id: "guid-9".to_string(),
                client_capabilities: None,
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.imported_resources.len(), 1);
        let state = unwire(response.imported_resources[0].state.clone());
        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "guid-9");
        assert!(state.get(&AttributePath::new("name")).unwrap().is_null());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn validate_resource_config_reports_schema_errors() {
        let service = ProviderService::new(TestProvider);
        let config = object(vec![("name", string("a"))]);

        let response = service
            .validate_resource_config(Request::new(proto::validate_resource_config::Request {
                type_name: "test_thing".to_string(),
                config: wire(&config),
                client_capabilities: None,
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Missing required argument");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_resource_type_is_a_diagnostic() {
        let service = configured_service().await;

        let response = service
            .read_resource(Request::new(proto::read_resource::Request {
                type_name: "test_missing".to_string(),
                current_state: None,
                private: vec![],
                provider_meta: None,
                client_capabilities: None,
            }))
            .await
            .unwrap()
            .into_inner();

        assert!(response.diagnostics[0].summary.contains("test_missing"));
    }
}
