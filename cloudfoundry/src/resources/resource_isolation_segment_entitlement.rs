//! Entitlement of organizations to an isolation segment
//!
//! The resource id is the segment GUID and `orgs` is the full set of
//! entitled organizations. With `default` set, the segment also becomes the
//! default isolation segment of every entitled organization.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::import::import_state_passthrough_id;
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

use crate::api::Client;
use crate::common;
use crate::diff::{self, SetDiff};
use crate::provider_data::{extract_provider_data, require_client, ConfigureTarget};
use crate::CloudFoundryProviderData;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationSegmentEntitlementModel {
    pub id: Option<String>,
    pub segment: String,
    pub orgs: Vec<String>,
    pub default: Option<bool>,
}

impl IsolationSegmentEntitlementModel {
    fn is_default(&self) -> bool {
        self.default.unwrap_or(false)
    }
}

#[derive(Debug, Deserialize)]
struct StoredDefault {
    default: Option<bool>,
}

/// Point the default isolation segment of each org at `segment`, or clear it
async fn set_defaults(client: &Client, orgs: &[String], segment: Option<&str>) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for org in orgs {
        if let Err(e) = client
            .organizations()
            .set_default_isolation_segment(org, segment)
            .await
        {
            let summary = match segment {
                Some(_) => format!("API Error Setting Default Isolation Segment of Organization {}", org),
                None => format!("API Error Resetting Default Isolation Segment of Organization {}", org),
            };
            let diag = common::api_error(&summary, &e);
            tracing::warn!("{}: {}", diag.summary, diag.detail);
            diagnostics.push(diag);
        }
    }
    diagnostics
}

async fn revoke(client: &Client, segment: &str, org: String) -> Result<(), Diagnostic> {
    match client.isolation_segments().revoke_organization(segment, &org).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(common::api_error(
            &format!("API Error Revoking Isolation Segment from Organization {}", org),
            &e,
        )),
    }
}

#[derive(Default)]
pub struct IsolationSegmentEntitlementResource {
    provider_data: Option<CloudFoundryProviderData>,
}

impl IsolationSegmentEntitlementResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn state(
        &self,
        client: &Client,
        segment: &str,
        default: Option<bool>,
    ) -> Result<DynamicValue, Diagnostic> {
        let orgs = client
            .isolation_segments()
            .entitled_organizations(segment)
            .await
            .map_err(|e| common::api_error("API Error Reading Isolation Segment Entitlements", &e))?;
        common::encode(&IsolationSegmentEntitlementModel {
            id: Some(segment.to_string()),
            segment: segment.to_string(),
            orgs,
            default,
        })
    }

    async fn create_entitlement(
        &self,
        request: &CreateResourceRequest,
    ) -> Result<(DynamicValue, Vec<Diagnostic>), Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let plan: IsolationSegmentEntitlementModel = common::decode(&request.planned_state)?;

        client
            .isolation_segments()
            .entitle_organizations(&plan.segment, &plan.orgs)
            .await
            .map_err(|e| common::api_error("API Error Entitling Organizations", &e))?;
        tracing::debug!(
            "Entitled {} organizations to isolation segment {}",
            plan.orgs.len(),
            plan.segment
        );

        let diagnostics = if plan.is_default() {
            set_defaults(&client, &plan.orgs, Some(plan.segment.as_str())).await
        } else {
            vec![]
        };

        let state = self.state(&client, &plan.segment, plan.default).await?;
        Ok((state, diagnostics))
    }

    async fn read_entitlement(&self, request: &ReadResourceRequest) -> Result<Option<DynamicValue>, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let id = common::state_id(&request.current_state)?;
        let stored: StoredDefault = common::decode(&request.current_state)?;

        match self
            .state(&client, &id, Some(stored.default.unwrap_or(false)))
            .await
        {
            Ok(state) => Ok(Some(state)),
            Err(diag) => {
                if client.isolation_segments().get(&id).await.is_err_and(|e| e.is_not_found()) {
                    tracing::warn!("Isolation segment {} no longer exists, removing entitlements from state", id);
                    return Ok(None);
                }
                Err(diag)
            }
        }
    }

    async fn update_entitlement(
        &self,
        request: &UpdateResourceRequest,
    ) -> Result<(DynamicValue, Vec<Diagnostic>), Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let plan: IsolationSegmentEntitlementModel = common::decode(&request.planned_state)?;
        let prior: IsolationSegmentEntitlementModel = common::decode(&request.prior_state)?;
        let changes = SetDiff::between(&prior.orgs, &plan.orgs);
        let mut diagnostics = Vec::new();

        // a segment cannot be revoked while it is an org's default
        if prior.is_default() {
            diagnostics.extend(set_defaults(&client, &changes.removed, None).await);
        }

        let client_ref = client.as_ref();
        let segment = plan.segment.as_str();
        diagnostics.extend(
            diff::reconcile(
                changes.clone(),
                |org: String| revoke(client_ref, segment, org),
                |orgs: Vec<String>| async move {
                    client_ref
                        .isolation_segments()
                        .entitle_organizations(segment, &orgs)
                        .await
                        .map(|_| ())
                        .map_err(|e| common::api_error("API Error Entitling Organizations", &e))
                },
            )
            .await,
        );

        match (prior.is_default(), plan.is_default()) {
            (false, true) => {
                diagnostics.extend(set_defaults(&client, &plan.orgs, Some(segment)).await)
            }
            (true, true) => {
                diagnostics.extend(set_defaults(&client, &changes.added, Some(segment)).await)
            }
            (true, false) => {
                let kept: Vec<String> = plan
                    .orgs
                    .iter()
                    .filter(|org| !changes.added.contains(org))
                    .cloned()
                    .collect();
                diagnostics.extend(set_defaults(&client, &kept, None).await)
            }
            (false, false) => {}
        }

        let state = self.state(&client, segment, plan.default).await?;
        Ok((state, diagnostics))
    }

    async fn delete_entitlement(&self, request: &DeleteResourceRequest) -> Vec<Diagnostic> {
        let models = require_client(&self.provider_data).and_then(|client| {
            let prior: IsolationSegmentEntitlementModel = common::decode(&request.prior_state)?;
            Ok((client, prior))
        });
        let (client, prior) = match models {
            Ok(models) => models,
            Err(diag) => return vec![diag],
        };

        let mut diagnostics = Vec::new();
        if prior.is_default() {
            diagnostics.extend(set_defaults(&client, &prior.orgs, None).await);
        }
        let client_ref = client.as_ref();
        let segment = prior.segment.as_str();
        diagnostics.extend(
            diff::remove_all(prior.orgs.clone(), |org: String| revoke(client_ref, segment, org)).await,
        );
        diagnostics
    }
}

#[async_trait]
impl Resource for IsolationSegmentEntitlementResource {
    fn type_name(&self) -> &str {
        "cloudfoundry_isolation_segment_entitlement"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Entitles organizations to an isolation segment")
            .attribute(common::id_attribute("The GUID of the isolation segment"))
            .attribute(common::guid_reference("segment", "The GUID of the isolation segment"))
            .attribute(
                AttributeBuilder::new("orgs", AttributeType::Set(Box::new(AttributeType::String)))
                    .description("The GUIDs of the organizations to entitle")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("default", AttributeType::Bool)
                    .description("Set the isolation segment as the default isolation segment of the entitled organizations")
                    .default(StaticDefault::bool(false))
                    .build(),
            )
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        match self.create_entitlement(&request).await {
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
        match self.read_entitlement(&request).await {
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
        match self.update_entitlement(&request).await {
            Ok((new_state, diagnostics)) => UpdateResourceResponse {
                new_state,
                private: vec![],
                diagnostics,
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
            diagnostics: self.delete_entitlement(&request).await,
        }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for IsolationSegmentEntitlementResource {
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
impl ResourceWithImportState for IsolationSegmentEntitlementResource {
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
