//! Visibility of a service plan
//!
//! The resource id is the service plan GUID. Organization visibility is
//! managed as a set: removed organizations are deleted one by one, new ones
//! appended in one call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tfplug::context::Context;
use tfplug::import::import_state_passthrough_id;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, UpdateResourceRequest,
    UpdateResourceResponse, ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::StringOneOfValidator;

use crate::api::service_plans::Visibility;
use crate::api::Client;
use crate::common;
use crate::diff::{self, SetDiff};
use crate::provider_data::{extract_provider_data, require_client, ConfigureTarget};
use crate::CloudFoundryProviderData;

const ORGANIZATION: &str = "organization";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicePlanVisibilityModel {
    pub id: Option<String>,
    pub service_plan: String,
    #[serde(rename = "type")]
    pub visibility_type: String,
    pub organizations: Option<Vec<String>>,
}

impl ServicePlanVisibilityModel {
    pub fn from_visibility(plan_guid: &str, visibility: &Visibility) -> Self {
        let organizations = visibility.organization_guids();
        Self {
            id: Some(plan_guid.to_string()),
            service_plan: plan_guid.to_string(),
            visibility_type: visibility.visibility_type.clone(),
            organizations: (!organizations.is_empty()).then_some(organizations),
        }
    }

    fn organizations(&self) -> &[String] {
        self.organizations.as_deref().unwrap_or_default()
    }

    fn is_organization(&self) -> bool {
        self.visibility_type == ORGANIZATION
    }
}

/// `organizations` is required for, and limited to, organization visibility
fn check_organizations(config: &DynamicValue) -> Option<Diagnostic> {
    let visibility_type = config
        .get(&AttributePath::new("type"))
        .and_then(Dynamic::as_string)?;
    let organizations = config.get(&AttributePath::new("organizations"));
    if organizations.is_some_and(Dynamic::is_unknown) {
        return None;
    }
    let has_organizations = organizations.is_some_and(|v| !v.is_null());

    match (visibility_type == ORGANIZATION, has_organizations) {
        (true, false) => Some(
            Diagnostic::error(
                "Missing Attribute Configuration",
                "organizations must be set when type is organization",
            )
            .with_attribute(AttributePath::new("organizations")),
        ),
        (false, true) => Some(
            Diagnostic::error(
                "Invalid Attribute Combination",
                format!("organizations cannot be set when type is {}", visibility_type),
            )
            .with_attribute(AttributePath::new("organizations")),
        ),
        _ => None,
    }
}

#[derive(Default)]
pub struct ServicePlanVisibilityResource {
    provider_data: Option<CloudFoundryProviderData>,
}

impl ServicePlanVisibilityResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn fetch(&self, client: &Client, plan_guid: &str) -> Result<DynamicValue, Diagnostic> {
        let visibility = client
            .service_plans()
            .visibility(plan_guid)
            .await
            .map_err(|e| common::api_error("API Error Reading Service Plan Visibility", &e))?;
        common::encode(&ServicePlanVisibilityModel::from_visibility(plan_guid, &visibility))
    }

    async fn create_visibility(&self, request: &CreateResourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let plan: ServicePlanVisibilityModel = common::decode(&request.planned_state)?;

        let visibility = client
            .service_plans()
            .replace_visibility(&plan.service_plan, &plan.visibility_type, plan.organizations())
            .await
            .map_err(|e| common::api_error("API Error Setting Service Plan Visibility", &e))?;

        tracing::debug!(
            "Service plan {} visibility set to {}",
            plan.service_plan,
            visibility.visibility_type
        );
        self.fetch(&client, &plan.service_plan).await
    }

    async fn read_visibility(&self, request: &ReadResourceRequest) -> Result<Option<DynamicValue>, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let id = common::state_id(&request.current_state)?;

        match client.service_plans().visibility(&id).await {
            Ok(visibility) => {
                common::encode(&ServicePlanVisibilityModel::from_visibility(&id, &visibility)).map(Some)
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!("Service plan {} no longer exists, removing visibility from state", id);
                Ok(None)
            }
            Err(e) => Err(common::api_error("API Error Reading Service Plan Visibility", &e)),
        }
    }

    /// Organization changes are applied as a diff; a type change replaces
    /// the whole visibility
    async fn update_visibility(
        &self,
        request: &UpdateResourceRequest,
    ) -> Result<(DynamicValue, Vec<Diagnostic>), Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let plan: ServicePlanVisibilityModel = common::decode(&request.planned_state)?;
        let prior: ServicePlanVisibilityModel = common::decode(&request.prior_state)?;
        let plans = client.service_plans();

        let diagnostics = if plan.is_organization() && prior.is_organization() {
            let plans = &plans;
            let guid = plan.service_plan.as_str();
            diff::reconcile(
                SetDiff::between(prior.organizations(), plan.organizations()),
                |org: String| async move {
                    plans.remove_organization(guid, &org).await.map_err(|e| {
                        common::api_error(
                            &format!("API Error Removing Organization {} from Service Plan Visibility", org),
                            &e,
                        )
                    })
                },
                |orgs: Vec<String>| async move {
                    plans.add_organizations(guid, &orgs).await.map(|_| ()).map_err(|e| {
                        common::api_error("API Error Adding Organizations to Service Plan Visibility", &e)
                    })
                },
            )
            .await
        } else {
            plans
                .replace_visibility(&plan.service_plan, &plan.visibility_type, plan.organizations())
                .await
                .map_err(|e| common::api_error("API Error Setting Service Plan Visibility", &e))?;
            vec![]
        };

        Ok((self.fetch(&client, &plan.service_plan).await?, diagnostics))
    }

    /// Organization visibility is revoked org by org, any other type falls
    /// back to admin-only
    async fn delete_visibility(&self, request: &DeleteResourceRequest) -> Vec<Diagnostic> {
        let models = require_client(&self.provider_data).and_then(|client| {
            let prior: ServicePlanVisibilityModel = common::decode(&request.prior_state)?;
            Ok((client, prior))
        });
        let (client, prior) = match models {
            Ok(models) => models,
            Err(diag) => return vec![diag],
        };
        let plans = client.service_plans();

        if prior.is_organization() {
            let plans = &plans;
            let guid = prior.service_plan.as_str();
            return diff::remove_all(prior.organizations().to_vec(), |org: String| async move {
                match plans.remove_organization(guid, &org).await {
                    Ok(()) => Ok(()),
                    Err(e) if e.is_not_found() => Ok(()),
                    Err(e) => Err(common::api_error(
                        &format!("API Error Removing Organization {} from Service Plan Visibility", org),
                        &e,
                    )),
                }
            })
            .await;
        }

        match plans.replace_visibility(&prior.service_plan, "admin", &[]).await {
            Ok(_) => vec![],
            Err(e) if e.is_not_found() => vec![],
            Err(e) => vec![common::api_error("API Error Resetting Service Plan Visibility", &e)],
        }
    }
}

#[async_trait]
impl Resource for ServicePlanVisibilityResource {
    fn type_name(&self) -> &str {
        "cloudfoundry_service_plan_visibility"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages the visibility of a service plan. Destroying the resource restricts the plan to admins.")
            .attribute(common::id_attribute("The GUID of the service plan"))
            .attribute(common::guid_reference("service_plan", "The GUID of the service plan"))
            .attribute(
                AttributeBuilder::new("type", AttributeType::String)
                    .description("Denotes the visibility of the plan; can be public, admin or organization")
                    .required()
                    .validator(StringOneOfValidator::create(&["public", "admin", ORGANIZATION]))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("organizations", AttributeType::Set(Box::new(AttributeType::String)))
                    .description("The GUIDs of the organizations the plan is visible in; only for the organization type")
                    .optional()
                    .build(),
            )
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
        ValidateResourceConfigResponse {
            diagnostics: check_organizations(&request.config).into_iter().collect(),
        }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        match self.create_visibility(&request).await {
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
        match self.read_visibility(&request).await {
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
        match self.update_visibility(&request).await {
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
            diagnostics: self.delete_visibility(&request).await,
        }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for ServicePlanVisibilityResource {
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
impl ResourceWithImportState for ServicePlanVisibilityResource {
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
