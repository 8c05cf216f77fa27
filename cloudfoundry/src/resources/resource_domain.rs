//! Domain resource

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tfplug::context::Context;
use tfplug::import::import_state_passthrough_id;
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
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
use tfplug::validator::{conflicts_with, StringLengthValidator, UuidValidator};

use crate::api::common::GuidRef;
use crate::api::domains::{CreateDomainRequest, Domain, DomainRelationships};
use crate::api::{ToManyRelationship, ToOneRelationship};
use crate::common::{self, StringMap};
use crate::provider_data::{extract_provider_data, require_client, ConfigureTarget};
use crate::CloudFoundryProviderData;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainModel {
    pub id: Option<String>,
    pub name: String,
    pub org: Option<String>,
    pub internal: Option<bool>,
    pub router_group: Option<String>,
    pub shared_orgs: Option<Vec<String>>,
    pub supported_protocols: Option<Vec<String>>,
    pub labels: Option<StringMap>,
    pub annotations: Option<StringMap>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl From<&Domain> for DomainModel {
    fn from(domain: &Domain) -> Self {
        let shared = domain.relationships.shared_organizations.guids();
        Self {
            id: Some(domain.guid.clone()),
            name: domain.name.clone(),
            org: domain.relationships.organization.guid().map(str::to_string),
            internal: Some(domain.internal),
            router_group: domain.router_group.as_ref().map(|r| r.guid.clone()),
            shared_orgs: (!shared.is_empty()).then_some(shared),
            supported_protocols: Some(domain.supported_protocols.clone()),
            labels: common::labels_from(&domain.metadata),
            annotations: common::annotations_from(&domain.metadata),
            created_at: Some(domain.created_at.clone()),
            updated_at: Some(domain.updated_at.clone()),
        }
    }
}

#[derive(Default)]
pub struct DomainResource {
    provider_data: Option<CloudFoundryProviderData>,
}

impl DomainResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn create_domain(&self, request: &CreateResourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let plan: DomainModel = common::decode(&request.planned_state)?;

        let relationships = DomainRelationships {
            organization: plan
                .org
                .as_ref()
                .map(ToOneRelationship::new)
                .unwrap_or_default(),
            shared_organizations: ToManyRelationship::new(plan.shared_orgs.clone().unwrap_or_default()),
        };

        let domain = client
            .domains()
            .create(&CreateDomainRequest {
                name: plan.name.clone(),
                internal: plan.internal,
                router_group: plan.router_group.as_ref().map(GuidRef::new),
                relationships,
                metadata: common::metadata_request(&plan.labels, &plan.annotations),
            })
            .await
            .map_err(|e| common::api_error("API Error Creating Domain", &e))?;

        tracing::debug!("Created domain {} ({})", domain.name, domain.guid);
        common::encode(&DomainModel::from(&domain))
    }

    async fn read_domain(&self, request: &ReadResourceRequest) -> Result<Option<DynamicValue>, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let id = common::state_id(&request.current_state)?;

        match client.domains().get(&id).await {
            Ok(domain) => common::encode(&DomainModel::from(&domain)).map(Some),
            Err(e) if e.is_not_found() => {
                tracing::warn!("Domain {} no longer exists, removing from state", id);
                Ok(None)
            }
            Err(e) => Err(common::api_error("API Error Reading Domain", &e)),
        }
    }

    /// Everything except metadata forces replacement
    async fn update_domain(&self, request: &UpdateResourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let plan: DomainModel = common::decode(&request.planned_state)?;
        let prior: DomainModel = common::decode(&request.prior_state)?;
        let id = common::state_id(&request.prior_state)?;

        let domain = client
            .domains()
            .update_metadata(
                &id,
                &common::metadata_patch(
                    &plan.labels,
                    &plan.annotations,
                    &prior.labels,
                    &prior.annotations,
                ),
            )
            .await
            .map_err(|e| common::api_error("API Error Updating Domain", &e))?;

        common::encode(&DomainModel::from(&domain))
    }

    async fn delete_domain(&self, request: &DeleteResourceRequest) -> Result<(), Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let id = common::state_id(&request.prior_state)?;

        match client.domains().delete(&id).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(common::api_error("API Error Deleting Domain", &e)),
        }
    }
}

#[async_trait]
impl Resource for DomainResource {
    fn type_name(&self) -> &str {
        "cloudfoundry_domain"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Provides a Cloud Foundry resource for managing Cloud Foundry domains. Only labels and annotations can be updated in place.")
            .attribute(common::id_attribute("The GUID of the domain"))
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the domain; must be between 3 ~ 253 characters and follow RFC 1035")
                    .required()
                    .validator(StringLengthValidator::between(3, 253))
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("org", AttributeType::String)
                    .description("The organization the domain is scoped to; if set, the domain will only be available in that organization; otherwise, the domain will be globally available")
                    .optional()
                    .validator(UuidValidator::create())
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("internal", AttributeType::Bool)
                    .description("Whether the domain is used for internal (container-to-container) traffic, or external (user-to-container) traffic")
                    .optional()
                    .computed()
                    .plan_modifier(RequiresReplace::create())
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("router_group", AttributeType::String)
                    .description("The guid of the desired router group to route tcp traffic through; if set, the domain will only be available for tcp traffic")
                    .optional()
                    .validator(UuidValidator::create())
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("shared_orgs", AttributeType::Set(Box::new(AttributeType::String)))
                    .description("Organizations the domain is shared with; if set, the domain will be available in these organizations in addition to the organization the domain is scoped to")
                    .optional()
                    .validator(UuidValidator::create())
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("supported_protocols", AttributeType::List(Box::new(AttributeType::String)))
                    .description("Available protocols for routes using the domain, currently http and tcp")
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
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
        ValidateResourceConfigResponse {
            diagnostics: conflicts_with(&request.config, "internal", &["router_group"])
                .into_iter()
                .collect(),
        }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        match self.create_domain(&request).await {
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
        match self.read_domain(&request).await {
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
        match self.update_domain(&request).await {
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
            diagnostics: self.delete_domain(&request).await.err().into_iter().collect(),
        }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for DomainResource {
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
impl ResourceWithImportState for DomainResource {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{provider_data, resource_json, value, ORG_GUID};
    use mockito::{Matcher, Server};

    const DOMAIN_GUID: &str = "3f2b1a0c-0000-4000-8000-0000000000d1";

    fn domain_body() -> String {
        resource_json(
            DOMAIN_GUID,
            serde_json::json!({
                "name": "apps.example.com",
                "internal": false,
                "router_group": null,
                "supported_protocols": ["http"],
                "relationships": {
                    "organization": {"data": {"guid": ORG_GUID}},
                    "shared_organizations": {"data": []}
                }
            }),
        )
    }

    #[test]
    fn model_flattens_relationships() {
        let domain: Domain = serde_json::from_str(&domain_body()).unwrap();
        let model = DomainModel::from(&domain);

        assert_eq!(model.org.as_deref(), Some(ORG_GUID));
        assert!(model.shared_orgs.is_none());
        assert!(model.router_group.is_none());
        assert_eq!(model.supported_protocols, Some(vec!["http".to_string()]));
    }

    #[tokio::test]
    async fn create_scopes_domain_to_org() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v3/domains")
            .match_body(Matcher::Json(serde_json::json!({
                "name": "apps.example.com",
                "relationships": {"organization": {"data": {"guid": ORG_GUID}}}
            })))
            .with_status(201)
            .with_body(domain_body())
            .create_async()
            .await;

        let mut resource = DomainResource::new();
        resource
            .configure(
                Context::new(),
                ConfigureResourceRequest {
                    provider_data: provider_data(&server.url()),
                },
            )
            .await;
        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "cloudfoundry_domain".to_string(),
                    planned_state: value(serde_json::json!({
                        "name": "apps.example.com", "org": ORG_GUID
                    })),
                    config: DynamicValue::null(),
                    planned_private: vec![],
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state: DomainModel = response.new_state.to_typed().unwrap();
        assert_eq!(state.id.as_deref(), Some(DOMAIN_GUID));
        assert_eq!(state.internal, Some(false));
        mock.assert_async().await;
    }
}
