//! Organization and space role resources
//!
//! Roles are immutable. Every attribute forces replacement and there is no
//! update call.

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
use tfplug::validator::{also_requires, exactly_one_of, StringOneOfValidator, UuidValidator};

use crate::api::roles::{Role, RoleTarget, RoleUser, ORG_ROLE_TYPES, SPACE_ROLE_TYPES};
use crate::common;
use crate::provider_data::{extract_provider_data, require_client, ConfigureTarget};
use crate::CloudFoundryProviderData;

/// Whether roles apply to an organization or to a space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleScope {
    Organization,
    Space,
}

impl RoleScope {
    /// Name of the attribute holding the organization or space GUID
    pub fn target_attribute(self) -> &'static str {
        match self {
            RoleScope::Organization => "org",
            RoleScope::Space => "space",
        }
    }

    pub fn role_types(self) -> &'static [&'static str] {
        match self {
            RoleScope::Organization => ORG_ROLE_TYPES,
            RoleScope::Space => SPACE_ROLE_TYPES,
        }
    }

    pub fn target(self, guid: &str) -> RoleTarget {
        match self {
            RoleScope::Organization => RoleTarget::Organization(guid.to_string()),
            RoleScope::Space => RoleTarget::Space(guid.to_string()),
        }
    }

    fn label(self) -> &'static str {
        match self {
            RoleScope::Organization => "organization",
            RoleScope::Space => "space",
        }
    }
}

/// State of a role. `target` is serialized as `org` or `space` by the
/// resource, depending on its scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleModel {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub role_type: String,
    pub user: Option<String>,
    pub username: Option<String>,
    pub origin: Option<String>,
    #[serde(alias = "org", alias = "space")]
    pub target: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl From<&Role> for RoleModel {
    fn from(role: &Role) -> Self {
        let target = role
            .relationships
            .organization
            .guid()
            .or_else(|| role.relationships.space.guid())
            .map(str::to_string);
        Self {
            id: Some(role.guid.clone()),
            role_type: role.role_type.clone(),
            user: role.relationships.user.guid().map(str::to_string),
            username: None,
            origin: None,
            target,
            created_at: Some(role.created_at.clone()),
            updated_at: Some(role.updated_at.clone()),
        }
    }
}

impl RoleModel {
    /// Terraform value with the target under the scope's attribute name
    fn to_state(&self, scope: RoleScope) -> Result<DynamicValue, Diagnostic> {
        let mut value = serde_json::to_value(self).map_err(|e| {
            Diagnostic::error("Unable to encode Terraform state", e.to_string())
        })?;
        if let Some(object) = value.as_object_mut() {
            let target = object.remove("target").unwrap_or(serde_json::Value::Null);
            object.insert(scope.target_attribute().to_string(), target);
        }
        Ok(DynamicValue::new(value.into()))
    }
}

pub struct RoleResource {
    scope: RoleScope,
    provider_data: Option<CloudFoundryProviderData>,
}

impl RoleResource {
    pub fn new(scope: RoleScope) -> Self {
        Self {
            scope,
            provider_data: None,
        }
    }

    pub fn org() -> Self {
        Self::new(RoleScope::Organization)
    }

    pub fn space() -> Self {
        Self::new(RoleScope::Space)
    }

    async fn create_role(&self, request: &CreateResourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let plan: RoleModel = common::decode(&request.planned_state)?;

        let user = match (&plan.user, &plan.username) {
            (Some(guid), _) => RoleUser::Guid(guid.clone()),
            (None, Some(username)) => RoleUser::Username {
                username: username.clone(),
                origin: plan.origin.clone(),
            },
            (None, None) => {
                return Err(Diagnostic::error(
                    "Missing role user",
                    "Either user or username must be set",
                ))
            }
        };
        let target = plan.target.as_deref().ok_or_else(|| {
            Diagnostic::error(
                "Missing role target",
                format!("{} must be set", self.scope.target_attribute()),
            )
        })?;

        let role = client
            .roles()
            .create(&plan.role_type, &user, &self.scope.target(target))
            .await
            .map_err(|e| common::api_error("API Error Creating Role", &e))?;
        tracing::debug!("Created {} role {} ({})", self.scope.label(), role.role_type, role.guid);

        let mut model = RoleModel::from(&role);
        model.username = plan.username;
        model.origin = plan.origin;
        model.to_state(self.scope)
    }

    async fn read_role(&self, request: &ReadResourceRequest) -> Result<Option<DynamicValue>, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let id = common::state_id(&request.current_state)?;

        #[derive(Deserialize)]
        struct UserLogin {
            username: Option<String>,
            origin: Option<String>,
        }
        let login: UserLogin = common::decode(&request.current_state)?;

        match client.roles().get(&id).await {
            Ok(role) => {
                let mut model = RoleModel::from(&role);
                model.username = login.username;
                model.origin = login.origin;
                model.to_state(self.scope).map(Some)
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!("Role {} no longer exists, removing from state", id);
                Ok(None)
            }
            Err(e) => Err(common::api_error("API Error Reading Role", &e)),
        }
    }

    async fn delete_role(&self, request: &DeleteResourceRequest) -> Result<(), Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let id = common::state_id(&request.prior_state)?;

        match client.roles().delete(&id).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(common::api_error("API Error Deleting Role", &e)),
        }
    }
}

#[async_trait]
impl Resource for RoleResource {
    fn type_name(&self) -> &str {
        match self.scope {
            RoleScope::Organization => "cloudfoundry_org_role",
            RoleScope::Space => "cloudfoundry_space_role",
        }
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let description = format!(
            "Provides a Cloud Foundry resource for assigning {} roles. Roles cannot be updated; any change recreates the role.",
            self.scope.label()
        );
        let schema = SchemaBuilder::new()
            .version(0)
            .description(&description)
            .attribute(common::id_attribute("The GUID of the role"))
            .attribute(
                AttributeBuilder::new("type", AttributeType::String)
                    .description("Role type; see [Valid role types](https://v3-apidocs.cloudfoundry.org/version/3.154.0/index.html#valid-role-types)")
                    .required()
                    .validator(StringOneOfValidator::create(self.scope.role_types()))
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("user", AttributeType::String)
                    .description("The guid of the cloudfoundry user to assign the role with")
                    .optional()
                    .computed()
                    .validator(UuidValidator::create())
                    .plan_modifier(RequiresReplace::create())
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("username", AttributeType::String)
                    .description("The username of the cloudfoundry user to assign the role with")
                    .optional()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("origin", AttributeType::String)
                    .description("The identity provider for the UAA user")
                    .optional()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(common::guid_reference(
                self.scope.target_attribute(),
                &format!("The guid of the {} to assign the role to", self.scope.label()),
            ))
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
            exactly_one_of(config, &["user", "username"]),
            also_requires(config, "origin", &["username"]),
        ]
        .into_iter()
        .flatten()
        .collect();

        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        match self.create_role(&request).await {
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
        match self.read_role(&request).await {
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
        UpdateResourceResponse {
            new_state: request.prior_state,
            private: vec![],
            diagnostics: vec![Diagnostic::error(
                "Roles cannot be updated",
                "Every role attribute requires replacement; this is a bug in the provider",
            )],
        }
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        DeleteResourceResponse {
            diagnostics: self.delete_role(&request).await.err().into_iter().collect(),
        }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for RoleResource {
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
impl ResourceWithImportState for RoleResource {
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
    use crate::test_support::{provider_data, resource_json, value, SPACE_GUID};
    use mockito::{Matcher, Server};

    const ROLE_GUID: &str = "8a9b0c1d-0000-4000-8000-0000000000e1";
    const USER_GUID: &str = "8a9b0c1d-0000-4000-8000-0000000000e2";

    fn space_role_body() -> String {
        resource_json(
            ROLE_GUID,
            serde_json::json!({
                "type": "space_developer",
                "relationships": {
                    "user": {"data": {"guid": USER_GUID}},
                    "space": {"data": {"guid": SPACE_GUID}},
                    "organization": {"data": null}
                }
            }),
        )
    }

    #[tokio::test]
    async fn space_role_by_username_stores_target_under_space() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v3/roles")
            .match_body(Matcher::Json(serde_json::json!({
                "type": "space_developer",
                "relationships": {
                    "user": {"data": {"username": "dev@example.com", "origin": "ldap"}},
                    "space": {"data": {"guid": SPACE_GUID}}
                }
            })))
            .with_status(201)
            .with_body(space_role_body())
            .create_async()
            .await;

        let mut resource = RoleResource::space();
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
                    type_name: "cloudfoundry_space_role".to_string(),
                    planned_state: value(serde_json::json!({
                        "id": null,
                        "type": "space_developer",
                        "user": null,
                        "username": "dev@example.com",
                        "origin": "ldap",
                        "space": SPACE_GUID
                    })),
                    config: DynamicValue::null(),
                    planned_private: vec![],
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.new_state.value.to_json();
        assert_eq!(state["space"], SPACE_GUID);
        assert_eq!(state["user"], USER_GUID);
        assert_eq!(state["username"], "dev@example.com");
        assert!(state.get("target").is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn org_role_rejects_space_role_types() {
        let resource = RoleResource::org();
        let schema = resource
            .schema(Context::new(), ResourceSchemaRequest)
            .await
            .schema;

        let diagnostics = schema.validate_config(&value(serde_json::json!({
            "type": "space_developer",
            "user": USER_GUID,
            "org": SPACE_GUID
        })));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Invalid Attribute Value Match");
    }

    #[test]
    fn model_reads_target_from_either_relationship() {
        let role: Role = serde_json::from_str(&space_role_body()).unwrap();
        let model = RoleModel::from(&role);
        assert_eq!(model.target.as_deref(), Some(SPACE_GUID));
        assert_eq!(model.user.as_deref(), Some(USER_GUID));
    }
}
