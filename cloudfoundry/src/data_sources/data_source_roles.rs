//! Roles granted in an organization or a space

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
use tfplug::validator::{StringOneOfValidator, UuidValidator};

use crate::api::roles::Role;
use crate::api::ListOptions;
use crate::common;
use crate::provider_data::require_client;
use crate::resources::RoleScope;
use crate::CloudFoundryProviderData;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleEntryModel {
    pub id: String,
    #[serde(rename = "type")]
    pub role_type: String,
    pub user: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Role> for RoleEntryModel {
    fn from(role: &Role) -> Self {
        Self {
            id: role.guid.clone(),
            role_type: role.role_type.clone(),
            user: role.relationships.user.guid().map(str::to_string),
            created_at: role.created_at.clone(),
            updated_at: role.updated_at.clone(),
        }
    }
}

/// Filters of the data source; the target is the `org` or `space` attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolesModel {
    #[serde(alias = "org", alias = "space")]
    pub target: String,
    #[serde(rename = "type")]
    pub role_type: Option<String>,
    pub user: Option<String>,
    pub roles: Option<Vec<RoleEntryModel>>,
}

impl RolesModel {
    fn matches(&self, role: &Role) -> bool {
        self.role_type.as_ref().map_or(true, |t| *t == role.role_type)
            && self
                .user
                .as_deref()
                .map_or(true, |u| role.relationships.user.guid() == Some(u))
    }
}

pub struct RolesDataSource {
    scope: RoleScope,
    provider_data: Option<CloudFoundryProviderData>,
}

impl RolesDataSource {
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

    fn target_filter(&self) -> &'static str {
        match self.scope {
            RoleScope::Organization => "organization_guids",
            RoleScope::Space => "space_guids",
        }
    }

    async fn read_roles(&self, request: &ReadDataSourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let mut model: RolesModel = common::decode(&request.config)?;

        let roles = client
            .roles()
            .list(&ListOptions::new().add(self.target_filter(), &model.target))
            .await
            .map_err(|e| common::api_error("API Error Reading Roles", &e))?;

        let matching: Vec<RoleEntryModel> = roles
            .iter()
            .filter(|role| model.matches(role))
            .map(RoleEntryModel::from)
            .collect();
        tracing::debug!("{} of {} roles match the filters", matching.len(), roles.len());
        model.roles = Some(matching);

        let mut state = serde_json::to_value(&model).map_err(|e| {
            Diagnostic::error("Unable to encode Terraform state", e.to_string())
        })?;
        if let Some(object) = state.as_object_mut() {
            let target = object.remove("target").unwrap_or(serde_json::Value::Null);
            object.insert(self.scope.target_attribute().to_string(), target);
        }
        Ok(DynamicValue::new(state.into()))
    }
}

#[async_trait]
impl DataSource for RolesDataSource {
    fn type_name(&self) -> &str {
        match self.scope {
            RoleScope::Organization => "cloudfoundry_org_roles",
            RoleScope::Space => "cloudfoundry_space_roles",
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let target = self.scope.target_attribute();
        let schema = SchemaBuilder::new()
            .version(0)
            .description(&format!("Gets the roles granted in a Cloud Foundry {}.", target))
            .attribute(common::guid_filter(target, &format!("The GUID of the {}", target)))
            .attribute(
                AttributeBuilder::new("type", AttributeType::String)
                    .description("The role type to filter by")
                    .optional()
                    .validator(StringOneOfValidator::create(self.scope.role_types()))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("user", AttributeType::String)
                    .description("The GUID of the user to filter by")
                    .optional()
                    .validator(UuidValidator::create())
                    .build(),
            )
            .attribute(super::results_attribute(
                "roles",
                "The list of roles",
                vec![
                    common::computed_string("id", "The GUID of the role"),
                    common::computed_string("type", "The role type"),
                    common::computed_string("user", "The GUID of the user holding the role"),
                    common::computed_string("created_at", "The date and time when the role was created in RFC3339 format."),
                    common::computed_string("updated_at", "The date and time when the role was updated in RFC3339 format."),
                ],
            ))
            .build();

        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        super::respond(self.read_roles(&request).await)
    }
}

#[async_trait]
impl DataSourceWithConfigure for RolesDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        super::configure(&mut self.provider_data, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{configured_data_source, page_json, read_request, SPACE_GUID};
    use mockito::{Matcher, Server};

    const USER: &str = "7a8b9c0d-0000-4000-8000-000000000001";

    fn role(guid: &str, role_type: &str, user: &str) -> String {
        serde_json::json!({
            "guid": guid,
            "type": role_type,
            "created_at": "2024-01-02T03:04:05Z",
            "updated_at": "2024-01-02T03:04:05Z",
            "relationships": {
                "user": {"data": {"guid": user}},
                "space": {"data": {"guid": SPACE_GUID}},
                "organization": {"data": null}
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn space_roles_filter_by_user() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v3/roles")
            .match_query(Matcher::UrlEncoded("space_guids".into(), SPACE_GUID.into()))
            .with_body(page_json(&[
                role("r1", "space_developer", USER),
                role("r2", "space_manager", "someone-else"),
            ]))
            .create_async()
            .await;

        let data_source = configured_data_source(RolesDataSource::space(), &server.url()).await;
        let response = data_source
            .read(
                Context::new(),
                read_request(
                    "cloudfoundry_space_roles",
                    serde_json::json!({"space": SPACE_GUID, "user": USER}),
                ),
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.state.value.to_json();
        assert_eq!(state["space"], SPACE_GUID);
        assert!(state.get("target").is_none());
        assert_eq!(state["roles"].as_array().unwrap().len(), 1);
        assert_eq!(state["roles"][0]["type"], "space_developer");
    }
}
