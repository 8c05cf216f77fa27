//! Role API implementation

use serde::{Deserialize, Serialize};

use super::client::Client;
use super::common::{ListOptions, ToOneRelationship};
use super::error::ApiError;

pub const ORG_ROLE_TYPES: &[&str] = &[
    "organization_user",
    "organization_auditor",
    "organization_manager",
    "organization_billing_manager",
];

pub const SPACE_ROLE_TYPES: &[&str] = &[
    "space_auditor",
    "space_developer",
    "space_manager",
    "space_supporter",
];

#[derive(Debug, Clone, Deserialize)]
pub struct Role {
    pub guid: String,
    #[serde(rename = "type")]
    pub role_type: String,
    pub created_at: String,
    pub updated_at: String,
    pub relationships: RoleRelationships,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleRelationships {
    #[serde(default)]
    pub user: ToOneRelationship,
    #[serde(default)]
    pub organization: ToOneRelationship,
    #[serde(default)]
    pub space: ToOneRelationship,
}

/// The user a role is granted to
#[derive(Debug, Clone, PartialEq)]
pub enum RoleUser {
    Guid(String),
    Username {
        username: String,
        origin: Option<String>,
    },
}

/// Where a role applies
#[derive(Debug, Clone, PartialEq)]
pub enum RoleTarget {
    Organization(String),
    Space(String),
}

#[derive(Debug, Serialize)]
struct CreateRoleRequest {
    #[serde(rename = "type")]
    role_type: String,
    relationships: serde_json::Value,
}

pub struct RolesApi<'a> {
    client: &'a Client,
}

impl<'a> RolesApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /v3/roles
    pub async fn list(&self, options: &ListOptions) -> Result<Vec<Role>, ApiError> {
        self.client.list_all("/v3/roles", options).await
    }

    /// GET /v3/roles/{guid}
    pub async fn get(&self, guid: &str) -> Result<Role, ApiError> {
        self.client.get(&format!("/v3/roles/{}", guid)).await
    }

    /// POST /v3/roles
    pub async fn create(
        &self,
        role_type: &str,
        user: &RoleUser,
        target: &RoleTarget,
    ) -> Result<Role, ApiError> {
        let user_data = match user {
            RoleUser::Guid(guid) => serde_json::json!({ "guid": guid }),
            RoleUser::Username { username, origin } => match origin {
                Some(origin) => serde_json::json!({ "username": username, "origin": origin }),
                None => serde_json::json!({ "username": username }),
            },
        };
        let (target_key, target_guid) = match target {
            RoleTarget::Organization(guid) => ("organization", guid),
            RoleTarget::Space(guid) => ("space", guid),
        };

        let mut relationships = serde_json::Map::new();
        relationships.insert("user".to_string(), serde_json::json!({ "data": user_data }));
        relationships.insert(
            target_key.to_string(),
            serde_json::json!({ "data": { "guid": target_guid } }),
        );

        self.client
            .post(
                "/v3/roles",
                &CreateRoleRequest {
                    role_type: role_type.to_string(),
                    relationships: serde_json::Value::Object(relationships),
                },
            )
            .await
    }

    /// DELETE /v3/roles/{guid}, waits for the deletion job
    pub async fn delete(&self, guid: &str) -> Result<(), ApiError> {
        self.client
            .delete_and_wait(&format!("/v3/roles/{}", guid))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn create_by_username_and_origin() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v3/roles")
            .match_body(Matcher::Json(serde_json::json!({
                "type": "space_developer",
                "relationships": {
                    "user": {"data": {"username": "dev@example.com", "origin": "ldap"}},
                    "space": {"data": {"guid": "space-1"}}
                }
            })))
            .with_status(201)
            .with_body(
                r#"{"guid":"role-1","type":"space_developer","created_at":"2024-01-01T00:00:00Z","updated_at":"2024-01-01T00:00:00Z",
                    "relationships":{"user":{"data":{"guid":"user-1"}},"space":{"data":{"guid":"space-1"}},"organization":{"data":null}}}"#,
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let role = client
            .roles()
            .create(
                "space_developer",
                &RoleUser::Username {
                    username: "dev@example.com".to_string(),
                    origin: Some("ldap".to_string()),
                },
                &RoleTarget::Space("space-1".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(role.relationships.user.guid(), Some("user-1"));
        assert_eq!(role.relationships.organization.guid(), None);
        mock.assert_async().await;
    }
}
