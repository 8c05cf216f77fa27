//! Security group API implementation

use serde::{Deserialize, Serialize};

use super::client::Client;
use super::common::{ListOptions, ToManyRelationship};
use super::error::ApiError;

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityGroup {
    pub guid: String,
    pub name: String,
    pub globally_enabled: GloballyEnabled,
    #[serde(default)]
    pub rules: Vec<SecurityGroupRule>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub relationships: SecurityGroupRelationships,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct GloballyEnabled {
    pub running: bool,
    pub staging: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct SecurityGroupRule {
    pub protocol: String,
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub icmp_type: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecurityGroupRelationships {
    #[serde(default)]
    pub running_spaces: ToManyRelationship,
    #[serde(default)]
    pub staging_spaces: ToManyRelationship,
}

#[derive(Debug, Serialize)]
pub struct SecurityGroupRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub globally_enabled: GloballyEnabled,
    pub rules: Vec<SecurityGroupRule>,
}

/// Which lifecycle a space binding applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceLifecycle {
    Running,
    Staging,
}

impl SpaceLifecycle {
    fn relationship(self) -> &'static str {
        match self {
            SpaceLifecycle::Running => "running_spaces",
            SpaceLifecycle::Staging => "staging_spaces",
        }
    }
}

impl std::fmt::Display for SpaceLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpaceLifecycle::Running => write!(f, "running"),
            SpaceLifecycle::Staging => write!(f, "staging"),
        }
    }
}

pub struct SecurityGroupsApi<'a> {
    client: &'a Client,
}

impl<'a> SecurityGroupsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /v3/security_groups
    pub async fn list(&self, options: &ListOptions) -> Result<Vec<SecurityGroup>, ApiError> {
        self.client.list_all("/v3/security_groups", options).await
    }

    /// GET /v3/security_groups/{guid}
    pub async fn get(&self, guid: &str) -> Result<SecurityGroup, ApiError> {
        self.client
            .get(&format!("/v3/security_groups/{}", guid))
            .await
    }

    /// POST /v3/security_groups
    pub async fn create(&self, request: &SecurityGroupRequest) -> Result<SecurityGroup, ApiError> {
        self.client.post("/v3/security_groups", request).await
    }

    /// PATCH /v3/security_groups/{guid}
    pub async fn update(
        &self,
        guid: &str,
        request: &SecurityGroupRequest,
    ) -> Result<SecurityGroup, ApiError> {
        self.client
            .patch(&format!("/v3/security_groups/{}", guid), request)
            .await
    }

    /// DELETE /v3/security_groups/{guid}, waits for the deletion job
    pub async fn delete(&self, guid: &str) -> Result<(), ApiError> {
        self.client
            .delete_and_wait(&format!("/v3/security_groups/{}", guid))
            .await
    }

    /// POST /v3/security_groups/{guid}/relationships/{running|staging}_spaces
    pub async fn bind_spaces(
        &self,
        guid: &str,
        lifecycle: SpaceLifecycle,
        space_guids: &[String],
    ) -> Result<ToManyRelationship, ApiError> {
        self.client
            .post(
                &format!(
                    "/v3/security_groups/{}/relationships/{}",
                    guid,
                    lifecycle.relationship()
                ),
                &ToManyRelationship::new(space_guids.iter().cloned()),
            )
            .await
    }

    /// DELETE /v3/security_groups/{guid}/relationships/{running|staging}_spaces/{space}
    pub async fn unbind_space(
        &self,
        guid: &str,
        lifecycle: SpaceLifecycle,
        space_guid: &str,
    ) -> Result<(), ApiError> {
        self.client
            .delete(&format!(
                "/v3/security_groups/{}/relationships/{}/{}",
                guid,
                lifecycle.relationship(),
                space_guid
            ))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn rules_keep_optional_fields() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v3/security_groups/sg-1")
            .with_body(
                r#"{"guid":"sg-1","name":"dns","globally_enabled":{"running":true,"staging":false},
                    "rules":[{"protocol":"udp","destination":"10.0.0.2","ports":"53"},{"protocol":"icmp","destination":"0.0.0.0/0","type":0,"code":0,"log":true}],
                    "created_at":"2024-01-01T00:00:00Z","updated_at":"2024-01-01T00:00:00Z",
                    "relationships":{"running_spaces":{"data":[{"guid":"space-1"}]},"staging_spaces":{"data":[]}}}"#,
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let group = client.security_groups().get("sg-1").await.unwrap();

        assert_eq!(group.rules[0].ports.as_deref(), Some("53"));
        assert_eq!(group.rules[1].icmp_type, Some(0));
        assert_eq!(group.rules[1].log, Some(true));
        assert_eq!(group.relationships.running_spaces.guids(), vec!["space-1"]);
    }

    #[tokio::test]
    async fn bind_and_unbind_staging_spaces() {
        let mut server = Server::new_async().await;
        let bind = server
            .mock("POST", "/v3/security_groups/sg-1/relationships/staging_spaces")
            .match_body(Matcher::Json(serde_json::json!({
                "data": [{"guid": "space-1"}, {"guid": "space-2"}]
            })))
            .with_body(r#"{"data":[{"guid":"space-1"},{"guid":"space-2"}]}"#)
            .create_async()
            .await;
        let unbind = server
            .mock(
                "DELETE",
                "/v3/security_groups/sg-1/relationships/staging_spaces/space-3",
            )
            .with_status(204)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let api = client.security_groups();
        api.bind_spaces(
            "sg-1",
            SpaceLifecycle::Staging,
            &["space-1".to_string(), "space-2".to_string()],
        )
        .await
        .unwrap();
        api.unbind_space("sg-1", SpaceLifecycle::Staging, "space-3")
            .await
            .unwrap();

        bind.assert_async().await;
        unbind.assert_async().await;
    }
}
