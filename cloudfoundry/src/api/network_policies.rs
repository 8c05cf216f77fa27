//! Container networking policy API (`/networking/v1/external`)

use serde::{Deserialize, Serialize};

use super::client::Client;
use super::common::ListOptions;
use super::error::ApiError;

const POLICIES_PATH: &str = "/networking/v1/external/policies";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Policy {
    pub source: PolicySource,
    pub destination: PolicyDestination,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PolicySource {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PolicyDestination {
    pub id: String,
    pub protocol: String,
    pub ports: PortRange,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct Policies {
    #[serde(default, skip_serializing)]
    total_policies: u64,
    #[serde(default)]
    policies: Vec<Policy>,
}

pub struct NetworkPoliciesApi<'a> {
    client: &'a Client,
}

impl<'a> NetworkPoliciesApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /networking/v1/external/policies?id=..., policies where any of
    /// the given apps is source or destination
    pub async fn list(&self, app_guids: &[String]) -> Result<Vec<Policy>, ApiError> {
        let policies: Policies = self
            .client
            .get_with_options(POLICIES_PATH, &ListOptions::new().add_list("id", app_guids))
            .await?;
        tracing::debug!("Found {} network policies", policies.total_policies);
        Ok(policies.policies)
    }

    /// POST /networking/v1/external/policies
    pub async fn create(&self, policies: &[Policy]) -> Result<(), ApiError> {
        if policies.is_empty() {
            return Ok(());
        }
        self.client
            .post::<serde_json::Value, _>(
                POLICIES_PATH,
                &Policies {
                    total_policies: 0,
                    policies: policies.to_vec(),
                },
            )
            .await
            .map(|_| ())
    }

    /// POST /networking/v1/external/policies/delete
    pub async fn delete(&self, policies: &[Policy]) -> Result<(), ApiError> {
        if policies.is_empty() {
            return Ok(());
        }
        self.client
            .post::<serde_json::Value, _>(
                &format!("{}/delete", POLICIES_PATH),
                &Policies {
                    total_policies: 0,
                    policies: policies.to_vec(),
                },
            )
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use mockito::{Matcher, Server};

    fn policy(source: &str, destination: &str, port: u16) -> Policy {
        Policy {
            source: PolicySource {
                id: source.to_string(),
            },
            destination: PolicyDestination {
                id: destination.to_string(),
                protocol: "tcp".to_string(),
                ports: PortRange {
                    start: port,
                    end: port,
                },
            },
        }
    }

    #[tokio::test]
    async fn list_filters_by_app_ids() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", POLICIES_PATH)
            .match_query(Matcher::UrlEncoded("id".into(), "app-1,app-2".into()))
            .with_body(
                r#"{"total_policies":1,"policies":[{"source":{"id":"app-1"},"destination":{"id":"app-2","protocol":"tcp","ports":{"start":8080,"end":8080}}}]}"#,
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let policies = client
            .network_policies()
            .list(&["app-1".to_string(), "app-2".to_string()])
            .await
            .unwrap();

        assert_eq!(policies, vec![policy("app-1", "app-2", 8080)]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn delete_posts_to_delete_endpoint() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/networking/v1/external/policies/delete")
            .match_body(Matcher::Json(serde_json::json!({
                "policies": [{"source": {"id": "a"}, "destination": {"id": "b", "protocol": "tcp", "ports": {"start": 80, "end": 80}}}]
            })))
            .with_body("{}")
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        client
            .network_policies()
            .delete(&[policy("a", "b", 80)])
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn empty_create_makes_no_call() {
        let client = create_test_client("http://127.0.0.1:9");
        client.network_policies().create(&[]).await.unwrap();
    }
}
