//! Service broker API implementation

use serde::{Deserialize, Serialize};

use super::client::Client;
use super::common::{ListOptions, Metadata, MetadataRequest, ToOneRelationship};
use super::error::ApiError;

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceBroker {
    pub guid: String,
    pub name: String,
    pub url: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub relationships: ServiceBrokerRelationships,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServiceBrokerRelationships {
    #[serde(default)]
    pub space: ToOneRelationship,
}

#[derive(Debug, Clone, Serialize)]
pub struct BrokerAuthentication {
    #[serde(rename = "type")]
    pub auth_type: String,
    pub credentials: BrokerCredentials,
}

#[derive(Debug, Clone, Serialize)]
pub struct BrokerCredentials {
    pub username: String,
    pub password: String,
}

impl BrokerAuthentication {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            auth_type: "basic".to_string(),
            credentials: BrokerCredentials {
                username: username.into(),
                password: password.into(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateServiceBrokerRequest {
    pub name: String,
    pub url: String,
    pub authentication: BrokerAuthentication,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationships: Option<ServiceBrokerRelationships>,
    #[serde(skip_serializing_if = "MetadataRequest::is_empty")]
    pub metadata: MetadataRequest,
}

#[derive(Debug, Default, Serialize)]
pub struct UpdateServiceBrokerRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<BrokerAuthentication>,
    #[serde(skip_serializing_if = "MetadataRequest::is_empty")]
    pub metadata: MetadataRequest,
}

pub struct ServiceBrokersApi<'a> {
    client: &'a Client,
}

impl<'a> ServiceBrokersApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /v3/service_brokers
    pub async fn list(&self, options: &ListOptions) -> Result<Vec<ServiceBroker>, ApiError> {
        self.client.list_all("/v3/service_brokers", options).await
    }

    /// GET /v3/service_brokers/{guid}
    pub async fn get(&self, guid: &str) -> Result<ServiceBroker, ApiError> {
        self.client
            .get(&format!("/v3/service_brokers/{}", guid))
            .await
    }

    /// POST /v3/service_brokers. Registration fetches the broker catalog in
    /// a job; the broker is read back by name once it completes.
    pub async fn create(
        &self,
        request: &CreateServiceBrokerRequest,
    ) -> Result<ServiceBroker, ApiError> {
        let response = self
            .client
            .post_async::<ServiceBroker, _>("/v3/service_brokers", request)
            .await?;
        if let Some(broker) = self.client.complete(response).await? {
            return Ok(broker);
        }

        self.list(&ListOptions::new().add("names", &request.name))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ApiError::ParseError(format!(
                    "service broker {} not found after registration",
                    request.name
                ))
            })
    }

    /// PATCH /v3/service_brokers/{guid}, waits for the catalog refresh job
    pub async fn update(
        &self,
        guid: &str,
        request: &UpdateServiceBrokerRequest,
    ) -> Result<ServiceBroker, ApiError> {
        let response = self
            .client
            .patch_async::<ServiceBroker, _>(&format!("/v3/service_brokers/{}", guid), request)
            .await?;
        match self.client.complete(response).await? {
            Some(broker) => Ok(broker),
            None => self.get(guid).await,
        }
    }

    /// DELETE /v3/service_brokers/{guid}, waits for the deletion job
    pub async fn delete(&self, guid: &str) -> Result<(), ApiError> {
        self.client
            .delete_and_wait(&format!("/v3/service_brokers/{}", guid))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn update_without_job_returns_broker() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PATCH", "/v3/service_brokers/broker-1")
            .match_body(Matcher::Json(serde_json::json!({
                "metadata": {"labels": {"team": "data"}}
            })))
            .with_body(
                r#"{"guid":"broker-1","name":"mysql","url":"https://broker.example.com","created_at":"2024-01-01T00:00:00Z",
                    "updated_at":"2024-01-03T00:00:00Z","relationships":{},"metadata":{"labels":{"team":"data"},"annotations":{}}}"#,
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let mut metadata = MetadataRequest::default();
        metadata
            .labels
            .insert("team".to_string(), Some("data".to_string()));
        let broker = client
            .service_brokers()
            .update(
                "broker-1",
                &UpdateServiceBrokerRequest {
                    metadata,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(broker.metadata.label_map()["team"], "data");
        assert_eq!(broker.relationships.space.guid(), None);
        mock.assert_async().await;
    }

    #[test]
    fn basic_authentication_shape() {
        let body = serde_json::to_value(BrokerAuthentication::basic("admin", "pw")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"type": "basic", "credentials": {"username": "admin", "password": "pw"}})
        );
    }
}
