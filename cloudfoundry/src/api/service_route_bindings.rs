//! Service route binding API implementation

use serde::{Deserialize, Serialize};

use super::client::Client;
use super::common::{ListOptions, Metadata, MetadataRequest, ToOneRelationship};
use super::error::ApiError;
use super::service_instances::LastOperation;

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceRouteBinding {
    pub guid: String,
    #[serde(default)]
    pub route_service_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub last_operation: Option<LastOperation>,
    pub relationships: ServiceRouteBindingRelationships,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServiceRouteBindingRelationships {
    pub service_instance: ToOneRelationship,
    pub route: ToOneRelationship,
}

#[derive(Debug, Serialize)]
pub struct CreateServiceRouteBindingRequest {
    pub relationships: ServiceRouteBindingRelationships,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "MetadataRequest::is_empty")]
    pub metadata: MetadataRequest,
}

pub struct ServiceRouteBindingsApi<'a> {
    client: &'a Client,
}

impl<'a> ServiceRouteBindingsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /v3/service_route_bindings
    pub async fn list(&self, options: &ListOptions) -> Result<Vec<ServiceRouteBinding>, ApiError> {
        self.client
            .list_all("/v3/service_route_bindings", options)
            .await
    }

    /// GET /v3/service_route_bindings/{guid}
    pub async fn get(&self, guid: &str) -> Result<ServiceRouteBinding, ApiError> {
        self.client
            .get(&format!("/v3/service_route_bindings/{}", guid))
            .await
    }

    /// POST /v3/service_route_bindings. Bindings to managed instances run as
    /// a job and are looked up by instance and route afterwards.
    pub async fn create(
        &self,
        request: &CreateServiceRouteBindingRequest,
    ) -> Result<ServiceRouteBinding, ApiError> {
        let response = self
            .client
            .post_async::<ServiceRouteBinding, _>("/v3/service_route_bindings", request)
            .await?;
        if let Some(binding) = self.client.complete(response).await? {
            return Ok(binding);
        }

        let relationships = &request.relationships;
        let options = ListOptions::new()
            .add_optional("service_instance_guids", relationships.service_instance.guid())
            .add_optional("route_guids", relationships.route.guid());
        self.list(&options)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ApiError::ParseError("service route binding not found after creation".to_string())
            })
    }

    /// PATCH /v3/service_route_bindings/{guid}, metadata only
    pub async fn update_metadata(
        &self,
        guid: &str,
        metadata: &MetadataRequest,
    ) -> Result<ServiceRouteBinding, ApiError> {
        self.client
            .patch(
                &format!("/v3/service_route_bindings/{}", guid),
                &serde_json::json!({ "metadata": metadata }),
            )
            .await
    }

    /// DELETE /v3/service_route_bindings/{guid}, waits for the unbinding job
    pub async fn delete(&self, guid: &str) -> Result<(), ApiError> {
        self.client
            .delete_and_wait(&format!("/v3/service_route_bindings/{}", guid))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use mockito::{Matcher, Server};

    const BINDING_JSON: &str = r#"{"guid":"srb-1","route_service_url":"https://rs.example.com",
        "created_at":"2024-01-01T00:00:00Z","updated_at":"2024-01-01T00:00:00Z",
        "last_operation":{"type":"create","state":"succeeded"},
        "relationships":{"service_instance":{"data":{"guid":"si-1"}},"route":{"data":{"guid":"route-1"}}},
        "metadata":{"labels":{},"annotations":{}}}"#;

    #[tokio::test]
    async fn create_through_job_looks_up_binding() {
        let mut server = Server::new_async().await;
        let create = server
            .mock("POST", "/v3/service_route_bindings")
            .match_body(Matcher::Json(serde_json::json!({
                "relationships": {
                    "service_instance": {"data": {"guid": "si-1"}},
                    "route": {"data": {"guid": "route-1"}}
                },
                "parameters": {"rate": 10}
            })))
            .with_status(202)
            .with_header("location", &format!("{}/v3/jobs/job-1", server.url()))
            .create_async()
            .await;
        let _job = server
            .mock("GET", "/v3/jobs/job-1")
            .with_body(r#"{"guid":"job-1","state":"COMPLETE"}"#)
            .create_async()
            .await;
        let lookup = server
            .mock("GET", "/v3/service_route_bindings")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("service_instance_guids".into(), "si-1".into()),
                Matcher::UrlEncoded("route_guids".into(), "route-1".into()),
            ]))
            .with_body(format!(
                r#"{{"pagination":{{"next":null}},"resources":[{}]}}"#,
                BINDING_JSON
            ))
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let binding = client
            .service_route_bindings()
            .create(&CreateServiceRouteBindingRequest {
                relationships: ServiceRouteBindingRelationships {
                    service_instance: ToOneRelationship::new("si-1"),
                    route: ToOneRelationship::new("route-1"),
                },
                parameters: Some(serde_json::json!({"rate": 10})),
                metadata: MetadataRequest::default(),
            })
            .await
            .unwrap();

        assert_eq!(binding.guid, "srb-1");
        create.assert_async().await;
        lookup.assert_async().await;
    }
}
