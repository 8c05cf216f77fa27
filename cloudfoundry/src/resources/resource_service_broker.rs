//! Service broker resource
//!
//! Registering or updating a broker synchronizes its catalog in a job that
//! the API client waits for. Broker credentials are write-only.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tfplug::context::Context;
use tfplug::import::import_state_passthrough_id;
use tfplug::plan_modifier::RequiresReplace;
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
use tfplug::validator::UuidValidator;

use crate::api::service_brokers::{
    BrokerAuthentication, CreateServiceBrokerRequest, ServiceBroker, ServiceBrokerRelationships,
    UpdateServiceBrokerRequest,
};
use crate::api::ToOneRelationship;
use crate::common::{self, StringMap};
use crate::provider_data::{extract_provider_data, require_client, ConfigureTarget};
use crate::CloudFoundryProviderData;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceBrokerModel {
    pub id: Option<String>,
    pub name: String,
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub space: Option<String>,
    pub labels: Option<StringMap>,
    pub annotations: Option<StringMap>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl From<&ServiceBroker> for ServiceBrokerModel {
    fn from(broker: &ServiceBroker) -> Self {
        Self {
            id: Some(broker.guid.clone()),
            name: broker.name.clone(),
            url: broker.url.clone(),
            username: None,
            password: None,
            space: broker.relationships.space.guid().map(str::to_string),
            labels: common::labels_from(&broker.metadata),
            annotations: common::annotations_from(&broker.metadata),
            created_at: Some(broker.created_at.clone()),
            updated_at: Some(broker.updated_at.clone()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct BrokerLogin {
    username: Option<String>,
    password: Option<String>,
}

impl ServiceBrokerModel {
    fn with_login(mut self, login: BrokerLogin) -> Self {
        self.username = login.username;
        self.password = login.password;
        self
    }

    fn login(&self) -> BrokerLogin {
        BrokerLogin {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }

    fn authentication(&self) -> BrokerAuthentication {
        BrokerAuthentication::basic(
            self.username.clone().unwrap_or_default(),
            self.password.clone().unwrap_or_default(),
        )
    }
}

#[derive(Default)]
pub struct ServiceBrokerResource {
    provider_data: Option<CloudFoundryProviderData>,
}

impl ServiceBrokerResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn create_broker(&self, request: &CreateResourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let plan: ServiceBrokerModel = common::decode(&request.planned_state)?;

        let broker = client
            .service_brokers()
            .create(&CreateServiceBrokerRequest {
                name: plan.name.clone(),
                url: plan.url.clone(),
                authentication: plan.authentication(),
                relationships: plan.space.clone().map(|space| ServiceBrokerRelationships {
                    space: ToOneRelationship::new(space),
                }),
                metadata: common::metadata_request(&plan.labels, &plan.annotations),
            })
            .await
            .map_err(|e| common::api_error("API Error Registering Service Broker", &e))?;

        tracing::debug!("Registered service broker {} ({})", broker.name, broker.guid);
        common::encode(&ServiceBrokerModel::from(&broker).with_login(plan.login()))
    }

    async fn read_broker(&self, request: &ReadResourceRequest) -> Result<Option<DynamicValue>, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let id = common::state_id(&request.current_state)?;
        let login: BrokerLogin = common::decode(&request.current_state)?;

        match client.service_brokers().get(&id).await {
            Ok(broker) => common::encode(&ServiceBrokerModel::from(&broker).with_login(login)).map(Some),
            Err(e) if e.is_not_found() => {
                tracing::warn!("Service broker {} no longer exists, removing from state", id);
                Ok(None)
            }
            Err(e) => Err(common::api_error("API Error Reading Service Broker", &e)),
        }
    }

    async fn update_broker(&self, request: &UpdateResourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let plan: ServiceBrokerModel = common::decode(&request.planned_state)?;
        let prior: ServiceBrokerModel = common::decode(&request.prior_state)?;
        let id = common::state_id(&request.prior_state)?;

        let credentials_changed =
            plan.username != prior.username || plan.password != prior.password;
        let update = UpdateServiceBrokerRequest {
            name: (plan.name != prior.name).then(|| plan.name.clone()),
            url: (plan.url != prior.url).then(|| plan.url.clone()),
            authentication: credentials_changed.then(|| plan.authentication()),
            metadata: common::metadata_patch(
                &plan.labels,
                &plan.annotations,
                &prior.labels,
                &prior.annotations,
            ),
        };

        let broker = client
            .service_brokers()
            .update(&id, &update)
            .await
            .map_err(|e| common::api_error("API Error Updating Service Broker", &e))?;

        common::encode(&ServiceBrokerModel::from(&broker).with_login(plan.login()))
    }

    async fn delete_broker(&self, request: &DeleteResourceRequest) -> Result<(), Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let id = common::state_id(&request.prior_state)?;

        match client.service_brokers().delete(&id).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(common::api_error("API Error Deleting Service Broker", &e)),
        }
    }
}

#[async_trait]
impl Resource for ServiceBrokerResource {
    fn type_name(&self) -> &str {
        "cloudfoundry_service_broker"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Provides a Cloud Foundry resource for registering service brokers")
            .attribute(common::id_attribute("The GUID of the service broker"))
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Name of the service broker")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("url", AttributeType::String)
                    .description("URL of the service broker")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("username", AttributeType::String)
                    .description("The username with which to authenticate against the service broker")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("password", AttributeType::String)
                    .description("The password with which to authenticate against the service broker")
                    .required()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("space", AttributeType::String)
                    .description("The GUID of the space the service broker is restricted to; omitted for globally available service brokers")
                    .optional()
                    .validator(UuidValidator::create())
                    .plan_modifier(RequiresReplace::create())
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

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        match self.create_broker(&request).await {
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
        match self.read_broker(&request).await {
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
        match self.update_broker(&request).await {
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
            diagnostics: self.delete_broker(&request).await.err().into_iter().collect(),
        }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for ServiceBrokerResource {
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
impl ResourceWithImportState for ServiceBrokerResource {
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
    use crate::test_support::{provider_data, resource_json, value};
    use mockito::{Matcher, Server};

    const BROKER_GUID: &str = "4d5e6f7a-0000-4000-8000-0000000000b1";

    fn broker_body(url: &str) -> String {
        resource_json(
            BROKER_GUID,
            serde_json::json!({
                "name": "mysql-broker",
                "url": url,
                "relationships": {"space": {"data": null}}
            }),
        )
    }

    async fn configured(url: &str) -> ServiceBrokerResource {
        let mut resource = ServiceBrokerResource::new();
        resource
            .configure(
                Context::new(),
                ConfigureResourceRequest {
                    provider_data: provider_data(url),
                },
            )
            .await;
        resource
    }

    #[tokio::test]
    async fn update_only_sends_changed_url_and_keeps_password() {
        let mut server = Server::new_async().await;
        let patch = server
            .mock("PATCH", format!("/v3/service_brokers/{}", BROKER_GUID).as_str())
            .match_body(Matcher::Json(serde_json::json!({"url": "https://broker-v2.example.com"})))
            .with_status(202)
            .with_header("location", &format!("{}/v3/jobs/sync-1", server.url()))
            .create_async()
            .await;
        let job = server
            .mock("GET", "/v3/jobs/sync-1")
            .with_body(r#"{"guid":"sync-1","state":"COMPLETE"}"#)
            .create_async()
            .await;
        let get = server
            .mock("GET", format!("/v3/service_brokers/{}", BROKER_GUID).as_str())
            .with_body(broker_body("https://broker-v2.example.com"))
            .create_async()
            .await;

        let prior = serde_json::json!({
            "id": BROKER_GUID,
            "name": "mysql-broker",
            "url": "https://broker.example.com",
            "username": "admin",
            "password": "secret"
        });
        let mut planned = prior.clone();
        planned["url"] = "https://broker-v2.example.com".into();

        let resource = configured(&server.url()).await;
        let response = resource
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: "cloudfoundry_service_broker".to_string(),
                    prior_state: value(prior),
                    planned_state: value(planned),
                    config: DynamicValue::null(),
                    planned_private: vec![],
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.new_state.value.to_json();
        assert_eq!(state["url"], "https://broker-v2.example.com");
        assert_eq!(state["password"], "secret");
        patch.assert_async().await;
        job.assert_async().await;
        get.assert_async().await;
    }

    #[test]
    fn global_broker_has_no_space() {
        let broker: ServiceBroker =
            serde_json::from_str(&broker_body("https://broker.example.com")).unwrap();
        let model = ServiceBrokerModel::from(&broker);
        assert_eq!(model.space, None);
        assert_eq!(model.username, None);
    }
}
