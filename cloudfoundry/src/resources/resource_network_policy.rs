//! Container-to-container network policies
//!
//! The resource owns a set of policies. Read drops policies that no longer
//! exist; update deletes removed policies one by one and creates the added
//! ones in a single call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::import::import_state_passthrough_id;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, UpdateResourceRequest,
    UpdateResourceResponse, ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType, NestedType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tfplug::validator::{StringOneOfValidator, StringPatternValidator, UuidValidator};

use crate::api::network_policies::{Policy, PolicyDestination, PolicySource, PortRange};
use crate::api::Client;
use crate::common;
use crate::diff::{self, SetDiff};
use crate::provider_data::{extract_provider_data, require_client, ConfigureTarget};
use crate::CloudFoundryProviderData;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyModel {
    pub source_app: String,
    pub destination_app: String,
    pub port: String,
    pub protocol: Option<String>,
}

impl PolicyModel {
    fn to_policy(&self) -> Result<Policy, Diagnostic> {
        Ok(Policy {
            source: PolicySource {
                id: self.source_app.clone(),
            },
            destination: PolicyDestination {
                id: self.destination_app.clone(),
                protocol: self.protocol.clone().unwrap_or_else(|| "tcp".to_string()),
                ports: parse_ports(&self.port)?,
            },
        })
    }
}

impl From<&Policy> for PolicyModel {
    fn from(policy: &Policy) -> Self {
        let ports = policy.destination.ports;
        Self {
            source_app: policy.source.id.clone(),
            destination_app: policy.destination.id.clone(),
            port: if ports.start == ports.end {
                ports.start.to_string()
            } else {
                format!("{}-{}", ports.start, ports.end)
            },
            protocol: Some(policy.destination.protocol.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkPolicyModel {
    pub id: Option<String>,
    pub policies: Option<Vec<PolicyModel>>,
}

impl NetworkPolicyModel {
    fn api_policies(&self) -> Result<Vec<Policy>, Diagnostic> {
        self.policies
            .iter()
            .flatten()
            .map(PolicyModel::to_policy)
            .collect()
    }
}

/// `"8080"` or `"8080-8090"`
fn parse_ports(port: &str) -> Result<PortRange, Diagnostic> {
    let invalid = || {
        Diagnostic::error(
            "Invalid port range",
            format!("Expected a port or a range like 8080-8090, got {:?}", port),
        )
    };
    let (start, end) = match port.split_once('-') {
        Some((start, end)) => (start.trim(), end.trim()),
        None => (port.trim(), port.trim()),
    };
    let start: u16 = start.parse().map_err(|_| invalid())?;
    let end: u16 = end.parse().map_err(|_| invalid())?;
    if start == 0 || start > end {
        return Err(invalid());
    }
    Ok(PortRange { start, end })
}

fn app_guids(policies: &[Policy]) -> Vec<String> {
    let mut guids: Vec<String> = policies.iter().map(|p| p.source.id.clone()).collect();
    guids.sort();
    guids.dedup();
    guids
}

async fn sync_policies(client: &Client, prior: &[Policy], planned: &[Policy]) -> Vec<Diagnostic> {
    let api = client.network_policies();
    let api = &api;
    diff::reconcile(
        SetDiff::between(prior, planned),
        |policy| async move {
            api.delete(std::slice::from_ref(&policy)).await.map_err(|e| {
                common::api_error(
                    &format!(
                        "API Error Deleting Network Policy from {} to {}",
                        policy.source.id, policy.destination.id
                    ),
                    &e,
                )
            })
        },
        |added| async move {
            api.create(&added)
                .await
                .map_err(|e| common::api_error("API Error Creating Network Policies", &e))
        },
    )
    .await
}

#[derive(Default)]
pub struct NetworkPolicyResource {
    provider_data: Option<CloudFoundryProviderData>,
}

impl NetworkPolicyResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn create_policies(
        &self,
        request: &CreateResourceRequest,
    ) -> Result<DynamicValue, Vec<Diagnostic>> {
        let client = require_client(&self.provider_data).map_err(|d| vec![d])?;
        let mut plan: NetworkPolicyModel =
            common::decode(&request.planned_state).map_err(|d| vec![d])?;
        let policies = plan.api_policies().map_err(|d| vec![d])?;

        client
            .network_policies()
            .create(&policies)
            .await
            .map_err(|e| vec![common::api_error("API Error Creating Network Policies", &e)])?;

        tracing::debug!("Created {} network policies", policies.len());
        plan.id = Some(uuid::Uuid::new_v4().to_string());
        plan.policies = Some(policies.iter().map(PolicyModel::from).collect());
        common::encode(&plan).map_err(|d| vec![d])
    }

    async fn read_policies(
        &self,
        request: &ReadResourceRequest,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let id = common::state_id(&request.current_state)?;
        let state: NetworkPolicyModel = common::decode(&request.current_state)?;
        let tracked = state.api_policies()?;

        // Imported state carries only the source app GUID
        let sources = if tracked.is_empty() {
            vec![id.clone()]
        } else {
            app_guids(&tracked)
        };
        let existing = client
            .network_policies()
            .list(&sources)
            .await
            .map_err(|e| common::api_error("API Error Reading Network Policies", &e))?;

        let current: Vec<Policy> = if tracked.is_empty() {
            existing.into_iter().filter(|p| p.source.id == id).collect()
        } else {
            tracked.into_iter().filter(|p| existing.contains(p)).collect()
        };
        if current.is_empty() {
            tracing::warn!("Network policies {} no longer exist, removing from state", id);
            return Ok(None);
        }

        common::encode(&NetworkPolicyModel {
            id: Some(id),
            policies: Some(current.iter().map(PolicyModel::from).collect()),
        })
        .map(Some)
    }

    /// On a partial failure the new state holds the policies that exist
    /// upstream afterwards, next to the diagnostics of the failed calls.
    async fn update_policies(
        &self,
        request: &UpdateResourceRequest,
    ) -> Result<(DynamicValue, Vec<Diagnostic>), Vec<Diagnostic>> {
        let client = require_client(&self.provider_data).map_err(|d| vec![d])?;
        let mut plan: NetworkPolicyModel =
            common::decode(&request.planned_state).map_err(|d| vec![d])?;
        let prior: NetworkPolicyModel =
            common::decode(&request.prior_state).map_err(|d| vec![d])?;
        let planned = plan.api_policies().map_err(|d| vec![d])?;
        let previous = prior.api_policies().map_err(|d| vec![d])?;

        let mut diagnostics = sync_policies(&client, &previous, &planned).await;
        let current = if diagnostics.is_empty() {
            planned
        } else {
            let mut candidates = previous;
            for policy in planned {
                if !candidates.contains(&policy) {
                    candidates.push(policy);
                }
            }
            match client.network_policies().list(&app_guids(&candidates)).await {
                Ok(existing) => candidates
                    .into_iter()
                    .filter(|p| existing.contains(p))
                    .collect::<Vec<_>>(),
                Err(e) => {
                    diagnostics.push(common::api_error("API Error Reading Network Policies", &e));
                    return Err(diagnostics);
                }
            }
        };

        plan.id = prior.id;
        plan.policies = Some(current.iter().map(PolicyModel::from).collect());
        match common::encode(&plan) {
            Ok(state) => Ok((state, diagnostics)),
            Err(diag) => {
                diagnostics.push(diag);
                Err(diagnostics)
            }
        }
    }

    async fn delete_policies(&self, request: &DeleteResourceRequest) -> Vec<Diagnostic> {
        let client = match require_client(&self.provider_data) {
            Ok(client) => client,
            Err(diag) => return vec![diag],
        };
        let prior = match common::decode::<NetworkPolicyModel>(&request.prior_state)
            .and_then(|m| m.api_policies())
        {
            Ok(policies) => policies,
            Err(diag) => return vec![diag],
        };
        sync_policies(&client, &prior, &[]).await
    }
}

fn policy_attributes() -> Vec<Attribute> {
    vec![
        AttributeBuilder::new("source_app", AttributeType::String)
            .description("The GUID of the app sending traffic")
            .required()
            .validator(UuidValidator::create())
            .build(),
        AttributeBuilder::new("destination_app", AttributeType::String)
            .description("The GUID of the app receiving traffic")
            .required()
            .validator(UuidValidator::create())
            .build(),
        AttributeBuilder::new("port", AttributeType::String)
            .description("Port or port range (e.g. 8080-8090) of the destination app")
            .required()
            .validator(StringPatternValidator::create(
                r"^\d{1,5}(-\d{1,5})?$",
                "a port or a port range like 8080-8090",
            ))
            .build(),
        AttributeBuilder::new("protocol", AttributeType::String)
            .description("Protocol of the allowed traffic, tcp or udp")
            .validator(StringOneOfValidator::create(&["tcp", "udp"]))
            .default(StaticDefault::string("tcp"))
            .build(),
    ]
}

#[async_trait]
impl Resource for NetworkPolicyResource {
    fn type_name(&self) -> &str {
        "cloudfoundry_network_policy"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages container-to-container network policies between apps")
            .attribute(common::id_attribute("Identifier of the policy set"))
            .attribute(
                AttributeBuilder::nested("policies", NestedType::set(policy_attributes()))
                    .description("Network policies allowing traffic between apps")
                    .required()
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
        let mut diagnostics = vec![];
        if let Some(policies) = request
            .config
            .get(&AttributePath::new("policies"))
            .and_then(|p| p.as_list())
        {
            for policy in policies {
                let port = policy.to_json();
                if let Some(port) = port.get("port").and_then(|p| p.as_str()) {
                    if let Err(diag) = parse_ports(port) {
                        diagnostics.push(diag.with_attribute(AttributePath::new("policies")));
                    }
                }
            }
        }
        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        match self.create_policies(&request).await {
            Ok(new_state) => CreateResourceResponse {
                new_state,
                private: vec![],
                diagnostics: vec![],
            },
            Err(diagnostics) => CreateResourceResponse {
                new_state: DynamicValue::null(),
                private: vec![],
                diagnostics,
            },
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        match self.read_policies(&request).await {
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
        match self.update_policies(&request).await {
            Ok((new_state, diagnostics)) => UpdateResourceResponse {
                new_state,
                private: vec![],
                diagnostics,
            },
            Err(diagnostics) => UpdateResourceResponse {
                new_state: request.prior_state,
                private: vec![],
                diagnostics,
            },
        }
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        DeleteResourceResponse {
            diagnostics: self.delete_policies(&request).await,
        }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for NetworkPolicyResource {
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
impl ResourceWithImportState for NetworkPolicyResource {
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
    use crate::test_support::{provider_data, value};
    use mockito::{Matcher, Server};

    const APP_A: &str = "5e6f7a8b-0000-4000-8000-00000000000a";
    const APP_B: &str = "5e6f7a8b-0000-4000-8000-00000000000b";
    const APP_C: &str = "5e6f7a8b-0000-4000-8000-00000000000c";

    fn policy_json(source: &str, destination: &str, port: &str) -> serde_json::Value {
        serde_json::json!({
            "source_app": source,
            "destination_app": destination,
            "port": port,
            "protocol": "tcp"
        })
    }

    fn wire(source: &str, destination: &str, start: u16, end: u16) -> serde_json::Value {
        serde_json::json!({
            "source": {"id": source},
            "destination": {"id": destination, "protocol": "tcp", "ports": {"start": start, "end": end}}
        })
    }

    #[test]
    fn ports_parse_single_and_range() {
        assert_eq!(parse_ports("8080").unwrap(), PortRange { start: 8080, end: 8080 });
        assert_eq!(parse_ports("8080-8090").unwrap(), PortRange { start: 8080, end: 8090 });
        assert!(parse_ports("9000-8000").is_err());
        assert!(parse_ports("http").is_err());
        assert!(parse_ports("0").is_err());
    }

    #[test]
    fn model_formats_port_ranges() {
        let policy = PolicyModel {
            source_app: APP_A.to_string(),
            destination_app: APP_B.to_string(),
            port: "8080-8090".to_string(),
            protocol: None,
        }
        .to_policy()
        .unwrap();

        assert_eq!(policy.destination.protocol, "tcp");
        assert_eq!(PolicyModel::from(&policy).port, "8080-8090");
    }

    #[tokio::test]
    async fn update_deletes_removed_and_creates_added() {
        let mut server = Server::new_async().await;
        let delete = server
            .mock("POST", "/networking/v1/external/policies/delete")
            .match_body(Matcher::Json(serde_json::json!({
                "policies": [wire(APP_A, APP_B, 8080, 8080)]
            })))
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;
        let create = server
            .mock("POST", "/networking/v1/external/policies")
            .match_body(Matcher::Json(serde_json::json!({
                "policies": [wire(APP_A, APP_C, 9000, 9010)]
            })))
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;

        let mut resource = NetworkPolicyResource::new();
        resource
            .configure(
                Context::new(),
                ConfigureResourceRequest {
                    provider_data: provider_data(&server.url()),
                },
            )
            .await;
        let response = resource
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: "cloudfoundry_network_policy".to_string(),
                    prior_state: value(serde_json::json!({
                        "id": "policy-set",
                        "policies": [policy_json(APP_A, APP_B, "8080"), policy_json(APP_B, APP_C, "443")]
                    })),
                    planned_state: value(serde_json::json!({
                        "id": "policy-set",
                        "policies": [policy_json(APP_B, APP_C, "443"), policy_json(APP_A, APP_C, "9000-9010")]
                    })),
                    config: DynamicValue::null(),
                    planned_private: vec![],
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.new_state.value.to_json();
        assert_eq!(state["id"], "policy-set");
        assert_eq!(state["policies"].as_array().unwrap().len(), 2);
        delete.assert_async().await;
        create.assert_async().await;
    }

    #[tokio::test]
    async fn failed_delete_keeps_created_policies_in_state() {
        let mut server = Server::new_async().await;
        let delete = server
            .mock("POST", "/networking/v1/external/policies/delete")
            .with_status(500)
            .with_body(r#"{"error":"policy server unavailable"}"#)
            .expect(1)
            .create_async()
            .await;
        let create = server
            .mock("POST", "/networking/v1/external/policies")
            .match_body(Matcher::Json(serde_json::json!({
                "policies": [wire(APP_A, APP_C, 8080, 8080)]
            })))
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;
        let list = server
            .mock("GET", "/networking/v1/external/policies")
            .match_query(Matcher::UrlEncoded("id".into(), APP_A.into()))
            .with_body(
                serde_json::json!({
                    "total_policies": 2,
                    "policies": [wire(APP_A, APP_B, 8080, 8080), wire(APP_A, APP_C, 8080, 8080)]
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let mut resource = NetworkPolicyResource::new();
        resource
            .configure(
                Context::new(),
                ConfigureResourceRequest {
                    provider_data: provider_data(&server.url()),
                },
            )
            .await;
        let response = resource
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: "cloudfoundry_network_policy".to_string(),
                    prior_state: value(serde_json::json!({
                        "id": "policy-set",
                        "policies": [policy_json(APP_A, APP_B, "8080")]
                    })),
                    planned_state: value(serde_json::json!({
                        "id": "policy-set",
                        "policies": [policy_json(APP_A, APP_C, "8080")]
                    })),
                    config: DynamicValue::null(),
                    planned_private: vec![],
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].summary.contains("Deleting Network Policy"));
        let state = response.new_state.value.to_json();
        assert_eq!(state["id"], "policy-set");
        assert_eq!(
            state["policies"],
            serde_json::json!([policy_json(APP_A, APP_B, "8080"), policy_json(APP_A, APP_C, "8080")])
        );
        delete.assert_async().await;
        create.assert_async().await;
        list.assert_async().await;
    }

    #[tokio::test]
    async fn create_without_protocol_stores_tcp() {
        let mut server = Server::new_async().await;
        let create = server
            .mock("POST", "/networking/v1/external/policies")
            .match_body(Matcher::Json(serde_json::json!({
                "policies": [wire(APP_A, APP_B, 8080, 8080)]
            })))
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;

        let mut resource = NetworkPolicyResource::new();
        resource
            .configure(
                Context::new(),
                ConfigureResourceRequest {
                    provider_data: provider_data(&server.url()),
                },
            )
            .await;
        let mut policy = policy_json(APP_A, APP_B, "8080");
        policy["protocol"] = serde_json::Value::Null;
        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "cloudfoundry_network_policy".to_string(),
                    planned_state: value(serde_json::json!({"id": null, "policies": [policy]})),
                    config: DynamicValue::null(),
                    planned_private: vec![],
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(
            response.new_state.value.to_json()["policies"],
            serde_json::json!([policy_json(APP_A, APP_B, "8080")])
        );
        create.assert_async().await;
    }

    #[tokio::test]
    async fn read_drops_policies_missing_upstream() {
        let mut server = Server::new_async().await;
        let list = server
            .mock("GET", "/networking/v1/external/policies")
            .match_query(Matcher::UrlEncoded("id".into(), APP_A.into()))
            .with_body(
                serde_json::json!({
                    "total_policies": 1,
                    "policies": [wire(APP_A, APP_B, 8080, 8080)]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let mut resource = NetworkPolicyResource::new();
        resource
            .configure(
                Context::new(),
                ConfigureResourceRequest {
                    provider_data: provider_data(&server.url()),
                },
            )
            .await;
        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: "cloudfoundry_network_policy".to_string(),
                    current_state: value(serde_json::json!({
                        "id": "policy-set",
                        "policies": [policy_json(APP_A, APP_B, "8080"), policy_json(APP_A, APP_C, "8080")]
                    })),
                    private: vec![],
                    client_capabilities: Default::default(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.new_state.unwrap().value.to_json();
        assert_eq!(state["policies"], serde_json::json!([policy_json(APP_A, APP_B, "8080")]));
        list.assert_async().await;
    }
}
