//! End-to-end tests driving resources and data sources through the provider

use std::any::Any;
use std::sync::Arc;

use cloudfoundry::{CloudFoundryProvider, ACCESS_TOKEN_ENV, API_URL_ENV};
use mockito::{Matcher, Server};
use serial_test::serial;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, DataSourceSchemaRequest, DataSourceWithConfigure,
    ReadDataSourceRequest,
};
use tfplug::grpc::ProviderService;
use tfplug::proto;
use tfplug::proto::provider_server::Provider as _;
use tfplug::provider::{ConfigureProviderRequest, Provider};
use tfplug::resource::{
    ConfigureResourceRequest, CreateResourceRequest, ReadResourceRequest, ResourceSchemaRequest,
    ResourceWithConfigure, UpdateResourceRequest,
};
use tfplug::types::{ClientCapabilities, DynamicValue};

const ORG: &str = "0b1c2d3e-0000-4000-8000-000000000001";
const SPACE_A: &str = "0b1c2d3e-0000-4000-8000-00000000000a";
const SPACE_B: &str = "0b1c2d3e-0000-4000-8000-00000000000b";
const SPACE_C: &str = "0b1c2d3e-0000-4000-8000-00000000000c";
const GROUP: &str = "0b1c2d3e-0000-4000-8000-0000000000f1";

fn value(json: serde_json::Value) -> DynamicValue {
    DynamicValue::new(json.into())
}

fn page(resources: Vec<serde_json::Value>) -> String {
    serde_json::json!({
        "pagination": {"total_results": resources.len(), "total_pages": 1, "next": null},
        "resources": resources
    })
    .to_string()
}

async fn configure_provider(url: &str) -> Option<Arc<dyn Any + Send + Sync>> {
    std::env::remove_var(API_URL_ENV);
    std::env::remove_var(ACCESS_TOKEN_ENV);

    let mut provider = CloudFoundryProvider::new();
    let response = provider
        .configure(
            Context::new(),
            ConfigureProviderRequest {
                terraform_version: "1.9.0".to_string(),
                config: value(serde_json::json!({"api_url": url, "access_token": "test-token"})),
                client_capabilities: ClientCapabilities::default(),
            },
        )
        .await;
    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    response.provider_data
}

async fn data_source(url: &str, type_name: &str) -> Box<dyn DataSourceWithConfigure> {
    let provider_data = configure_provider(url).await;
    let factories = CloudFoundryProvider::new().data_sources();
    let mut data_source = factories[type_name]();
    let response = data_source
        .configure(Context::new(), ConfigureDataSourceRequest { provider_data })
        .await;
    assert!(response.diagnostics.is_empty());
    data_source
}

async fn resource(url: &str, type_name: &str) -> Box<dyn ResourceWithConfigure> {
    let provider_data = configure_provider(url).await;
    let factories = CloudFoundryProvider::new().resources();
    let mut resource = factories[type_name]();
    let response = resource
        .configure(Context::new(), ConfigureResourceRequest { provider_data })
        .await;
    assert!(response.diagnostics.is_empty());
    resource
}

fn read_request(type_name: &str, config: serde_json::Value) -> ReadDataSourceRequest {
    ReadDataSourceRequest {
        type_name: type_name.to_string(),
        config: value(config),
        client_capabilities: ClientCapabilities::default(),
    }
}

fn org_role(guid: &str, role_type: &str) -> serde_json::Value {
    serde_json::json!({
        "guid": guid,
        "type": role_type,
        "created_at": "2024-01-02T03:04:05Z",
        "updated_at": "2024-01-02T03:04:05Z",
        "relationships": {
            "user": {"data": {"guid": format!("user-{}", guid)}},
            "organization": {"data": {"guid": ORG}},
            "space": {"data": null}
        }
    })
}

#[tokio::test]
#[serial]
async fn org_roles_filtered_by_type_return_subset() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/v3/roles")
        .match_query(Matcher::UrlEncoded("organization_guids".into(), ORG.into()))
        .with_body(page(vec![
            org_role("r1", "organization_user"),
            org_role("r2", "organization_manager"),
            org_role("r3", "organization_auditor"),
            org_role("r4", "organization_manager"),
            org_role("r5", "organization_billing_manager"),
        ]))
        .create_async()
        .await;

    let data_source = data_source(&server.url(), "cloudfoundry_org_roles").await;
    let response = data_source
        .read(
            Context::new(),
            read_request(
                "cloudfoundry_org_roles",
                serde_json::json!({"org": ORG, "type": "organization_manager"}),
            ),
        )
        .await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    let state = response.state.value.to_json();
    let ids: Vec<&str> = state["roles"]
        .as_array()
        .unwrap()
        .iter()
        .map(|role| role["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["r2", "r4"]);
    assert_eq!(state["org"], ORG);
    mock.assert_async().await;
}

#[tokio::test]
#[serial]
async fn invalid_guid_is_rejected_before_any_request() {
    let mut server = Server::new_async().await;
    let mock = server.mock("GET", Matcher::Any).expect(0).create_async().await;

    let data_source = data_source(&server.url(), "cloudfoundry_org_roles").await;
    let schema = data_source
        .schema(Context::new(), DataSourceSchemaRequest)
        .await
        .schema;
    let diagnostics = schema.validate_config(&value(serde_json::json!({"org": "not-a-guid"})));

    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].summary, "Invalid Attribute Value");
    mock.assert_async().await;
}

#[tokio::test]
#[serial]
async fn apps_without_match_report_the_filter() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/v3/apps")
        .match_query(Matcher::UrlEncoded("names".into(), "web".into()))
        .with_body(page(vec![]))
        .create_async()
        .await;

    let data_source = data_source(&server.url(), "cloudfoundry_apps").await;
    let response = data_source
        .read(
            Context::new(),
            read_request("cloudfoundry_apps", serde_json::json!({"space": SPACE_A, "name": "web"})),
        )
        .await;

    assert_eq!(response.diagnostics.len(), 1);
    assert_eq!(response.diagnostics[0].summary, "Unable to find any app in list");
    assert!(response.diagnostics[0].detail.contains("web"));
    assert!(response.state.value.is_null());
}

#[tokio::test]
#[serial]
async fn domains_of_org_without_domains_is_an_error() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", format!("/v3/organizations/{}/domains", ORG).as_str())
        .match_query(Matcher::Any)
        .with_body(page(vec![]))
        .create_async()
        .await;

    let data_source = data_source(&server.url(), "cloudfoundry_domains").await;
    let response = data_source
        .read(Context::new(), read_request("cloudfoundry_domains", serde_json::json!({"org": ORG})))
        .await;

    assert_eq!(response.diagnostics.len(), 1);
    assert_eq!(
        response.diagnostics[0].summary,
        "Unable to find any domain in the list"
    );
}

fn group_body(running: &[&str]) -> String {
    let spaces: Vec<serde_json::Value> = running
        .iter()
        .map(|guid| serde_json::json!({"guid": guid}))
        .collect();
    serde_json::json!({
        "guid": GROUP,
        "name": "public-networks",
        "globally_enabled": {"running": false, "staging": false},
        "rules": [],
        "created_at": "2024-01-02T03:04:05Z",
        "updated_at": "2024-01-02T03:04:05Z",
        "relationships": {
            "running_spaces": {"data": spaces},
            "staging_spaces": {"data": []}
        }
    })
    .to_string()
}

#[tokio::test]
#[serial]
async fn space_bindings_update_applies_only_the_difference() {
    let mut server = Server::new_async().await;
    let unbind_a = server
        .mock(
            "DELETE",
            format!("/v3/security_groups/{}/relationships/running_spaces/{}", GROUP, SPACE_A).as_str(),
        )
        .with_status(204)
        .expect(1)
        .create_async()
        .await;
    let unbind_b = server
        .mock(
            "DELETE",
            format!("/v3/security_groups/{}/relationships/running_spaces/{}", GROUP, SPACE_B).as_str(),
        )
        .expect(0)
        .create_async()
        .await;
    let bind_c = server
        .mock(
            "POST",
            format!("/v3/security_groups/{}/relationships/running_spaces", GROUP).as_str(),
        )
        .match_body(Matcher::Json(serde_json::json!({"data": [{"guid": SPACE_C}]})))
        .with_body(serde_json::json!({"data": [{"guid": SPACE_B}, {"guid": SPACE_C}]}).to_string())
        .expect(1)
        .create_async()
        .await;
    let _get = server
        .mock("GET", format!("/v3/security_groups/{}", GROUP).as_str())
        .with_body(group_body(&[SPACE_B, SPACE_C]))
        .create_async()
        .await;

    let resource = resource(&server.url(), "cloudfoundry_security_group_space_bindings").await;
    let prior = serde_json::json!({
        "id": GROUP,
        "security_group": GROUP,
        "running_spaces": [SPACE_A, SPACE_B],
        "staging_spaces": null
    });
    let planned = serde_json::json!({
        "id": GROUP,
        "security_group": GROUP,
        "running_spaces": [SPACE_B, SPACE_C],
        "staging_spaces": null
    });
    let response = resource
        .update(
            Context::new(),
            UpdateResourceRequest {
                type_name: "cloudfoundry_security_group_space_bindings".to_string(),
                prior_state: value(prior),
                planned_state: value(planned.clone()),
                config: value(planned.clone()),
                planned_private: vec![],
            },
        )
        .await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    assert_eq!(response.new_state.value.to_json(), planned);
    unbind_a.assert_async().await;
    unbind_b.assert_async().await;
    bind_c.assert_async().await;
}

#[tokio::test]
#[serial]
async fn created_org_reads_back_identically() {
    let mut server = Server::new_async().await;
    let body = serde_json::json!({
        "guid": ORG,
        "name": "acme",
        "suspended": false,
        "created_at": "2024-01-02T03:04:05Z",
        "updated_at": "2024-01-02T03:04:06Z",
        "relationships": {"quota": {"data": {"guid": "0b1c2d3e-0000-4000-8000-0000000000d1"}}},
        "metadata": {"labels": {"team": "payments"}, "annotations": {}}
    })
    .to_string();
    let _create = server
        .mock("POST", "/v3/organizations")
        .with_status(201)
        .with_body(&body)
        .create_async()
        .await;
    let _get = server
        .mock("GET", format!("/v3/organizations/{}", ORG).as_str())
        .with_body(&body)
        .create_async()
        .await;

    let resource = resource(&server.url(), "cloudfoundry_org").await;
    let schema = resource
        .schema(Context::new(), ResourceSchemaRequest)
        .await
        .schema;
    let planned = serde_json::json!({
        "id": null,
        "name": "acme",
        "suspended": null,
        "quota": null,
        "labels": {"team": "payments"},
        "annotations": null,
        "created_at": null,
        "updated_at": null
    });
    assert!(schema.validate_config(&value(serde_json::json!({
        "name": "acme",
        "labels": {"team": "payments"}
    })))
    .is_empty());

    let created = resource
        .create(
            Context::new(),
            CreateResourceRequest {
                type_name: "cloudfoundry_org".to_string(),
                planned_state: value(planned.clone()),
                config: value(planned),
                planned_private: vec![],
            },
        )
        .await;
    assert!(created.diagnostics.is_empty(), "{:?}", created.diagnostics);

    let read = resource
        .read(
            Context::new(),
            ReadResourceRequest {
                type_name: "cloudfoundry_org".to_string(),
                current_state: created.new_state.clone(),
                private: vec![],
                client_capabilities: ClientCapabilities::default(),
            },
        )
        .await;
    assert!(read.diagnostics.is_empty(), "{:?}", read.diagnostics);

    let created = created.new_state.value.to_json();
    assert_eq!(created["id"], ORG);
    assert_eq!(created["quota"], "0b1c2d3e-0000-4000-8000-0000000000d1");
    assert_eq!(read.new_state.unwrap().value.to_json(), created);
}

const APP_A: &str = "0b1c2d3e-0000-4000-8000-0000000000a1";
const APP_B: &str = "0b1c2d3e-0000-4000-8000-0000000000a2";

fn wire(json: serde_json::Value) -> Option<proto::DynamicValue> {
    Some(proto::DynamicValue {
        msgpack: value(json).encode_msgpack().unwrap(),
        json: vec![],
    })
}

fn unwire(dynamic: Option<proto::DynamicValue>) -> serde_json::Value {
    DynamicValue::decode_msgpack(&dynamic.unwrap().msgpack)
        .unwrap()
        .value
        .to_json()
}

#[tokio::test]
#[serial]
async fn network_policy_without_protocol_applies_as_planned() {
    std::env::remove_var(API_URL_ENV);
    std::env::remove_var(ACCESS_TOKEN_ENV);
    let mut server = Server::new_async().await;
    let create = server
        .mock("POST", "/networking/v1/external/policies")
        .match_body(Matcher::Json(serde_json::json!({
            "policies": [{
                "source": {"id": APP_A},
                "destination": {"id": APP_B, "protocol": "tcp", "ports": {"start": 8080, "end": 8080}}
            }]
        })))
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;

    let service = ProviderService::new(CloudFoundryProvider::new());
    let configured = service
        .configure_provider(tonic::Request::new(proto::configure_provider::Request {
            terraform_version: "1.9.0".to_string(),
            config: wire(serde_json::json!({"api_url": server.url(), "access_token": "test-token"})),
            client_capabilities: None,
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(configured.diagnostics.is_empty(), "{:?}", configured.diagnostics);

    let config = serde_json::json!({
        "id": null,
        "policies": [{"source_app": APP_A, "destination_app": APP_B, "port": "8080", "protocol": null}]
    });
    let plan = service
        .plan_resource_change(tonic::Request::new(proto::plan_resource_change::Request {
            type_name: "cloudfoundry_network_policy".to_string(),
            prior_state: None,
            proposed_new_state: wire(config.clone()),
            config: wire(config.clone()),
            prior_private: vec![],
            provider_meta: None,
            client_capabilities: None,
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(plan.diagnostics.is_empty(), "{:?}", plan.diagnostics);
    let planned = plan.planned_state.clone();
    assert_eq!(unwire(planned.clone())["policies"][0]["protocol"], "tcp");

    let applied = service
        .apply_resource_change(tonic::Request::new(proto::apply_resource_change::Request {
            type_name: "cloudfoundry_network_policy".to_string(),
            prior_state: None,
            planned_state: planned.clone(),
            config: wire(config),
            planned_private: vec![],
            provider_meta: None,
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(applied.diagnostics.is_empty(), "{:?}", applied.diagnostics);

    assert_eq!(
        unwire(applied.new_state)["policies"],
        unwire(planned)["policies"]
    );
    create.assert_async().await;
}
