//! Shared fixtures for resource and data source tests

use std::any::Any;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, DataSourceWithConfigure, ReadDataSourceRequest,
};
use tfplug::types::DynamicValue;

use crate::api::test_helpers::create_test_client;
use crate::CloudFoundryProviderData;

pub const ORG_GUID: &str = "1a2b3c4d-0000-4000-8000-000000000001";
pub const SPACE_GUID: &str = "1a2b3c4d-0000-4000-8000-000000000002";

pub fn provider_data(url: &str) -> Option<Arc<dyn Any + Send + Sync>> {
    Some(Arc::new(CloudFoundryProviderData::new(create_test_client(url))))
}

pub fn value(json: serde_json::Value) -> DynamicValue {
    DynamicValue::new(json.into())
}

/// Timestamps and metadata shared by most fixtures
pub fn resource_json(guid: &str, extra: serde_json::Value) -> String {
    let mut body = serde_json::json!({
        "guid": guid,
        "created_at": "2024-01-02T03:04:05Z",
        "updated_at": "2024-01-02T03:04:06Z",
        "metadata": {"labels": {}, "annotations": {}}
    });
    if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            body.insert(k.clone(), v.clone());
        }
    }
    body.to_string()
}

pub fn page_json(resources: &[String]) -> String {
    format!(
        r#"{{"pagination":{{"total_results":{},"total_pages":1,"next":null}},"resources":[{}]}}"#,
        resources.len(),
        resources.join(",")
    )
}

pub async fn configured_data_source<T: DataSourceWithConfigure>(mut data_source: T, url: &str) -> T {
    data_source
        .configure(
            Context::new(),
            ConfigureDataSourceRequest {
                provider_data: provider_data(url),
            },
        )
        .await;
    data_source
}

pub fn read_request(type_name: &str, config: serde_json::Value) -> ReadDataSourceRequest {
    ReadDataSourceRequest {
        type_name: type_name.to_string(),
        config: value(config),
        client_capabilities: Default::default(),
    }
}
