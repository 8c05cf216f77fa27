//! Applications of a space

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

use crate::api::apps::App;
use crate::api::ListOptions;
use crate::common::{self, StringMap};
use crate::provider_data::require_client;
use crate::CloudFoundryProviderData;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppEntryModel {
    pub id: String,
    pub name: String,
    pub space: Option<String>,
    pub lifecycle: String,
    pub buildpacks: Option<Vec<String>>,
    pub stack: Option<String>,
    pub state: String,
    pub labels: Option<StringMap>,
    pub annotations: Option<StringMap>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&App> for AppEntryModel {
    fn from(app: &App) -> Self {
        let data = &app.lifecycle.data;
        Self {
            id: app.guid.clone(),
            name: app.name.clone(),
            space: app.relationships.space.guid().map(str::to_string),
            lifecycle: app.lifecycle.lifecycle_type.clone(),
            buildpacks: (!data.buildpacks.is_empty()).then(|| data.buildpacks.clone()),
            stack: data.stack.clone(),
            state: app.state.clone(),
            labels: common::labels_from(&app.metadata),
            annotations: common::annotations_from(&app.metadata),
            created_at: app.created_at.clone(),
            updated_at: app.updated_at.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppsModel {
    pub space: String,
    pub name: Option<String>,
    pub apps: Option<Vec<AppEntryModel>>,
}

#[derive(Default)]
pub struct AppsDataSource {
    provider_data: Option<CloudFoundryProviderData>,
}

impl AppsDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_apps(&self, request: &ReadDataSourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let mut model: AppsModel = common::decode(&request.config)?;

        let apps = client
            .apps()
            .list(
                &ListOptions::new()
                    .add("space_guids", &model.space)
                    .add_optional("names", model.name.as_ref()),
            )
            .await
            .map_err(|e| common::api_error("API Error Reading Apps", &e))?;

        if apps.is_empty() {
            return Err(super::nothing_found(
                "Unable to find any app in list",
                &[("name", &model.name)],
            ));
        }

        model.apps = Some(apps.iter().map(AppEntryModel::from).collect());
        common::encode(&model)
    }
}

#[async_trait]
impl DataSource for AppsDataSource {
    fn type_name(&self) -> &str {
        "cloudfoundry_apps"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let mut attributes = vec![
            common::computed_string("id", "The GUID of the app"),
            common::computed_string("name", "The name of the app"),
            common::computed_string("space", "The GUID of the space"),
            common::computed_string("lifecycle", "The lifecycle type, buildpack or docker"),
            common::computed_string_list("buildpacks", "The buildpacks used to stage the app"),
            common::computed_string("stack", "The stack the app runs on"),
            common::computed_string("state", "The desired state of the app, STARTED or STOPPED"),
        ];
        attributes.extend(common::computed_common_attributes());

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Gets information on the applications of a space.")
            .attribute(common::guid_filter("space", "The GUID of the space"))
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the app to filter by")
                    .optional()
                    .build(),
            )
            .attribute(super::results_attribute("apps", "The list of apps", attributes))
            .build();

        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        super::respond(self.read_apps(&request).await)
    }
}

#[async_trait]
impl DataSourceWithConfigure for AppsDataSource {
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
    use crate::test_support::{
        configured_data_source, page_json, read_request, resource_json, SPACE_GUID,
    };
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn apps_are_mapped() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v3/apps")
            .match_query(Matcher::UrlEncoded("space_guids".into(), SPACE_GUID.into()))
            .with_body(page_json(&[resource_json(
                "0a1b2c3d-0000-4000-8000-0000000000a1",
                serde_json::json!({
                    "name": "web",
                    "state": "STARTED",
                    "lifecycle": {"type": "buildpack", "data": {"buildpacks": ["go_buildpack"], "stack": "cflinuxfs4"}},
                    "relationships": {"space": {"data": {"guid": SPACE_GUID}}}
                }),
            )]))
            .create_async()
            .await;

        let data_source = configured_data_source(AppsDataSource::new(), &server.url()).await;
        let response = data_source
            .read(Context::new(), read_request("cloudfoundry_apps", serde_json::json!({"space": SPACE_GUID})))
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let apps = response.state.value.to_json()["apps"].clone();
        assert_eq!(apps[0]["name"], "web");
        assert_eq!(apps[0]["buildpacks"], serde_json::json!(["go_buildpack"]));
        assert_eq!(apps[0]["space"], SPACE_GUID);
        mock.assert_async().await;
    }
}
