//! Isolation segments

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

use crate::api::ListOptions;
use crate::common;
use crate::provider_data::require_client;
use crate::resources::IsolationSegmentModel;
use crate::CloudFoundryProviderData;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationSegmentsModel {
    pub name: Option<String>,
    pub isolation_segments: Option<Vec<IsolationSegmentModel>>,
}

#[derive(Default)]
pub struct IsolationSegmentsDataSource {
    provider_data: Option<CloudFoundryProviderData>,
}

impl IsolationSegmentsDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_segments(&self, request: &ReadDataSourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let mut model: IsolationSegmentsModel = common::decode(&request.config)?;

        let segments = client
            .isolation_segments()
            .list(&ListOptions::new().add_optional("names", model.name.as_ref()))
            .await
            .map_err(|e| common::api_error("API Error Reading Isolation Segments", &e))?;

        if segments.is_empty() {
            return Err(super::nothing_found(
                "Unable to find any isolation segment in list",
                &[("name", &model.name)],
            ));
        }

        model.isolation_segments = Some(segments.iter().map(IsolationSegmentModel::from).collect());
        common::encode(&model)
    }
}

#[async_trait]
impl DataSource for IsolationSegmentsDataSource {
    fn type_name(&self) -> &str {
        "cloudfoundry_isolation_segments"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let mut attributes = vec![
            common::computed_string("id", "The GUID of the isolation segment"),
            common::computed_string("name", "The name of the isolation segment"),
        ];
        attributes.extend(common::computed_common_attributes());

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Gets information on the isolation segments visible to the user.")
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the isolation segment to filter by")
                    .optional()
                    .build(),
            )
            .attribute(super::results_attribute(
                "isolation_segments",
                "The list of isolation segments",
                attributes,
            ))
            .build();

        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        super::respond(self.read_segments(&request).await)
    }
}

#[async_trait]
impl DataSourceWithConfigure for IsolationSegmentsDataSource {
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
    use crate::test_support::{configured_data_source, page_json, read_request};
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn no_match_is_an_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v3/isolation_segments")
            .match_query(Matcher::UrlEncoded("names".into(), "dmz".into()))
            .with_body(page_json(&[]))
            .create_async()
            .await;

        let data_source = configured_data_source(IsolationSegmentsDataSource::new(), &server.url()).await;
        let response = data_source
            .read(
                Context::new(),
                read_request("cloudfoundry_isolation_segments", serde_json::json!({"name": "dmz"})),
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(
            response.diagnostics[0].summary,
            "Unable to find any isolation segment in list"
        );
    }
}
