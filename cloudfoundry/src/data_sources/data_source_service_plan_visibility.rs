//! Visibility of a single service plan

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse,
};
use tfplug::schema::SchemaBuilder;
use tfplug::types::{Diagnostic, DynamicValue};

use crate::common;
use crate::provider_data::require_client;
use crate::resources::ServicePlanVisibilityModel;
use crate::CloudFoundryProviderData;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanVisibilityModel {
    pub service_plan: String,
    #[serde(rename = "type")]
    pub visibility_type: Option<String>,
    pub organizations: Option<Vec<String>>,
}

impl From<ServicePlanVisibilityModel> for PlanVisibilityModel {
    fn from(model: ServicePlanVisibilityModel) -> Self {
        Self {
            service_plan: model.service_plan,
            visibility_type: Some(model.visibility_type),
            organizations: model.organizations,
        }
    }
}

#[derive(Default)]
pub struct ServicePlanVisibilityDataSource {
    provider_data: Option<CloudFoundryProviderData>,
}

impl ServicePlanVisibilityDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_visibility(&self, request: &ReadDataSourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let model: PlanVisibilityModel = common::decode(&request.config)?;

        let visibility = client
            .service_plans()
            .visibility(&model.service_plan)
            .await
            .map_err(|e| common::api_error("API Error Reading Service Plan Visibility", &e))?;

        let state: PlanVisibilityModel =
            ServicePlanVisibilityModel::from_visibility(&model.service_plan, &visibility).into();
        common::encode(&state)
    }
}

#[async_trait]
impl DataSource for ServicePlanVisibilityDataSource {
    fn type_name(&self) -> &str {
        "cloudfoundry_service_plan_visibility"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Gets the visibility of a service plan.")
            .attribute(common::guid_filter("service_plan", "The GUID of the service plan"))
            .attribute(common::computed_string(
                "type",
                "Who can see the plan: public, admin, organization or space",
            ))
            .attribute(common::computed_string_list(
                "organizations",
                "GUIDs of the organizations the plan is visible in",
            ))
            .build();

        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        super::respond(self.read_visibility(&request).await)
    }
}

#[async_trait]
impl DataSourceWithConfigure for ServicePlanVisibilityDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        super::configure(&mut self.provider_data, request)
    }
}
