//! Service plans offered by brokers

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse,
};
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType, NestedType, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};

use crate::api::service_plans::{PlanCost, ServicePlan};
use crate::api::ListOptions;
use crate::common::{self, StringMap};
use crate::provider_data::require_client;
use crate::resources::{maintenance_info_attributes, MaintenanceInfoModel};
use crate::CloudFoundryProviderData;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    pub amount: f64,
    pub currency: String,
    pub unit: String,
}

impl From<&PlanCost> for CostModel {
    fn from(cost: &PlanCost) -> Self {
        Self {
            amount: cost.amount,
            currency: cost.currency.clone(),
            unit: cost.unit.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerCatalogModel {
    pub id: String,
    pub metadata: Option<String>,
    pub maximum_polling_duration: Option<i64>,
    pub plan_updateable: bool,
    pub bindable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicePlanModel {
    pub id: String,
    pub name: String,
    pub description: String,
    pub visibility_type: String,
    pub available: bool,
    pub free: bool,
    pub costs: Option<Vec<CostModel>>,
    pub maintenance_info: Option<MaintenanceInfoModel>,
    pub broker_catalog: BrokerCatalogModel,
    pub schemas: Option<String>,
    pub service_offering: Option<String>,
    pub labels: Option<StringMap>,
    pub annotations: Option<StringMap>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&ServicePlan> for ServicePlanModel {
    fn from(plan: &ServicePlan) -> Self {
        let catalog = &plan.broker_catalog;
        Self {
            id: plan.guid.clone(),
            name: plan.name.clone(),
            description: plan.description.clone(),
            visibility_type: plan.visibility_type.clone(),
            available: plan.available,
            free: plan.free,
            costs: (!plan.costs.is_empty()).then(|| plan.costs.iter().map(CostModel::from).collect()),
            maintenance_info: plan.maintenance_info.as_ref().map(MaintenanceInfoModel::from),
            broker_catalog: BrokerCatalogModel {
                id: catalog.id.clone(),
                metadata: common::json_string(&catalog.metadata),
                maximum_polling_duration: catalog.maximum_polling_duration,
                plan_updateable: catalog.features.plan_updateable,
                bindable: catalog.features.bindable,
            },
            schemas: common::json_string(&Some(plan.schemas.clone())),
            service_offering: plan
                .relationships
                .service_offering
                .guid()
                .map(str::to_string),
            labels: common::labels_from(&plan.metadata),
            annotations: common::annotations_from(&plan.metadata),
            created_at: plan.created_at.clone(),
            updated_at: plan.updated_at.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicePlansModel {
    pub name: Option<String>,
    pub service_offering_name: Option<String>,
    pub service_broker_name: Option<String>,
    pub service_plans: Option<Vec<ServicePlanModel>>,
}

#[derive(Default)]
pub struct ServicePlansDataSource {
    provider_data: Option<CloudFoundryProviderData>,
}

impl ServicePlansDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_plans(&self, request: &ReadDataSourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let mut model: ServicePlansModel = common::decode(&request.config)?;

        let plans = client
            .service_plans()
            .list(
                &ListOptions::new()
                    .add_optional("names", model.name.as_ref())
                    .add_optional("service_offering_names", model.service_offering_name.as_ref())
                    .add_optional("service_broker_names", model.service_broker_name.as_ref()),
            )
            .await
            .map_err(|e| common::api_error("API Error Reading Service Plans", &e))?;

        if plans.is_empty() {
            return Err(super::nothing_found(
                "Unable to find any service plan in list",
                &[
                    ("name", &model.name),
                    ("service_offering_name", &model.service_offering_name),
                    ("service_broker_name", &model.service_broker_name),
                ],
            ));
        }

        model.service_plans = Some(plans.iter().map(ServicePlanModel::from).collect());
        common::encode(&model)
    }
}

fn plan_attributes() -> Vec<Attribute> {
    let mut attributes = vec![
        common::computed_string("id", "The GUID of the service plan"),
        common::computed_string("name", "The name of the service plan"),
        common::computed_string("description", "The description of the service plan"),
        common::computed_string("visibility_type", "Who can see the plan: public, admin, organization or space"),
        common::computed_bool("available", "Whether the plan can be used to create instances"),
        common::computed_bool("free", "Whether the plan is free of charge"),
        AttributeBuilder::nested(
            "costs",
            NestedType::list(vec![
                common::computed_number("amount", "Price of the plan per unit"),
                common::computed_string("currency", "Currency of the amount"),
                common::computed_string("unit", "Billing unit, e.g. MONTHLY"),
            ]),
        )
        .description("The costs of the service plan")
        .computed()
        .build(),
        AttributeBuilder::nested("maintenance_info", NestedType::single(maintenance_info_attributes()))
            .description("Information about the version of this service plan")
            .computed()
            .build(),
        AttributeBuilder::nested(
            "broker_catalog",
            NestedType::single(vec![
                common::computed_string("id", "The identifier the broker gave the plan"),
                common::computed_string("metadata", "Additional broker metadata as a JSON document"),
                common::computed_number(
                    "maximum_polling_duration",
                    "Seconds the platform waits for asynchronous broker operations",
                ),
                common::computed_bool("plan_updateable", "Whether instances can switch to another plan"),
                common::computed_bool("bindable", "Whether instances of the plan can be bound"),
            ]),
        )
        .description("Information from the broker catalog")
        .computed()
        .build(),
        common::computed_string("schemas", "JSON schemas for instance and binding parameters"),
        common::computed_string("service_offering", "The GUID of the service offering"),
    ];
    attributes.extend(common::computed_common_attributes());
    attributes
}

fn optional_filter(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .description(description)
        .optional()
        .build()
}

#[async_trait]
impl DataSource for ServicePlansDataSource {
    fn type_name(&self) -> &str {
        "cloudfoundry_service_plans"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Gets information on the service plans visible to the user.")
            .attribute(optional_filter("name", "The name of the service plan to filter by"))
            .attribute(optional_filter(
                "service_offering_name",
                "The name of the service offering to filter by",
            ))
            .attribute(optional_filter(
                "service_broker_name",
                "The name of the service broker to filter by",
            ))
            .attribute(super::results_attribute(
                "service_plans",
                "The list of service plans",
                plan_attributes(),
            ))
            .build();

        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        super::respond(self.read_plans(&request).await)
    }
}

#[async_trait]
impl DataSourceWithConfigure for ServicePlansDataSource {
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

    #[test]
    fn catalog_and_schemas_are_flattened() {
        let plan: ServicePlan = serde_json::from_value(serde_json::json!({
            "guid": "4e5f6a7b-0000-4000-8000-0000000000b1",
            "name": "small",
            "visibility_type": "public",
            "available": true,
            "free": false,
            "costs": [{"amount": 9.5, "currency": "USD", "unit": "MONTHLY"}],
            "broker_catalog": {
                "id": "small-id",
                "metadata": {"bullets": ["1 GB"]},
                "features": {"plan_updateable": true, "bindable": true}
            },
            "schemas": {"service_instance": {"create": {"parameters": {}}}},
            "created_at": "2024-01-02T03:04:05Z",
            "updated_at": "2024-01-02T03:04:06Z",
            "relationships": {"service_offering": {"data": {"guid": "4e5f6a7b-0000-4000-8000-0000000000f1"}}}
        }))
        .unwrap();

        let model = ServicePlanModel::from(&plan);
        assert_eq!(model.broker_catalog.metadata.as_deref(), Some(r#"{"bullets":["1 GB"]}"#));
        assert!(model.broker_catalog.bindable);
        assert_eq!(
            model.schemas.as_deref(),
            Some(r#"{"service_instance":{"create":{"parameters":{}}}}"#)
        );
        assert_eq!(model.costs.unwrap()[0].amount, 9.5);
        assert_eq!(
            model.service_offering.as_deref(),
            Some("4e5f6a7b-0000-4000-8000-0000000000f1")
        );
        assert!(model.maintenance_info.is_none());
    }
}
