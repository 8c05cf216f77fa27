//! Terraform data sources
//!
//! Every data source lists objects with the filters from its configuration,
//! applies its own empty-result policy and writes the mapped objects back as
//! state. Filters stay in the state unchanged.

mod data_source_apps;
mod data_source_buildpacks;
mod data_source_domains;
mod data_source_isolation_segments;
mod data_source_mtas;
mod data_source_org;
mod data_source_roles;
mod data_source_security_groups;
mod data_source_service_brokers;
mod data_source_service_instances;
mod data_source_service_plan_visibility;
mod data_source_service_plans;
mod data_source_service_route_bindings;
mod data_source_space;
mod data_source_stacks;

pub use data_source_apps::{AppEntryModel, AppsDataSource, AppsModel};
pub use data_source_buildpacks::{BuildpackEntryModel, BuildpacksDataSource, BuildpacksModel};
pub use data_source_domains::{DomainsDataSource, DomainsModel};
pub use data_source_isolation_segments::{IsolationSegmentsDataSource, IsolationSegmentsModel};
pub use data_source_mtas::{MtaEntryModel, MtasDataSource, MtasModel};
pub use data_source_org::{OrgDataSource, OrgsDataSource, OrgsModel};
pub use data_source_roles::{RoleEntryModel, RolesDataSource, RolesModel};
pub use data_source_security_groups::{SecurityGroupsDataSource, SecurityGroupsModel};
pub use data_source_service_brokers::{
    ServiceBrokerEntryModel, ServiceBrokersDataSource, ServiceBrokersModel,
};
pub use data_source_service_instances::{
    ServiceInstanceEntryModel, ServiceInstancesDataSource, ServiceInstancesModel,
};
pub use data_source_service_plan_visibility::{PlanVisibilityModel, ServicePlanVisibilityDataSource};
pub use data_source_service_plans::{
    BrokerCatalogModel, CostModel, ServicePlanModel, ServicePlansDataSource, ServicePlansModel,
};
pub use data_source_service_route_bindings::{
    RouteBindingEntryModel, ServiceRouteBindingsDataSource, ServiceRouteBindingsModel,
};
pub use data_source_space::{SpaceDataSource, SpaceSummaryModel, SpacesDataSource, SpacesModel};
pub use data_source_stacks::{StackModel, StacksDataSource, StacksModel};

use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, ReadDataSourceResponse,
};
use tfplug::schema::{Attribute, AttributeBuilder, NestedType};
use tfplug::types::{Diagnostic, DynamicValue};

use crate::provider_data::{extract_provider_data, ConfigureTarget};
use crate::CloudFoundryProviderData;

/// Store the provider data handed to a data source
pub(crate) fn configure(
    slot: &mut Option<CloudFoundryProviderData>,
    request: ConfigureDataSourceRequest,
) -> ConfigureDataSourceResponse {
    match extract_provider_data(request.provider_data, ConfigureTarget::DataSource) {
        Ok(data) => {
            *slot = data;
            ConfigureDataSourceResponse {
                diagnostics: vec![],
            }
        }
        Err(diag) => ConfigureDataSourceResponse {
            diagnostics: vec![diag],
        },
    }
}

pub(crate) fn respond(result: Result<DynamicValue, Diagnostic>) -> ReadDataSourceResponse {
    match result {
        Ok(state) => ReadDataSourceResponse {
            state,
            diagnostics: vec![],
        },
        Err(diag) => ReadDataSourceResponse {
            state: DynamicValue::null(),
            diagnostics: vec![diag],
        },
    }
}

/// Diagnostic for a list that came back empty where results are required
pub(crate) fn nothing_found(summary: &str, filters: &[(&str, &Option<String>)]) -> Diagnostic {
    let given: Vec<String> = filters
        .iter()
        .filter_map(|(name, value)| value.as_ref().map(|v| format!("{} {:?}", name, v)))
        .collect();
    let detail = if given.is_empty() {
        "No objects are visible to the current user".to_string()
    } else {
        format!("No objects match {}", given.join(", "))
    };
    Diagnostic::error(summary, detail)
}

/// Read-only list of nested objects holding the results
pub(crate) fn results_attribute(name: &str, description: &str, attributes: Vec<Attribute>) -> Attribute {
    AttributeBuilder::nested(name, NestedType::list(attributes))
        .description(description)
        .computed()
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_found_names_given_filters() {
        let diag = nothing_found(
            "Unable to find any app in list",
            &[("name", &Some("web".to_string())), ("stack", &None)],
        );
        assert_eq!(diag.summary, "Unable to find any app in list");
        assert_eq!(diag.detail, "No objects match name \"web\"");

        let diag = nothing_found("Unable to find any stack in list", &[("name", &None)]);
        assert_eq!(diag.detail, "No objects are visible to the current user");
    }
}
