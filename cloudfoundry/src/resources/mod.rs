//! Terraform resources

mod resource_app;
mod resource_buildpack;
mod resource_domain;
mod resource_isolation_segment;
mod resource_isolation_segment_entitlement;
mod resource_mta;
mod resource_network_policy;
mod resource_org;
mod resource_role;
mod resource_security_group;
mod resource_security_group_space_bindings;
mod resource_service_broker;
mod resource_service_instance;
mod resource_service_plan_visibility;
mod resource_service_route_binding;
mod resource_space;

pub use resource_app::{AppModel, AppResource};
pub use resource_buildpack::{BuildpackModel, BuildpackResource};
pub use resource_domain::{DomainModel, DomainResource};
pub use resource_isolation_segment::{IsolationSegmentModel, IsolationSegmentResource};
pub use resource_isolation_segment_entitlement::{
    IsolationSegmentEntitlementModel, IsolationSegmentEntitlementResource,
};
pub use resource_mta::{
    metadata_attributes as mta_metadata_attributes, module_attributes as mta_module_attributes,
    MtaMetadataModel, MtaModel, MtaModuleModel, MtaResource,
};
pub use resource_network_policy::{NetworkPolicyModel, NetworkPolicyResource, PolicyModel};
pub use resource_org::{OrgModel, OrgResource};
pub use resource_role::{RoleModel, RoleResource, RoleScope};
pub use resource_security_group::{SecurityGroupModel, SecurityGroupResource, SecurityGroupRuleModel};
pub use resource_security_group_space_bindings::{
    SecurityGroupSpaceBindingsModel, SecurityGroupSpaceBindingsResource,
};
pub use resource_service_broker::{ServiceBrokerModel, ServiceBrokerResource};
pub use resource_service_instance::{
    last_operation_attributes, maintenance_info_attributes, LastOperationModel,
    MaintenanceInfoModel, ServiceInstanceModel, ServiceInstanceResource,
};
pub use resource_service_plan_visibility::{
    ServicePlanVisibilityModel, ServicePlanVisibilityResource,
};
pub use resource_service_route_binding::{ServiceRouteBindingModel, ServiceRouteBindingResource};
pub use resource_space::{fetch_space, SpaceModel, SpaceResource};
