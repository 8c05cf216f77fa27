//! Cloud Foundry v3 API client

pub mod apps;
pub mod auth;
pub mod buildpacks;
pub mod client;
pub mod common;
pub mod domains;
pub mod error;
pub mod isolation_segments;
pub mod jobs;
pub mod mtas;
pub mod network_policies;
pub mod organizations;
pub mod roles;
pub mod security_groups;
pub mod service_brokers;
pub mod service_instances;
pub mod service_plans;
pub mod service_route_bindings;
pub mod spaces;
pub mod stacks;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use auth::Credentials;
pub use client::{AsyncResponse, Client, ClientConfig};
pub use common::{ListOptions, Metadata, MetadataRequest, ToManyRelationship, ToOneRelationship};
pub use error::ApiError;

impl Client {
    pub fn organizations(&self) -> organizations::OrganizationsApi<'_> {
        organizations::OrganizationsApi::new(self)
    }

    pub fn spaces(&self) -> spaces::SpacesApi<'_> {
        spaces::SpacesApi::new(self)
    }

    pub fn apps(&self) -> apps::AppsApi<'_> {
        apps::AppsApi::new(self)
    }

    pub fn domains(&self) -> domains::DomainsApi<'_> {
        domains::DomainsApi::new(self)
    }

    pub fn buildpacks(&self) -> buildpacks::BuildpacksApi<'_> {
        buildpacks::BuildpacksApi::new(self)
    }

    pub fn stacks(&self) -> stacks::StacksApi<'_> {
        stacks::StacksApi::new(self)
    }

    pub fn roles(&self) -> roles::RolesApi<'_> {
        roles::RolesApi::new(self)
    }

    pub fn security_groups(&self) -> security_groups::SecurityGroupsApi<'_> {
        security_groups::SecurityGroupsApi::new(self)
    }

    pub fn service_instances(&self) -> service_instances::ServiceInstancesApi<'_> {
        service_instances::ServiceInstancesApi::new(self)
    }

    pub fn service_plans(&self) -> service_plans::ServicePlansApi<'_> {
        service_plans::ServicePlansApi::new(self)
    }

    pub fn service_brokers(&self) -> service_brokers::ServiceBrokersApi<'_> {
        service_brokers::ServiceBrokersApi::new(self)
    }

    pub fn service_route_bindings(&self) -> service_route_bindings::ServiceRouteBindingsApi<'_> {
        service_route_bindings::ServiceRouteBindingsApi::new(self)
    }

    pub fn isolation_segments(&self) -> isolation_segments::IsolationSegmentsApi<'_> {
        isolation_segments::IsolationSegmentsApi::new(self)
    }

    pub fn network_policies(&self) -> network_policies::NetworkPoliciesApi<'_> {
        network_policies::NetworkPoliciesApi::new(self)
    }

    /// MultiApps controller API. `deploy_url` overrides the URL derived from
    /// the CF API URL.
    pub fn mtas(&self, deploy_url: Option<&str>) -> mtas::MtasApi<'_> {
        mtas::MtasApi::new(self, deploy_url)
    }
}
