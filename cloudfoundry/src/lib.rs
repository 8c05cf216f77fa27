pub mod api;
pub mod common;
pub mod data_sources;
pub mod diff;
pub mod provider_data;
pub mod resources;

#[cfg(test)]
mod test_support;

pub use provider_data::CloudFoundryProviderData;

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::data_source::DataSourceWithConfigure;
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, Provider,
    ProviderSchemaRequest, ProviderSchemaResponse, ResourceFactory,
};
use tfplug::resource::ResourceWithConfigure;
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::Diagnostic;
use url::Url;

use api::{ClientConfig, Credentials};

pub const API_URL_ENV: &str = "CF_API_URL";
pub const USER_ENV: &str = "CF_USER";
pub const PASSWORD_ENV: &str = "CF_PASSWORD";
pub const ORIGIN_ENV: &str = "CF_ORIGIN";
pub const CLIENT_ID_ENV: &str = "CF_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "CF_CLIENT_SECRET";
pub const ACCESS_TOKEN_ENV: &str = "CF_ACCESS_TOKEN";
pub const SKIP_SSL_VALIDATION_ENV: &str = "CF_SKIP_SSL_VALIDATION";

#[derive(Default)]
pub struct CloudFoundryProvider;

impl CloudFoundryProvider {
    pub fn new() -> Self {
        Self
    }
}

/// Provider block as written in configuration
#[derive(Debug, Default, Deserialize)]
struct ProviderModel {
    api_url: Option<String>,
    user: Option<String>,
    password: Option<String>,
    origin: Option<String>,
    cf_client_id: Option<String>,
    cf_client_secret: Option<String>,
    access_token: Option<String>,
    skip_ssl_validation: Option<bool>,
}

/// Settings after applying environment fallbacks
#[derive(Debug)]
struct ResolvedConfig {
    api_url: String,
    credentials: Credentials,
    skip_ssl_validation: bool,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn or_env(value: Option<String>, name: &str) -> Option<String> {
    value.filter(|v| !v.is_empty()).or_else(|| env_var(name))
}

impl ProviderModel {
    fn resolve(self) -> Result<ResolvedConfig, Diagnostic> {
        let api_url = or_env(self.api_url, API_URL_ENV).ok_or_else(|| {
            Diagnostic::error(
                "Missing Cloud Foundry API URL",
                format!(
                    "api_url is required (set in provider config or {} env var)",
                    API_URL_ENV
                ),
            )
        })?;
        let api_url = Url::parse(&api_url)
            .map_err(|e| {
                Diagnostic::error(
                    "Invalid Cloud Foundry API URL",
                    format!("{} is not a valid URL: {}", api_url, e),
                )
            })?
            .as_str()
            .trim_end_matches('/')
            .to_string();

        let user = or_env(self.user, USER_ENV);
        let password = or_env(self.password, PASSWORD_ENV);
        let origin = or_env(self.origin, ORIGIN_ENV);
        let client_id = or_env(self.cf_client_id, CLIENT_ID_ENV);
        let client_secret = or_env(self.cf_client_secret, CLIENT_SECRET_ENV);
        let access_token = or_env(self.access_token, ACCESS_TOKEN_ENV);

        let skip_ssl_validation = match self.skip_ssl_validation {
            Some(skip) => skip,
            None => match env_var(SKIP_SSL_VALIDATION_ENV) {
                Some(value) => value.parse::<bool>().map_err(|_| {
                    Diagnostic::error(
                        "Invalid skip_ssl_validation",
                        format!("{} must be true or false, got {}", SKIP_SSL_VALIDATION_ENV, value),
                    )
                })?,
                None => false,
            },
        };

        let mut methods = Vec::new();
        if let Some(token) = access_token {
            methods.push(Credentials::AccessToken(token));
        }
        if let (Some(user), Some(password)) = (user, password) {
            methods.push(Credentials::Password {
                user,
                password,
                origin,
            });
        }
        if let (Some(client_id), Some(client_secret)) = (client_id, client_secret) {
            methods.push(Credentials::ClientCredentials {
                client_id,
                client_secret,
            });
        }

        if methods.len() != 1 {
            let summary = if methods.is_empty() {
                "Missing Cloud Foundry credentials"
            } else {
                "Conflicting Cloud Foundry credentials"
            };
            return Err(Diagnostic::error(
                summary,
                "Exactly one of access_token, user and password, or cf_client_id and cf_client_secret must be configured (in the provider block or CF_* env vars)",
            ));
        }

        Ok(ResolvedConfig {
            api_url,
            credentials: methods.remove(0),
            skip_ssl_validation,
        })
    }
}

#[async_trait]
impl Provider for CloudFoundryProvider {
    fn type_name(&self) -> &str {
        "cloudfoundry"
    }

    async fn schema(&self, _ctx: Context, _request: ProviderSchemaRequest) -> ProviderSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages objects of a Cloud Foundry platform through its v3 API")
            .attribute(
                AttributeBuilder::new("api_url", AttributeType::String)
                    .description("Specific URL representing the entry point for communication between the client and a Cloud Foundry instance.")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("user", AttributeType::String)
                    .description("A unique identifier associated with an individual or entity for authentication & authorization purposes.")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("password", AttributeType::String)
                    .description("A confidential alphanumeric code associated with a user account on the Cloud Foundry platform, requires user to authenticate.")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("origin", AttributeType::String)
                    .description("Indicates the identity provider to be used for login")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("cf_client_id", AttributeType::String)
                    .description("Unique identifier for a client application used in authentication and authorization processes")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("cf_client_secret", AttributeType::String)
                    .description("A confidential string used by a client application for secure authentication and authorization, requires cf_client_id to authenticate")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("access_token", AttributeType::String)
                    .description("OAuth token to authenticate with Cloud Foundry")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("skip_ssl_validation", AttributeType::Bool)
                    .description("Allows the client to skip SSL certificate validation")
                    .optional()
                    .build(),
            )
            .build();

        ProviderSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        let model: ProviderModel = if request.config.is_null() {
            ProviderModel::default()
        } else {
            match common::decode(&request.config) {
                Ok(model) => model,
                Err(diag) => {
                    return ConfigureProviderResponse {
                        diagnostics: vec![diag],
                        provider_data: None,
                    }
                }
            }
        };

        let resolved = match model.resolve() {
            Ok(resolved) => resolved,
            Err(diag) => {
                return ConfigureProviderResponse {
                    diagnostics: vec![diag],
                    provider_data: None,
                }
            }
        };

        tracing::debug!(
            "Configuring provider for {} with {:?}",
            resolved.api_url,
            resolved.credentials
        );

        let config = ClientConfig {
            skip_ssl_validation: resolved.skip_ssl_validation,
            ..Default::default()
        };
        match api::Client::login(&resolved.api_url, &resolved.credentials, config).await {
            Ok(client) => ConfigureProviderResponse {
                diagnostics: vec![],
                provider_data: Some(Arc::new(CloudFoundryProviderData::new(client))),
            },
            Err(e) => ConfigureProviderResponse {
                diagnostics: vec![Diagnostic::error(
                    "Unable to create CF Client due to error",
                    e.to_string(),
                )],
                provider_data: None,
            },
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        let mut resources: HashMap<String, ResourceFactory> = HashMap::new();
        let mut add = |name: &str, factory: fn() -> Box<dyn ResourceWithConfigure>| {
            resources.insert(name.to_string(), Box::new(factory));
        };

        add("cloudfoundry_org", || Box::new(resources::OrgResource::new()));
        add("cloudfoundry_space", || Box::new(resources::SpaceResource::new()));
        add("cloudfoundry_app", || Box::new(resources::AppResource::new()));
        add("cloudfoundry_domain", || Box::new(resources::DomainResource::new()));
        add("cloudfoundry_buildpack", || Box::new(resources::BuildpackResource::new()));
        add("cloudfoundry_org_role", || Box::new(resources::RoleResource::org()));
        add("cloudfoundry_space_role", || Box::new(resources::RoleResource::space()));
        add("cloudfoundry_security_group", || {
            Box::new(resources::SecurityGroupResource::new())
        });
        add("cloudfoundry_security_group_space_bindings", || {
            Box::new(resources::SecurityGroupSpaceBindingsResource::new())
        });
        add("cloudfoundry_service_instance", || {
            Box::new(resources::ServiceInstanceResource::new())
        });
        add("cloudfoundry_service_broker", || {
            Box::new(resources::ServiceBrokerResource::new())
        });
        add("cloudfoundry_service_plan_visibility", || {
            Box::new(resources::ServicePlanVisibilityResource::new())
        });
        add("cloudfoundry_service_route_binding", || {
            Box::new(resources::ServiceRouteBindingResource::new())
        });
        add("cloudfoundry_isolation_segment", || {
            Box::new(resources::IsolationSegmentResource::new())
        });
        add("cloudfoundry_isolation_segment_entitlement", || {
            Box::new(resources::IsolationSegmentEntitlementResource::new())
        });
        add("cloudfoundry_mta", || Box::new(resources::MtaResource::new()));
        add("cloudfoundry_network_policy", || {
            Box::new(resources::NetworkPolicyResource::new())
        });

        resources
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        let mut data_sources: HashMap<String, DataSourceFactory> = HashMap::new();
        let mut add = |name: &str, factory: fn() -> Box<dyn DataSourceWithConfigure>| {
            data_sources.insert(name.to_string(), Box::new(factory));
        };

        add("cloudfoundry_org", || Box::new(data_sources::OrgDataSource::new()));
        add("cloudfoundry_orgs", || Box::new(data_sources::OrgsDataSource::new()));
        add("cloudfoundry_space", || Box::new(data_sources::SpaceDataSource::new()));
        add("cloudfoundry_spaces", || Box::new(data_sources::SpacesDataSource::new()));
        add("cloudfoundry_apps", || Box::new(data_sources::AppsDataSource::new()));
        add("cloudfoundry_domains", || Box::new(data_sources::DomainsDataSource::new()));
        add("cloudfoundry_org_roles", || Box::new(data_sources::RolesDataSource::org()));
        add("cloudfoundry_space_roles", || {
            Box::new(data_sources::RolesDataSource::space())
        });
        add("cloudfoundry_buildpacks", || {
            Box::new(data_sources::BuildpacksDataSource::new())
        });
        add("cloudfoundry_stacks", || Box::new(data_sources::StacksDataSource::new()));
        add("cloudfoundry_service_instances", || {
            Box::new(data_sources::ServiceInstancesDataSource::new())
        });
        add("cloudfoundry_service_plans", || {
            Box::new(data_sources::ServicePlansDataSource::new())
        });
        add("cloudfoundry_service_brokers", || {
            Box::new(data_sources::ServiceBrokersDataSource::new())
        });
        add("cloudfoundry_service_plan_visibility", || {
            Box::new(data_sources::ServicePlanVisibilityDataSource::new())
        });
        add("cloudfoundry_service_route_bindings", || {
            Box::new(data_sources::ServiceRouteBindingsDataSource::new())
        });
        add("cloudfoundry_security_groups", || {
            Box::new(data_sources::SecurityGroupsDataSource::new())
        });
        add("cloudfoundry_isolation_segments", || {
            Box::new(data_sources::IsolationSegmentsDataSource::new())
        });
        add("cloudfoundry_mtas", || Box::new(data_sources::MtasDataSource::new()));

        data_sources
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use mockito::Server;
    use serial_test::serial;
    use tfplug::types::{ClientCapabilities, DynamicValue};

    const CF_ENV_VARS: &[&str] = &[
        API_URL_ENV,
        USER_ENV,
        PASSWORD_ENV,
        ORIGIN_ENV,
        CLIENT_ID_ENV,
        CLIENT_SECRET_ENV,
        ACCESS_TOKEN_ENV,
        SKIP_SSL_VALIDATION_ENV,
    ];

    fn clear_env() {
        for name in CF_ENV_VARS {
            std::env::remove_var(name);
        }
    }

    fn configure_request(config: serde_json::Value) -> ConfigureProviderRequest {
        ConfigureProviderRequest {
            terraform_version: "1.9.0".to_string(),
            config: DynamicValue::new(config.into()),
            client_capabilities: ClientCapabilities::default(),
        }
    }

    #[tokio::test]
    #[serial]
    async fn provider_configures_with_access_token_from_env() {
        clear_env();
        std::env::set_var(API_URL_ENV, "https://api.cf.example.com");
        std::env::set_var(ACCESS_TOKEN_ENV, "bearer env-token");

        let mut provider = CloudFoundryProvider::new();
        let response = provider
            .configure(Context::new(), configure_request(serde_json::json!({})))
            .await;

        assert!(response.diagnostics.is_empty());
        let data = response.provider_data.unwrap();
        let data = data.downcast_ref::<CloudFoundryProviderData>().unwrap();
        assert_eq!(data.client.access_token(), "env-token");
        assert_eq!(data.client.base_url(), "https://api.cf.example.com");

        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn provider_config_wins_over_env() {
        clear_env();
        std::env::set_var(API_URL_ENV, "https://api.env.example.com");
        std::env::set_var(ACCESS_TOKEN_ENV, "env-token");

        let mut provider = CloudFoundryProvider::new();
        let response = provider
            .configure(
                Context::new(),
                configure_request(serde_json::json!({
                    "api_url": "https://api.config.example.com",
                    "access_token": "config-token",
                    "skip_ssl_validation": true
                })),
            )
            .await;

        assert!(response.diagnostics.is_empty());
        let data = response.provider_data.unwrap();
        let data = data.downcast_ref::<CloudFoundryProviderData>().unwrap();
        assert_eq!(data.client.access_token(), "config-token");
        assert_eq!(data.client.base_url(), "https://api.config.example.com");
        assert!(data.client.config().skip_ssl_validation);

        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn provider_configure_requires_api_url() {
        clear_env();
        std::env::set_var(ACCESS_TOKEN_ENV, "token");

        let mut provider = CloudFoundryProvider::new();
        let response = provider
            .configure(Context::new(), configure_request(serde_json::json!({})))
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].detail.contains("api_url is required"));
        assert!(response.provider_data.is_none());

        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn provider_configure_requires_exactly_one_credential_method() {
        clear_env();

        let mut provider = CloudFoundryProvider::new();
        let missing = provider
            .configure(
                Context::new(),
                configure_request(serde_json::json!({"api_url": "https://api.cf.example.com", "user": "admin"})),
            )
            .await;
        assert_eq!(missing.diagnostics[0].summary, "Missing Cloud Foundry credentials");

        std::env::set_var(CLIENT_ID_ENV, "ci");
        std::env::set_var(CLIENT_SECRET_ENV, "secret");
        let conflicting = provider
            .configure(
                Context::new(),
                configure_request(serde_json::json!({
                    "api_url": "https://api.cf.example.com",
                    "access_token": "token"
                })),
            )
            .await;
        assert_eq!(
            conflicting.diagnostics[0].summary,
            "Conflicting Cloud Foundry credentials"
        );

        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn provider_logs_in_with_password_from_env() {
        clear_env();
        let mut server = Server::new_async().await;
        let _root = server
            .mock("GET", "/")
            .with_body(format!(
                r#"{{"links":{{"login":{{"href":"{}"}}}}}}"#,
                server.url()
            ))
            .create_async()
            .await;
        let token = server
            .mock("POST", "/oauth/token")
            .with_body(r#"{"access_token":"uaa-token"}"#)
            .create_async()
            .await;

        std::env::set_var(USER_ENV, "admin");
        std::env::set_var(PASSWORD_ENV, "secret");

        let mut provider = CloudFoundryProvider::new();
        let response = provider
            .configure(
                Context::new(),
                configure_request(serde_json::json!({"api_url": server.url()})),
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let data = response.provider_data.unwrap();
        let data = data.downcast_ref::<CloudFoundryProviderData>().unwrap();
        assert_eq!(data.client.access_token(), "uaa-token");
        token.assert_async().await;

        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn invalid_skip_ssl_env_is_reported() {
        clear_env();
        std::env::set_var(SKIP_SSL_VALIDATION_ENV, "maybe");

        let result = ProviderModel {
            api_url: Some("https://api.cf.example.com".to_string()),
            access_token: Some("token".to_string()),
            ..Default::default()
        }
        .resolve();

        assert_eq!(result.unwrap_err().summary, "Invalid skip_ssl_validation");
        clear_env();
    }

    #[test]
    #[serial]
    fn malformed_api_url_is_rejected() {
        clear_env();

        let result = ProviderModel {
            api_url: Some("api.cf.example.com".to_string()),
            access_token: Some("token".to_string()),
            ..Default::default()
        }
        .resolve();

        assert_eq!(result.unwrap_err().summary, "Invalid Cloud Foundry API URL");
    }

    #[test]
    fn provider_registers_every_type() {
        let provider = CloudFoundryProvider::new();
        let resources = provider.resources();
        let data_sources = provider.data_sources();

        assert_eq!(resources.len(), 17);
        assert_eq!(data_sources.len(), 18);
        for (name, factory) in &resources {
            assert_eq!(factory().type_name(), name);
        }
        for (name, factory) in &data_sources {
            assert_eq!(factory().type_name(), name);
        }
    }
}
