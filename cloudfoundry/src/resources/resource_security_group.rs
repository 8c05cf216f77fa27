//! Security group resource
//!
//! Space bindings are reported read-only here and managed through
//! `cloudfoundry_security_group_space_bindings`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tfplug::context::Context;
use tfplug::import::import_state_passthrough_id;
use tfplug::plan_modifier::UseStateForUnknown;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, UpdateResourceRequest,
    UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, NestedType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tfplug::validator::{StringLengthValidator, StringOneOfValidator};

use crate::api::security_groups::{
    GloballyEnabled, SecurityGroup, SecurityGroupRequest, SecurityGroupRule,
};
use crate::common;
use crate::provider_data::{extract_provider_data, require_client, ConfigureTarget};
use crate::CloudFoundryProviderData;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroupRuleModel {
    pub protocol: String,
    pub destination: String,
    pub ports: Option<String>,
    #[serde(rename = "type")]
    pub icmp_type: Option<i64>,
    pub code: Option<i64>,
    pub description: Option<String>,
    pub log: Option<bool>,
}

impl From<&SecurityGroupRule> for SecurityGroupRuleModel {
    fn from(rule: &SecurityGroupRule) -> Self {
        Self {
            protocol: rule.protocol.clone(),
            destination: rule.destination.clone(),
            ports: rule.ports.clone(),
            icmp_type: rule.icmp_type,
            code: rule.code,
            description: rule.description.clone(),
            log: rule.log,
        }
    }
}

impl From<&SecurityGroupRuleModel> for SecurityGroupRule {
    fn from(rule: &SecurityGroupRuleModel) -> Self {
        Self {
            protocol: rule.protocol.clone(),
            destination: rule.destination.clone(),
            ports: rule.ports.clone(),
            icmp_type: rule.icmp_type,
            code: rule.code,
            description: rule.description.clone(),
            log: rule.log,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroupModel {
    pub id: Option<String>,
    pub name: String,
    pub globally_enabled_running: Option<bool>,
    pub globally_enabled_staging: Option<bool>,
    pub rules: Option<Vec<SecurityGroupRuleModel>>,
    pub running_spaces: Option<Vec<String>>,
    pub staging_spaces: Option<Vec<String>>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl From<&SecurityGroup> for SecurityGroupModel {
    fn from(group: &SecurityGroup) -> Self {
        Self {
            id: Some(group.guid.clone()),
            name: group.name.clone(),
            globally_enabled_running: Some(group.globally_enabled.running),
            globally_enabled_staging: Some(group.globally_enabled.staging),
            rules: (!group.rules.is_empty())
                .then(|| group.rules.iter().map(SecurityGroupRuleModel::from).collect()),
            running_spaces: Some(group.relationships.running_spaces.guids()),
            staging_spaces: Some(group.relationships.staging_spaces.guids()),
            created_at: Some(group.created_at.clone()),
            updated_at: Some(group.updated_at.clone()),
        }
    }
}

impl SecurityGroupModel {
    fn request(&self) -> SecurityGroupRequest {
        SecurityGroupRequest {
            name: Some(self.name.clone()),
            globally_enabled: GloballyEnabled {
                running: self.globally_enabled_running.unwrap_or(false),
                staging: self.globally_enabled_staging.unwrap_or(false),
            },
            rules: self
                .rules
                .iter()
                .flatten()
                .map(SecurityGroupRule::from)
                .collect(),
        }
    }
}

#[derive(Default)]
pub struct SecurityGroupResource {
    provider_data: Option<CloudFoundryProviderData>,
}

impl SecurityGroupResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn create_group(&self, request: &CreateResourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let plan: SecurityGroupModel = common::decode(&request.planned_state)?;

        let group = client
            .security_groups()
            .create(&plan.request())
            .await
            .map_err(|e| common::api_error("API Error Creating Security Group", &e))?;

        tracing::debug!("Created security group {} ({})", group.name, group.guid);
        common::encode(&SecurityGroupModel::from(&group))
    }

    async fn read_group(&self, request: &ReadResourceRequest) -> Result<Option<DynamicValue>, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let id = common::state_id(&request.current_state)?;

        match client.security_groups().get(&id).await {
            Ok(group) => common::encode(&SecurityGroupModel::from(&group)).map(Some),
            Err(e) if e.is_not_found() => {
                tracing::warn!("Security group {} no longer exists, removing from state", id);
                Ok(None)
            }
            Err(e) => Err(common::api_error("API Error Reading Security Group", &e)),
        }
    }

    async fn update_group(&self, request: &UpdateResourceRequest) -> Result<DynamicValue, Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let plan: SecurityGroupModel = common::decode(&request.planned_state)?;
        let id = common::state_id(&request.prior_state)?;

        let group = client
            .security_groups()
            .update(&id, &plan.request())
            .await
            .map_err(|e| common::api_error("API Error Updating Security Group", &e))?;

        common::encode(&SecurityGroupModel::from(&group))
    }

    async fn delete_group(&self, request: &DeleteResourceRequest) -> Result<(), Diagnostic> {
        let client = require_client(&self.provider_data)?;
        let id = common::state_id(&request.prior_state)?;

        match client.security_groups().delete(&id).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(common::api_error("API Error Deleting Security Group", &e)),
        }
    }
}

fn rule_attributes() -> Vec<tfplug::schema::Attribute> {
    vec![
        AttributeBuilder::new("protocol", AttributeType::String)
            .description("Protocol type Valid values are tcp, udp, icmp, or all")
            .required()
            .validator(StringOneOfValidator::create(&["tcp", "udp", "icmp", "all"]))
            .build(),
        AttributeBuilder::new("destination", AttributeType::String)
            .description("Destinations that the rule applies to; must be a singular Valid destination or a comma-delimited list of destinations")
            .required()
            .build(),
        AttributeBuilder::new("ports", AttributeType::String)
            .description("Ports that the rule applies to; can be a single port (9000), a comma-separated list (9000,9001), or a range (9000-9001)")
            .optional()
            .build(),
        AttributeBuilder::new("type", AttributeType::Number)
            .description("Type required for ICMP protocol; valid values are between -1 and 255 (inclusive), where -1 allows all")
            .optional()
            .build(),
        AttributeBuilder::new("code", AttributeType::Number)
            .description("Code required for ICMP protocol; valid values are between -1 and 255 (inclusive), where -1 allows all")
            .optional()
            .build(),
        AttributeBuilder::new("description", AttributeType::String)
            .description("A description for the rule; this field is limited to 16MB")
            .optional()
            .build(),
        AttributeBuilder::new("log", AttributeType::Bool)
            .description("Enable logging for rule, only valid for tcp rules")
            .optional()
            .build(),
    ]
}

#[async_trait]
impl Resource for SecurityGroupResource {
    fn type_name(&self) -> &str {
        "cloudfoundry_security_group"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Provides a Cloud Foundry resource for managing Cloud Foundry security groups")
            .attribute(common::id_attribute("The GUID of the security group"))
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Name of the security group")
                    .required()
                    .validator(StringLengthValidator::between(1, 250))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("globally_enabled_running", AttributeType::Bool)
                    .description("Specifies whether the group should be applied globally to all running applications")
                    .optional()
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("globally_enabled_staging", AttributeType::Bool)
                    .description("Specifies whether the group should be applied globally to all staging applications")
                    .optional()
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::nested("rules", NestedType::list(rule_attributes()))
                    .description("Rules that will be applied by this security group")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("running_spaces", AttributeType::Set(Box::new(AttributeType::String)))
                    .description("The space guids where the security group is applied to running applications")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("staging_spaces", AttributeType::Set(Box::new(AttributeType::String)))
                    .description("The space guids where the security group is applied to staging applications")
                    .computed()
                    .build(),
            )
            .attribute(common::created_at_attribute())
            .attribute(common::updated_at_attribute())
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        match self.create_group(&request).await {
            Ok(new_state) => CreateResourceResponse {
                new_state,
                private: vec![],
                diagnostics: vec![],
            },
            Err(diag) => CreateResourceResponse {
                new_state: DynamicValue::null(),
                private: vec![],
                diagnostics: vec![diag],
            },
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        match self.read_group(&request).await {
            Ok(new_state) => ReadResourceResponse {
                new_state,
                diagnostics: vec![],
                private: request.private,
            },
            Err(diag) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![diag],
                private: request.private,
            },
        }
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        match self.update_group(&request).await {
            Ok(new_state) => UpdateResourceResponse {
                new_state,
                private: vec![],
                diagnostics: vec![],
            },
            Err(diag) => UpdateResourceResponse {
                new_state: request.prior_state,
                private: vec![],
                diagnostics: vec![diag],
            },
        }
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        DeleteResourceResponse {
            diagnostics: self.delete_group(&request).await.err().into_iter().collect(),
        }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for SecurityGroupResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        match extract_provider_data(request.provider_data, ConfigureTarget::Resource) {
            Ok(data) => {
                self.provider_data = data;
                ConfigureResourceResponse {
                    diagnostics: vec![],
                }
            }
            Err(diag) => ConfigureResourceResponse {
                diagnostics: vec![diag],
            },
        }
    }
}

#[async_trait]
impl ResourceWithImportState for SecurityGroupResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse::default();
        import_state_passthrough_id(&ctx, AttributePath::new("id"), &request, &mut response);
        response
    }
}
