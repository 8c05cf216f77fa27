//! Helpers shared by resources and data sources: schema fragments, typed
//! model conversion, metadata mapping and API error diagnostics

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tfplug::validator::UuidValidator;

use crate::api::{ApiError, Metadata, MetadataRequest};

pub type StringMap = HashMap<String, String>;

pub fn id_attribute(description: &str) -> Attribute {
    AttributeBuilder::new("id", AttributeType::String)
        .description(description)
        .computed()
        .plan_modifier(UseStateForUnknown::create())
        .build()
}

pub fn created_at_attribute() -> Attribute {
    AttributeBuilder::new("created_at", AttributeType::String)
        .description("The date and time when the resource was created in RFC3339 format.")
        .computed()
        .plan_modifier(UseStateForUnknown::create())
        .build()
}

pub fn updated_at_attribute() -> Attribute {
    AttributeBuilder::new("updated_at", AttributeType::String)
        .description("The date and time when the resource was updated in RFC3339 format.")
        .computed()
        .build()
}

/// Required GUID reference to another object. Changing it replaces the
/// resource.
pub fn guid_reference(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .description(description)
        .required()
        .validator(UuidValidator::create())
        .plan_modifier(RequiresReplace::create())
        .build()
}

/// Required GUID filter of a data source
pub fn guid_filter(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .description(description)
        .required()
        .validator(UuidValidator::create())
        .build()
}

pub fn labels_attribute() -> Attribute {
    AttributeBuilder::new("labels", AttributeType::Map(Box::new(AttributeType::String)))
        .description("The labels associated with Cloud Foundry resources. Add as described [here](https://docs.cloudfoundry.org/adminguide/metadata.html#-view-metadata-for-an-object).")
        .optional()
        .build()
}

pub fn annotations_attribute() -> Attribute {
    AttributeBuilder::new(
        "annotations",
        AttributeType::Map(Box::new(AttributeType::String)),
    )
    .description("The annotations associated with Cloud Foundry resources. Add as described [here](https://docs.cloudfoundry.org/adminguide/metadata.html#-view-metadata-for-an-object).")
    .optional()
    .build()
}

/// `labels`, `annotations`, `created_at` and `updated_at` as read-only
/// attributes of a data source
pub fn computed_common_attributes() -> Vec<Attribute> {
    vec![
        computed_map("labels", "The labels associated with the object."),
        computed_map("annotations", "The annotations associated with the object."),
        computed_string("created_at", "The date and time when the object was created in RFC3339 format."),
        computed_string("updated_at", "The date and time when the object was updated in RFC3339 format."),
    ]
}

pub fn computed_string(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .description(description)
        .computed()
        .build()
}

pub fn computed_bool(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::Bool)
        .description(description)
        .computed()
        .build()
}

pub fn computed_number(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::Number)
        .description(description)
        .computed()
        .build()
}

pub fn computed_map(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::Map(Box::new(AttributeType::String)))
        .description(description)
        .computed()
        .build()
}

pub fn computed_string_list(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::List(Box::new(AttributeType::String)))
        .description(description)
        .computed()
        .build()
}

/// Decode a plan, state or config into its typed model
pub fn decode<T: DeserializeOwned>(value: &DynamicValue) -> Result<T, Diagnostic> {
    value.to_typed().map_err(|e| {
        Diagnostic::error(
            "Unable to decode Terraform value",
            format!("The value could not be decoded: {}", e),
        )
    })
}

pub fn encode<T: Serialize>(model: &T) -> Result<DynamicValue, Diagnostic> {
    DynamicValue::from_typed(model).map_err(|e| {
        Diagnostic::error(
            "Unable to encode Terraform state",
            format!("The state could not be encoded: {}", e),
        )
    })
}

#[derive(Deserialize)]
struct StateId {
    id: Option<String>,
}

/// The `id` of a prior state or an imported stub
pub fn state_id(state: &DynamicValue) -> Result<String, Diagnostic> {
    let StateId { id } = decode(state)?;
    id.filter(|id| !id.is_empty()).ok_or_else(|| {
        Diagnostic::error("Missing resource ID", "The state does not contain an id")
            .with_attribute(AttributePath::new("id"))
    })
}

pub fn api_error(summary: &str, err: &ApiError) -> Diagnostic {
    Diagnostic::error(summary, err.to_string())
}

/// Empty label and annotation maps are reported as null, matching an
/// unset attribute
pub fn labels_from(metadata: &Metadata) -> Option<StringMap> {
    non_empty(metadata.label_map())
}

pub fn annotations_from(metadata: &Metadata) -> Option<StringMap> {
    non_empty(metadata.annotation_map())
}

fn non_empty(map: StringMap) -> Option<StringMap> {
    (!map.is_empty()).then_some(map)
}

/// Metadata body for a create call
pub fn metadata_request(
    labels: &Option<StringMap>,
    annotations: &Option<StringMap>,
) -> MetadataRequest {
    metadata_patch(labels, annotations, &None, &None)
}

/// Metadata body for an update. Keys present in the prior state but gone
/// from the plan are sent as null so the platform removes them.
pub fn metadata_patch(
    planned_labels: &Option<StringMap>,
    planned_annotations: &Option<StringMap>,
    prior_labels: &Option<StringMap>,
    prior_annotations: &Option<StringMap>,
) -> MetadataRequest {
    MetadataRequest {
        labels: patch_map(planned_labels, prior_labels),
        annotations: patch_map(planned_annotations, prior_annotations),
    }
}

fn patch_map(
    planned: &Option<StringMap>,
    prior: &Option<StringMap>,
) -> HashMap<String, Option<String>> {
    let mut patch: HashMap<String, Option<String>> = planned
        .iter()
        .flatten()
        .map(|(k, v)| (k.clone(), Some(v.clone())))
        .collect();
    for key in prior.iter().flatten().map(|(k, _)| k) {
        patch.entry(key.clone()).or_insert(None);
    }
    patch
}

/// Canonical form of a JSON document held in a string attribute
pub fn normalize_json(raw: &str) -> Result<String, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    Ok(value.to_string())
}

pub fn parse_json_attribute(
    name: &str,
    raw: &Option<String>,
) -> Result<Option<serde_json::Value>, Diagnostic> {
    raw.as_deref()
        .map(|raw| {
            serde_json::from_str(raw).map_err(|e| {
                Diagnostic::error(
                    "Invalid JSON",
                    format!("Attribute {} must contain a JSON document: {}", name, e),
                )
                .with_attribute(AttributePath::new(name))
            })
        })
        .transpose()
}

/// JSON values that carry no data map to null
pub fn json_string(value: &Option<serde_json::Value>) -> Option<String> {
    match value {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => Some(v.to_string()),
    }
}
