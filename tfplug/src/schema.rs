//! Schema types and builders for tfplug
//!
//! This module provides the schema system for defining resource and data source
//! schemas, including attribute types, nested attributes and validation.

use crate::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use std::collections::HashMap;
use std::sync::Arc;

/// AttributeType defines the type system for Terraform attributes
/// This must match Terraform's type system exactly
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    String,
    Number, // Always f64
    Bool,
    List(Box<AttributeType>),               // Ordered, allows duplicates
    Set(Box<AttributeType>),                // Unordered, no duplicates
    Map(Box<AttributeType>),                // String keys only
    Object(HashMap<String, AttributeType>), // Fixed structure
}

impl AttributeType {
    /// JSON type constraint as Terraform expects it in `Schema.Attribute.type`
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;

        match self {
            AttributeType::String => json!("string"),
            AttributeType::Number => json!("number"),
            AttributeType::Bool => json!("bool"),
            AttributeType::List(inner) => json!(["list", inner.to_json()]),
            AttributeType::Set(inner) => json!(["set", inner.to_json()]),
            AttributeType::Map(inner) => json!(["map", inner.to_json()]),
            AttributeType::Object(fields) => {
                let fields: serde_json::Map<String, serde_json::Value> = fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect();
                json!(["object", fields])
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_json().to_string().into_bytes()
    }

    /// Null and unknown values conform to every type
    pub fn conforms(&self, value: &Dynamic) -> bool {
        match (self, value) {
            (_, Dynamic::Null) | (_, Dynamic::Unknown) => true,
            (AttributeType::String, Dynamic::String(_)) => true,
            (AttributeType::Number, Dynamic::Number(_)) => true,
            (AttributeType::Bool, Dynamic::Bool(_)) => true,
            (AttributeType::List(inner), Dynamic::List(items))
            | (AttributeType::Set(inner), Dynamic::List(items)) => {
                items.iter().all(|item| inner.conforms(item))
            }
            (AttributeType::Map(inner), Dynamic::Map(entries)) => {
                entries.values().all(|v| inner.conforms(v))
            }
            (AttributeType::Object(fields), Dynamic::Map(entries)) => entries
                .iter()
                .all(|(k, v)| fields.get(k).is_some_and(|t| t.conforms(v))),
            _ => false,
        }
    }

    /// Human readable name used in diagnostics
    pub fn friendly_name(&self) -> String {
        match self {
            AttributeType::String => "string".to_string(),
            AttributeType::Number => "number".to_string(),
            AttributeType::Bool => "bool".to_string(),
            AttributeType::List(inner) => format!("list of {}", inner.friendly_name()),
            AttributeType::Set(inner) => format!("set of {}", inner.friendly_name()),
            AttributeType::Map(inner) => format!("map of {}", inner.friendly_name()),
            AttributeType::Object(_) => "object".to_string(),
        }
    }
}

/// Schema is returned by providers/resources/data sources
/// Version is used for state migration
#[derive(Debug, Clone)]
pub struct Schema {
    pub version: i64, // Increment when schema changes require migration
    pub block: Block, // Root block containing all attributes
}

impl Schema {
    /// Check a configuration against the schema. Runs attribute validators on
    /// every known, non-null value.
    pub fn validate_config(&self, config: &DynamicValue) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        validate_attributes(
            &self.block.attributes,
            &config.value,
            config,
            &AttributePath::root(),
            &mut diagnostics,
        );
        diagnostics
    }

    /// Make `value` carry exactly the attributes of the schema: missing
    /// attributes become null, undeclared keys are dropped. With
    /// `resolve_unknown` every unknown value is replaced by null, as required
    /// for state returned from apply, read and import.
    pub fn normalize(&self, value: &DynamicValue, resolve_unknown: bool) -> DynamicValue {
        match &value.value {
            Dynamic::Null => DynamicValue::null(),
            v => DynamicValue::new(normalize_attributes(
                &self.block.attributes,
                v,
                resolve_unknown,
            )),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.block.attributes.iter().find(|a| a.name == name)
    }
}

fn validate_attributes(
    attributes: &[Attribute],
    value: &Dynamic,
    config: &DynamicValue,
    path: &AttributePath,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let empty = HashMap::new();
    let entries = match value {
        Dynamic::Map(m) => m,
        Dynamic::Null => &empty,
        Dynamic::Unknown => return,
        other => {
            diagnostics.push(
                Diagnostic::error(
                    "Invalid configuration",
                    format!("Expected an object, got {}", other.type_name()),
                )
                .with_attribute(path.clone()),
            );
            return;
        }
    };

    for key in entries.keys() {
        if !attributes.iter().any(|a| &a.name == key) {
            let attr_path = path.clone().attribute(key);
            diagnostics.push(
                Diagnostic::error(
                    "Unsupported argument",
                    format!("An argument named \"{}\" is not expected here.", key),
                )
                .with_attribute(attr_path),
            );
        }
    }

    for attr in attributes {
        let attr_path = path.clone().attribute(&attr.name);
        let attr_value = entries.get(&attr.name).unwrap_or(&Dynamic::Null);

        if attr.required && attr_value.is_null() {
            diagnostics.push(
                Diagnostic::error(
                    "Missing required argument",
                    format!("The argument \"{}\" is required, but no definition was found.", attr.name),
                )
                .with_attribute(attr_path),
            );
            continue;
        }

        if attr.computed && !attr.optional && !attr.required && !attr_value.is_null() {
            diagnostics.push(
                Diagnostic::error(
                    "Invalid Configuration for Read-Only Attribute",
                    format!("Cannot set value for this attribute as the provider has marked it as read-only. Remove the configuration line setting the value. Attribute: {}", attr.name),
                )
                .with_attribute(attr_path),
            );
            continue;
        }

        if attr_value.is_null() || attr_value.is_unknown() {
            continue;
        }

        if let Some(nested) = &attr.nested_type {
            validate_nested(nested, attr_value, config, &attr_path, diagnostics);
        } else if !attr.r#type.conforms(attr_value) {
            diagnostics.push(
                Diagnostic::error(
                    "Incorrect attribute value type",
                    format!(
                        "Inappropriate value for attribute \"{}\": {} required, got {}.",
                        attr.name,
                        attr.r#type.friendly_name(),
                        attr_value.type_name()
                    ),
                )
                .with_attribute(attr_path),
            );
            continue;
        }

        for validator in &attr.validators {
            let response = validator.validate(ValidatorRequest {
                config_value: DynamicValue::new(attr_value.clone()),
                config: config.clone(),
                path: attr_path.clone(),
            });
            diagnostics.extend(response.diagnostics);
        }
    }
}

fn validate_nested(
    nested: &NestedType,
    value: &Dynamic,
    config: &DynamicValue,
    path: &AttributePath,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match (nested.nesting, value) {
        (ObjectNestingMode::Single, v) => {
            validate_attributes(&nested.attributes, v, config, path, diagnostics)
        }
        (ObjectNestingMode::List, Dynamic::List(items))
        | (ObjectNestingMode::Set, Dynamic::List(items)) => {
            for (idx, item) in items.iter().enumerate() {
                let item_path = path.clone().index(idx as i64);
                validate_attributes(&nested.attributes, item, config, &item_path, diagnostics);
            }
        }
        (ObjectNestingMode::Map, Dynamic::Map(entries)) => {
            for (key, item) in entries {
                let item_path = path.clone().key(key);
                validate_attributes(&nested.attributes, item, config, &item_path, diagnostics);
            }
        }
        (_, other) => diagnostics.push(
            Diagnostic::error(
                "Incorrect attribute value type",
                format!("Unexpected {} for nested attribute", other.type_name()),
            )
            .with_attribute(path.clone()),
        ),
    }
}

fn normalize_attributes(attributes: &[Attribute], value: &Dynamic, resolve_unknown: bool) -> Dynamic {
    let entries = match value {
        Dynamic::Map(m) => m,
        Dynamic::Unknown if !resolve_unknown => return Dynamic::Unknown,
        _ => return Dynamic::Null,
    };

    let normalized = attributes
        .iter()
        .map(|attr| {
            let v = entries.get(&attr.name).unwrap_or(&Dynamic::Null);
            let v = match &attr.nested_type {
                Some(nested) => normalize_nested(nested, v, resolve_unknown),
                None => normalize_value(v, resolve_unknown),
            };
            (attr.name.clone(), v)
        })
        .collect();

    Dynamic::Map(normalized)
}

fn normalize_nested(nested: &NestedType, value: &Dynamic, resolve_unknown: bool) -> Dynamic {
    match (nested.nesting, value) {
        (_, Dynamic::Null) => Dynamic::Null,
        (_, Dynamic::Unknown) => normalize_value(value, resolve_unknown),
        (ObjectNestingMode::Single, v) => normalize_attributes(&nested.attributes, v, resolve_unknown),
        (_, Dynamic::List(items)) => Dynamic::List(
            items
                .iter()
                .map(|item| normalize_attributes(&nested.attributes, item, resolve_unknown))
                .collect(),
        ),
        (_, Dynamic::Map(entries)) => Dynamic::Map(
            entries
                .iter()
                .map(|(k, item)| {
                    (
                        k.clone(),
                        normalize_attributes(&nested.attributes, item, resolve_unknown),
                    )
                })
                .collect(),
        ),
        (_, other) => normalize_value(other, resolve_unknown),
    }
}

fn normalize_value(value: &Dynamic, resolve_unknown: bool) -> Dynamic {
    match value {
        Dynamic::Unknown if resolve_unknown => Dynamic::Null,
        Dynamic::List(items) if resolve_unknown => Dynamic::List(
            items
                .iter()
                .map(|item| normalize_value(item, resolve_unknown))
                .collect(),
        ),
        Dynamic::Map(entries) if resolve_unknown => Dynamic::Map(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), normalize_value(v, resolve_unknown)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Block represents a configuration block
#[derive(Debug, Clone)]
pub struct Block {
    pub version: i64,
    pub attributes: Vec<Attribute>,
    pub description: String,
    pub description_kind: StringKind,
    pub deprecated: bool,
}

/// Attribute represents a single configuration attribute
#[derive(Clone)]
pub struct Attribute {
    pub name: String,
    pub r#type: AttributeType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub validators: Vec<Arc<dyn Validator>>,
    pub plan_modifiers: Vec<Arc<dyn PlanModifier>>,
    pub default: Option<Arc<dyn Default>>,
    pub nested_type: Option<NestedType>,
    pub deprecated: bool,
}

// Manual Debug implementation since validators/modifiers don't implement Debug
impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("type", &self.r#type)
            .field("description", &self.description)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("computed", &self.computed)
            .field("sensitive", &self.sensitive)
            .field(
                "validators",
                &format!("{} validators", self.validators.len()),
            )
            .field(
                "plan_modifiers",
                &format!("{} plan modifiers", self.plan_modifiers.len()),
            )
            .field("default", &self.default.is_some())
            .field("nested_type", &self.nested_type)
            .field("deprecated", &self.deprecated)
            .finish()
    }
}

/// NestedType for attributes with nested structures
#[derive(Debug, Clone)]
pub struct NestedType {
    pub attributes: Vec<Attribute>,
    pub nesting: ObjectNestingMode,
}

impl NestedType {
    pub fn list(attributes: Vec<Attribute>) -> Self {
        Self {
            attributes,
            nesting: ObjectNestingMode::List,
        }
    }

    pub fn set(attributes: Vec<Attribute>) -> Self {
        Self {
            attributes,
            nesting: ObjectNestingMode::Set,
        }
    }

    pub fn single(attributes: Vec<Attribute>) -> Self {
        Self {
            attributes,
            nesting: ObjectNestingMode::Single,
        }
    }
}

/// ObjectNestingMode for nested attribute objects
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObjectNestingMode {
    Single,
    List,
    Set,
    Map,
}

/// StringKind represents the format of string values
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StringKind {
    Plain,
    Markdown,
}

/// Validator performs validation on attribute values during planning
/// Implement this for custom validation logic
pub trait Validator: Send + Sync {
    /// Human-readable description
    fn description(&self) -> String;
    /// Perform validation
    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse;
}

/// Request for validators
pub struct ValidatorRequest {
    pub config_value: DynamicValue,
    /// Whole configuration, for checks that look at sibling attributes
    pub config: DynamicValue,
    pub path: AttributePath,
}

/// Response from validators
pub struct ValidatorResponse {
    pub diagnostics: Vec<Diagnostic>,
}

/// PlanModifier modifies planned values during planning
/// Common uses: RequiresReplace, UseStateForUnknown
pub trait PlanModifier: Send + Sync {
    /// Human-readable description
    fn description(&self) -> String;
    /// Modify the planned value
    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse;
}

/// Request for plan modifiers
pub struct PlanModifierRequest {
    pub config_value: DynamicValue,
    pub state_value: DynamicValue,
    pub plan_value: DynamicValue,
    pub path: AttributePath,
    /// True when there is no prior state (the resource is being created)
    pub is_create: bool,
}

/// Response from plan modifiers
pub struct PlanModifierResponse {
    pub plan_value: DynamicValue,
    pub requires_replace: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Default provides default values for optional attributes
/// Called when attribute is not set in configuration
pub trait Default: Send + Sync {
    /// Human-readable description
    fn description(&self) -> String;
    /// Provide default value
    fn default_value(&self, request: DefaultRequest) -> DefaultResponse;
}

/// Request for default values
pub struct DefaultRequest {
    pub path: AttributePath,
}

/// Response with default value
pub struct DefaultResponse {
    pub value: DynamicValue,
}

/// AttributeBuilder provides fluent API for building attributes
/// ALWAYS use this instead of constructing Attribute directly
pub struct AttributeBuilder {
    attribute: Attribute,
}

impl AttributeBuilder {
    /// Create a new attribute builder
    pub fn new(name: &str, type_: AttributeType) -> Self {
        Self {
            attribute: Attribute {
                name: name.to_string(),
                r#type: type_,
                description: String::new(),
                required: false,
                optional: false,
                computed: false,
                sensitive: false,
                validators: Vec::new(),
                plan_modifiers: Vec::new(),
                default: None,
                nested_type: None,
                deprecated: false,
            },
        }
    }

    /// Attribute made of nested attributes, e.g. a list of rule objects
    pub fn nested(name: &str, nested: NestedType) -> Self {
        let object = AttributeType::Object(
            nested
                .attributes
                .iter()
                .map(|a| (a.name.clone(), a.r#type.clone()))
                .collect(),
        );
        let r#type = match nested.nesting {
            ObjectNestingMode::Single => object,
            ObjectNestingMode::List => AttributeType::List(Box::new(object)),
            ObjectNestingMode::Set => AttributeType::Set(Box::new(object)),
            ObjectNestingMode::Map => AttributeType::Map(Box::new(object)),
        };
        let mut builder = Self::new(name, r#type);
        builder.attribute.nested_type = Some(nested);
        builder
    }

    /// Set description
    pub fn description(mut self, desc: &str) -> Self {
        self.attribute.description = desc.to_string();
        self
    }

    /// Mark as required
    pub fn required(mut self) -> Self {
        self.attribute.required = true;
        self.attribute.optional = false;
        self
    }

    /// Mark as optional
    pub fn optional(mut self) -> Self {
        self.attribute.optional = true;
        self.attribute.required = false;
        self
    }

    /// Mark as computed
    pub fn computed(mut self) -> Self {
        self.attribute.computed = true;
        self
    }

    /// Mark as sensitive (hidden)
    pub fn sensitive(mut self) -> Self {
        self.attribute.sensitive = true;
        self
    }

    /// Mark as deprecated
    pub fn deprecated(mut self) -> Self {
        self.attribute.deprecated = true;
        self
    }

    /// Add validator
    pub fn validator(mut self, validator: Box<dyn Validator>) -> Self {
        self.attribute.validators.push(Arc::from(validator));
        self
    }

    /// Add plan modifier
    pub fn plan_modifier(mut self, modifier: Box<dyn PlanModifier>) -> Self {
        self.attribute.plan_modifiers.push(Arc::from(modifier));
        self
    }

    /// Set default. Defaulted attributes are always optional and computed.
    pub fn default(mut self, default: Box<dyn Default>) -> Self {
        self.attribute.default = Some(Arc::from(default));
        self.attribute.optional = true;
        self.attribute.required = false;
        self.attribute.computed = true;
        self
    }

    /// Finalize the attribute
    pub fn build(self) -> Attribute {
        self.attribute
    }
}

/// SchemaBuilder provides fluent API for building schemas
/// ALWAYS use this for consistency
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    /// Create a new schema builder
    pub fn new() -> Self {
        Self {
            schema: Schema {
                version: 0,
                block: Block {
                    version: 0,
                    attributes: Vec::new(),
                    description: String::new(),
                    description_kind: StringKind::Markdown,
                    deprecated: false,
                },
            },
        }
    }

    /// Set schema version
    pub fn version(mut self, version: i64) -> Self {
        self.schema.version = version;
        self.schema.block.version = version;
        self
    }

    /// Add attribute
    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.schema.block.attributes.push(attr);
        self
    }

    /// Add several attributes at once, e.g. the shared labels/annotations pair
    pub fn attributes(mut self, attrs: impl IntoIterator<Item = Attribute>) -> Self {
        self.schema.block.attributes.extend(attrs);
        self
    }

    /// Set description
    pub fn description(mut self, desc: &str) -> Self {
        self.schema.block.description = desc.to_string();
        self
    }

    /// Set description kind
    pub fn description_kind(mut self, kind: StringKind) -> Self {
        self.schema.block.description_kind = kind;
        self
    }

    /// Mark as deprecated
    pub fn deprecated(mut self) -> Self {
        self.schema.block.deprecated = true;
        self
    }

    /// Finalize the schema
    pub fn build(self) -> Schema {
        self.schema
    }
}

impl std::default::Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org_schema() -> Schema {
        SchemaBuilder::new()
            .description("Test resource schema")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("labels", AttributeType::Map(Box::new(AttributeType::String)))
                    .optional()
                    .build(),
            )
            .build()
    }

    fn config(entries: Vec<(&str, Dynamic)>) -> DynamicValue {
        DynamicValue::new(Dynamic::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        ))
    }

    #[test]
    fn attribute_builder_creates_required_string() {
        let attr = AttributeBuilder::new("name", AttributeType::String)
            .description("The name of the resource")
            .required()
            .build();

        assert_eq!(attr.name, "name");
        assert!(matches!(attr.r#type, AttributeType::String));
        assert!(attr.required);
        assert!(!attr.optional);
        assert_eq!(attr.description, "The name of the resource");
    }

    #[test]
    fn type_json_matches_terraform_format() {
        let t = AttributeType::Set(Box::new(AttributeType::String));
        assert_eq!(t.to_json().to_string(), r#"["set","string"]"#);

        let obj = AttributeType::Object(HashMap::from([("port".to_string(), AttributeType::Number)]));
        assert_eq!(obj.to_json().to_string(), r#"["object",{"port":"number"}]"#);
    }

    #[test]
    fn validate_config_reports_missing_required() {
        let diags = org_schema().validate_config(&config(vec![]));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Missing required argument");
    }

    #[test]
    fn validate_config_rejects_read_only_and_wrong_types() {
        let diags = org_schema().validate_config(&config(vec![
            ("name", Dynamic::Number(1.0)),
            ("id", Dynamic::String("x".to_string())),
        ]));
        assert_eq!(diags.len(), 2);
        assert!(diags.iter().any(|d| d.summary == "Incorrect attribute value type"));
        assert!(diags
            .iter()
            .any(|d| d.summary == "Invalid Configuration for Read-Only Attribute"));
    }

    #[test]
    fn validate_config_skips_unknown_values() {
        let diags = org_schema().validate_config(&config(vec![("name", Dynamic::Unknown)]));
        assert!(diags.is_empty());
    }

    #[test]
    fn normalize_fills_missing_and_resolves_unknown() {
        let value = config(vec![
            ("name", Dynamic::String("org".to_string())),
            ("id", Dynamic::Unknown),
            ("stray", Dynamic::Bool(true)),
        ]);

        let normalized = org_schema().normalize(&value, true);
        let map = match normalized.value {
            Dynamic::Map(m) => m,
            other => panic!("expected map, got {:?}", other),
        };
        assert_eq!(map.len(), 3);
        assert_eq!(map["id"], Dynamic::Null);
        assert_eq!(map["labels"], Dynamic::Null);
        assert!(!map.contains_key("stray"));
    }

    #[test]
    fn nested_list_attribute_validates_each_element() {
        let schema = SchemaBuilder::new()
            .attribute(
                AttributeBuilder::nested(
                    "rules",
                    NestedType::list(vec![
                        AttributeBuilder::new("protocol", AttributeType::String)
                            .required()
                            .build(),
                        AttributeBuilder::new("ports", AttributeType::String)
                            .optional()
                            .build(),
                    ]),
                )
                .optional()
                .build(),
            )
            .build();

        let rule = Dynamic::Map(HashMap::from([(
            "ports".to_string(),
            Dynamic::String("443".to_string()),
        )]));
        let diags = schema.validate_config(&config(vec![("rules", Dynamic::List(vec![rule]))]));

        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].attribute.as_ref().unwrap().to_string(), "rules[0].protocol");
    }
}
