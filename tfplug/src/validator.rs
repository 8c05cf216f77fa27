//! Built-in attribute validators
//!
//! Validators are attached to attributes with `AttributeBuilder::validator` and
//! run during ValidateResourceConfig / ValidateDataResourceConfig on known,
//! non-null values. Cross-attribute rules are expressed with the helper
//! functions at the bottom of this module from a resource's `validate`.

use crate::schema::{Validator, ValidatorRequest, ValidatorResponse};
use crate::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

pub struct StringLengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl StringLengthValidator {
    pub fn min(min: usize) -> Box<dyn Validator> {
        Box::new(Self {
            min: Some(min),
            max: None,
        })
    }

    pub fn between(min: usize, max: usize) -> Box<dyn Validator> {
        Box::new(Self {
            min: Some(min),
            max: Some(max),
        })
    }
}

impl Validator for StringLengthValidator {
    fn description(&self) -> String {
        format!("string length must be within {:?}..{:?}", self.min, self.max)
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = vec![];
        if let Some(s) = request.config_value.value.as_string() {
            let len = s.chars().count();
            if let Some(min) = self.min {
                if len < min {
                    diagnostics.push(
                        Diagnostic::error(
                            format!("{} must have minimum length of {}", request.path, min),
                            format!("Got length {}", len),
                        )
                        .with_attribute(request.path.clone()),
                    );
                }
            }
            if let Some(max) = self.max {
                if len > max {
                    diagnostics.push(
                        Diagnostic::error(
                            format!("{} must have maximum length of {}", request.path, max),
                            format!("Got length {}", len),
                        )
                        .with_attribute(request.path.clone()),
                    );
                }
            }
        }
        ValidatorResponse { diagnostics }
    }
}

/// Matches string values against a regular expression. An invalid pattern
/// is reported as a diagnostic on the attribute instead of a panic.
pub struct StringPatternValidator {
    pub pattern: String,
    pub description: String,
}

impl StringPatternValidator {
    pub fn create(pattern: &str, description: &str) -> Box<dyn Validator> {
        Box::new(Self {
            pattern: pattern.to_string(),
            description: description.to_string(),
        })
    }
}

impl Validator for StringPatternValidator {
    fn description(&self) -> String {
        format!("value must be {}", self.description)
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = vec![];
        let Some(s) = request.config_value.value.as_string() else {
            return ValidatorResponse { diagnostics };
        };
        match regex::Regex::new(&self.pattern) {
            Ok(re) if re.is_match(s) => {}
            Ok(_) => diagnostics.push(
                Diagnostic::error(
                    format!("{} must be {}", request.path, self.description),
                    format!("Value '{}' does not match {}", s, self.pattern),
                )
                .with_attribute(request.path.clone()),
            ),
            Err(e) => diagnostics.push(
                Diagnostic::error("Invalid validation pattern", e.to_string())
                    .with_attribute(request.path.clone()),
            ),
        }
        ValidatorResponse { diagnostics }
    }
}

/// Accepts only one of a fixed set of strings
pub struct StringOneOfValidator {
    pub values: Vec<String>,
}

impl StringOneOfValidator {
    pub fn create(values: &[&str]) -> Box<dyn Validator> {
        Box::new(Self {
            values: values.iter().map(|v| v.to_string()).collect(),
        })
    }
}

impl Validator for StringOneOfValidator {
    fn description(&self) -> String {
        format!("value must be one of: {}", self.values.join(", "))
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = vec![];
        if let Some(s) = request.config_value.value.as_string() {
            if !self.values.iter().any(|v| v == s) {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid Attribute Value Match",
                        format!(
                            "Attribute {} value must be one of: [{}], got: \"{}\"",
                            request.path,
                            self.values
                                .iter()
                                .map(|v| format!("\"{}\"", v))
                                .collect::<Vec<_>>()
                                .join(" "),
                            s
                        ),
                    )
                    .with_attribute(request.path.clone()),
                );
            }
        }
        ValidatorResponse { diagnostics }
    }
}

/// Checks that a string, or every element of a list/set of strings, is a UUID
pub struct UuidValidator;

impl UuidValidator {
    pub fn create() -> Box<dyn Validator> {
        Box::new(Self)
    }
}

impl Validator for UuidValidator {
    fn description(&self) -> String {
        "value must be a valid UUID".to_string()
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = vec![];
        let check = |value: &Dynamic, path: AttributePath, diagnostics: &mut Vec<Diagnostic>| {
            if let Some(s) = value.as_string() {
                if uuid::Uuid::parse_str(s).is_err() {
                    diagnostics.push(
                        Diagnostic::error(
                            "Invalid Attribute Value",
                            format!("Attribute {} value must be a valid UUID, got: {}", path, s),
                        )
                        .with_attribute(path),
                    );
                }
            }
        };

        match &request.config_value.value {
            Dynamic::List(items) => {
                for (idx, item) in items.iter().enumerate() {
                    check(item, request.path.clone().index(idx as i64), &mut diagnostics);
                }
            }
            value => check(value, request.path.clone(), &mut diagnostics),
        }
        ValidatorResponse { diagnostics }
    }
}

pub struct NumberRangeValidator {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumberRangeValidator {
    pub fn at_least(min: f64) -> Box<dyn Validator> {
        Box::new(Self {
            min: Some(min),
            max: None,
        })
    }
}

impl Validator for NumberRangeValidator {
    fn description(&self) -> String {
        format!("number must be within {:?}..{:?}", self.min, self.max)
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = vec![];
        if let Some(n) = request.config_value.value.as_number() {
            if let Some(min) = self.min {
                if n < min {
                    diagnostics.push(
                        Diagnostic::error(
                            format!("{} must be at least {}", request.path, min),
                            format!("Got {}", n),
                        )
                        .with_attribute(request.path.clone()),
                    );
                }
            }
            if let Some(max) = self.max {
                if n > max {
                    diagnostics.push(
                        Diagnostic::error(
                            format!("{} must be at most {}", request.path, max),
                            format!("Got {}", n),
                        )
                        .with_attribute(request.path.clone()),
                    );
                }
            }
        }
        ValidatorResponse { diagnostics }
    }
}

fn is_set(config: &DynamicValue, name: &str) -> bool {
    config
        .get(&AttributePath::new(name))
        .is_some_and(|v| !v.is_null())
}

fn any_unknown(config: &DynamicValue, names: &[&str]) -> bool {
    names.iter().any(|name| {
        config
            .get(&AttributePath::new(name))
            .is_some_and(Dynamic::is_unknown)
    })
}

/// Error unless at least one of `names` is set. Unknown values pass.
pub fn at_least_one_of(config: &DynamicValue, names: &[&str]) -> Option<Diagnostic> {
    if any_unknown(config, names) || names.iter().any(|name| is_set(config, name)) {
        return None;
    }
    Some(Diagnostic::error(
        "Invalid Attribute Combination",
        format!("At least one attribute out of [{}] must be specified", names.join(",")),
    ))
}

/// Error unless exactly one of `names` is set. Unknown values pass.
pub fn exactly_one_of(config: &DynamicValue, names: &[&str]) -> Option<Diagnostic> {
    if any_unknown(config, names) {
        return None;
    }
    let count = names.iter().filter(|name| is_set(config, name)).count();
    if count == 1 {
        return None;
    }
    Some(Diagnostic::error(
        "Invalid Attribute Combination",
        format!("Exactly one of these attributes must be configured: [{}]", names.join(",")),
    ))
}

/// Error when `name` is set together with any of `others`
pub fn conflicts_with(config: &DynamicValue, name: &str, others: &[&str]) -> Option<Diagnostic> {
    if !is_set(config, name) {
        return None;
    }
    let conflicting: Vec<&str> = others
        .iter()
        .copied()
        .filter(|other| is_set(config, other))
        .collect();
    if conflicting.is_empty() {
        return None;
    }
    Some(
        Diagnostic::error(
            "Invalid Attribute Combination",
            format!(
                "Attribute \"{}\" cannot be specified when \"{}\" is specified",
                conflicting.join(","),
                name
            ),
        )
        .with_attribute(AttributePath::new(name)),
    )
}

/// Error when `name` is set without every one of `required`
pub fn also_requires(config: &DynamicValue, name: &str, required: &[&str]) -> Option<Diagnostic> {
    if !is_set(config, name) || any_unknown(config, required) {
        return None;
    }
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|other| !is_set(config, other))
        .collect();
    if missing.is_empty() {
        return None;
    }
    Some(
        Diagnostic::error(
            "Invalid Attribute Combination",
            format!(
                "Attribute \"{}\" must be specified when \"{}\" is specified",
                missing.join(","),
                name
            ),
        )
        .with_attribute(AttributePath::new(name)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn run(validator: Box<dyn Validator>, value: Dynamic) -> Vec<Diagnostic> {
        validator
            .validate(ValidatorRequest {
                config_value: DynamicValue::new(value),
                config: DynamicValue::null(),
                path: AttributePath::new("field"),
            })
            .diagnostics
    }

    fn config(entries: Vec<(&str, Dynamic)>) -> DynamicValue {
        DynamicValue::new(Dynamic::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect::<HashMap<_, _>>(),
        ))
    }

    #[test]
    fn string_length_validator_rejects_too_short() {
        let diags = run(StringLengthValidator::min(1), Dynamic::String(String::new()));
        assert_eq!(diags.len(), 1);
        assert!(diags[0].summary.contains("minimum length"));
    }

    #[test]
    fn string_pattern_validator_rejects_non_matching() {
        let validator = StringPatternValidator::create(
            r"^[a-z]+$",
            "lowercase letters",
        );
        assert!(run(validator, Dynamic::String("Invalid1".to_string()))[0]
            .summary
            .contains("lowercase letters"));
    }

    #[test]
    fn string_one_of_accepts_listed_values() {
        let validator = StringOneOfValidator::create(&["STARTED", "STOPPED"]);
        assert!(run(validator, Dynamic::String("STARTED".to_string())).is_empty());

        let validator = StringOneOfValidator::create(&["STARTED", "STOPPED"]);
        assert_eq!(run(validator, Dynamic::String("RUNNING".to_string())).len(), 1);
    }

    #[test]
    fn uuid_validator_checks_strings_and_lists() {
        assert!(run(
            UuidValidator::create(),
            Dynamic::String("4f1b4c2e-3a6d-4e8b-9f7a-1c2d3e4f5a6b".to_string())
        )
        .is_empty());

        let diags = run(
            UuidValidator::create(),
            Dynamic::List(vec![
                Dynamic::String("4f1b4c2e-3a6d-4e8b-9f7a-1c2d3e4f5a6b".to_string()),
                Dynamic::String("not-a-uuid".to_string()),
            ]),
        );
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].attribute.as_ref().unwrap().to_string(), "field[1]");
    }

    #[test]
    fn number_range_validator_rejects_too_small() {
        let diags = run(NumberRangeValidator::at_least(1.0), Dynamic::Number(0.0));
        assert_eq!(diags.len(), 1);
        assert!(diags[0].summary.contains("at least"));
    }

    #[test]
    fn string_pattern_validator_reports_broken_pattern() {
        let diags = run(
            StringPatternValidator::create("(", "anything"),
            Dynamic::String("x".to_string()),
        );
        assert_eq!(diags[0].summary, "Invalid validation pattern");
    }

    #[test]
    fn cross_attribute_helpers() {
        let cfg = config(vec![
            ("space", Dynamic::Null),
            ("org", Dynamic::Null),
            ("user", Dynamic::String("u".to_string())),
            ("username", Dynamic::String("name".to_string())),
        ]);

        assert!(at_least_one_of(&cfg, &["space", "org"]).is_some());
        assert!(exactly_one_of(&cfg, &["user", "username"]).is_some());
        assert!(conflicts_with(&cfg, "user", &["username"]).is_some());
        assert!(also_requires(&cfg, "username", &["org"]).is_some());

        let unknown = config(vec![("space", Dynamic::Unknown), ("org", Dynamic::Null)]);
        assert!(at_least_one_of(&unknown, &["space", "org"]).is_none());
    }
}
