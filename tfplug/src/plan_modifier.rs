//! Built-in plan modifiers
//!
//! Plan modifiers run after Terraform has produced the proposed new state and
//! can adjust the planned value of an attribute or mark it as forcing
//! replacement of the whole resource.

use crate::schema::{PlanModifier, PlanModifierRequest, PlanModifierResponse};
use crate::types::Dynamic;

/// Marks an attribute as requiring replacement when it changes
pub struct RequiresReplace;

impl RequiresReplace {
    pub fn create() -> Box<dyn PlanModifier> {
        Box::new(Self)
    }
}

impl PlanModifier for RequiresReplace {
    fn description(&self) -> String {
        "changing this value forces a new resource".to_string()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        let state = &request.state_value.value;
        let plan = &request.plan_value.value;

        let requires_replace = !request.is_create
            && !matches!(
                (state, plan),
                (Dynamic::Null, Dynamic::Null) | (Dynamic::Unknown, _) | (_, Dynamic::Unknown)
            )
            && !values_equal(state, plan);

        PlanModifierResponse {
            plan_value: request.plan_value,
            requires_replace,
            diagnostics: vec![],
        }
    }
}

/// A plan modifier that uses the current state value when the planned value is unknown
///
/// Useful for computed attributes that never change after creation, such as
/// `id` or `created_at`, so they do not show up as "known after apply".
pub struct UseStateForUnknown;

impl UseStateForUnknown {
    pub fn create() -> Box<dyn PlanModifier> {
        Box::new(Self)
    }
}

impl PlanModifier for UseStateForUnknown {
    fn description(&self) -> String {
        "value does not change after creation".to_string()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        let plan_value = match (&request.plan_value.value, &request.state_value.value) {
            (Dynamic::Unknown, Dynamic::Null) => request.plan_value,
            (Dynamic::Unknown, _) => request.state_value,
            _ => request.plan_value,
        };

        PlanModifierResponse {
            plan_value,
            requires_replace: false,
            diagnostics: vec![],
        }
    }
}

/// Structural equality where list order matters and numbers compare with a tolerance
pub fn values_equal(a: &Dynamic, b: &Dynamic) -> bool {
    match (a, b) {
        (Dynamic::Null, Dynamic::Null) => true,
        (Dynamic::Unknown, Dynamic::Unknown) => true,
        (Dynamic::Bool(a), Dynamic::Bool(b)) => a == b,
        (Dynamic::Number(a), Dynamic::Number(b)) => (a - b).abs() < f64::EPSILON,
        (Dynamic::String(a), Dynamic::String(b)) => a == b,
        (Dynamic::List(a), Dynamic::List(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| values_equal(x, y))
        }
        (Dynamic::Map(a), Dynamic::Map(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|v2| values_equal(v, v2)))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttributePath, DynamicValue};
    use std::collections::HashMap;

    fn request(state: Dynamic, plan: Dynamic, is_create: bool) -> PlanModifierRequest {
        PlanModifierRequest {
            config_value: DynamicValue::new(plan.clone()),
            state_value: DynamicValue::new(state),
            plan_value: DynamicValue::new(plan),
            path: AttributePath::new("org"),
            is_create,
        }
    }

    #[test]
    fn requires_replace_does_not_trigger_on_same_value() {
        let response = RequiresReplace.modify(request(
            Dynamic::String("hello".to_string()),
            Dynamic::String("hello".to_string()),
            false,
        ));

        assert!(!response.requires_replace);
        assert!(response.diagnostics.is_empty());
    }

    #[test]
    fn requires_replace_triggers_on_different_value() {
        let response = RequiresReplace.modify(request(
            Dynamic::String("hello".to_string()),
            Dynamic::String("world".to_string()),
            false,
        ));

        assert!(response.requires_replace);
    }

    #[test]
    fn requires_replace_ignores_creates_and_unknowns() {
        let on_create = RequiresReplace.modify(request(
            Dynamic::Null,
            Dynamic::String("world".to_string()),
            true,
        ));
        assert!(!on_create.requires_replace);

        let unknown_plan = RequiresReplace.modify(request(
            Dynamic::String("value".to_string()),
            Dynamic::Unknown,
            false,
        ));
        assert!(!unknown_plan.requires_replace);
    }

    #[test]
    fn use_state_for_unknown_preserves_state_when_unknown() {
        let response = UseStateForUnknown.modify(request(
            Dynamic::String("existing-value".to_string()),
            Dynamic::Unknown,
            false,
        ));

        assert_eq!(
            response.plan_value.value,
            Dynamic::String("existing-value".to_string())
        );
        assert!(!response.requires_replace);
    }

    #[test]
    fn use_state_for_unknown_keeps_unknown_on_create() {
        let response = UseStateForUnknown.modify(request(Dynamic::Null, Dynamic::Unknown, true));
        assert!(response.plan_value.is_unknown());
    }

    #[test]
    fn values_equal_handles_nested_values() {
        assert!(values_equal(&Dynamic::Number(42.0), &Dynamic::Number(42.0)));
        assert!(!values_equal(&Dynamic::Bool(true), &Dynamic::Bool(false)));

        let map1 = HashMap::from([("key".to_string(), Dynamic::String("value".to_string()))]);
        let map2 = HashMap::from([("key".to_string(), Dynamic::String("other".to_string()))]);
        assert!(values_equal(&Dynamic::Map(map1.clone()), &Dynamic::Map(map1.clone())));
        assert!(!values_equal(&Dynamic::Map(map1), &Dynamic::Map(map2)));
    }
}
