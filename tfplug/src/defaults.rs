//! Static attribute defaults
//!
//! Planning substitutes the default for an attribute left null in the
//! configuration, so an attribute carrying one is both optional and computed.

use crate::schema::{Default, DefaultRequest, DefaultResponse};
use crate::types::{Dynamic, DynamicValue};

pub struct StaticDefault {
    value: Dynamic,
}

impl StaticDefault {
    pub fn string(value: &str) -> Box<dyn Default> {
        Box::new(Self {
            value: Dynamic::String(value.to_string()),
        })
    }

    pub fn bool(value: bool) -> Box<dyn Default> {
        Box::new(Self {
            value: Dynamic::Bool(value),
        })
    }
}

impl Default for StaticDefault {
    fn description(&self) -> String {
        match &self.value {
            Dynamic::String(s) => format!("defaults to \"{}\"", s),
            Dynamic::Bool(b) => format!("defaults to {}", b),
            other => format!("defaults to {:?}", other),
        }
    }

    fn default_value(&self, _request: DefaultRequest) -> DefaultResponse {
        DefaultResponse {
            value: DynamicValue::new(self.value.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttributePath;

    fn resolve(default: &dyn Default) -> Dynamic {
        default
            .default_value(DefaultRequest {
                path: AttributePath::new("state"),
            })
            .value
            .value
    }

    #[test]
    fn app_state_defaults_to_started() {
        let default = StaticDefault::string("STARTED");
        assert_eq!(resolve(default.as_ref()), Dynamic::String("STARTED".into()));
        assert_eq!(default.description(), "defaults to \"STARTED\"");
    }

    #[test]
    fn boolean_default() {
        let default = StaticDefault::bool(false);
        assert_eq!(resolve(default.as_ref()), Dynamic::Bool(false));
        assert_eq!(default.description(), "defaults to false");
    }
}
