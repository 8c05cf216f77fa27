//! Common types and utilities for the Cloud Foundry v3 API

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One entry of the CF error envelope `{"errors": [...]}`
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CfErrorDetail {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub detail: String,
}

impl std::fmt::Display for CfErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({}): {}", self.title, self.code, self.detail)
    }
}

#[derive(Debug, Deserialize)]
pub struct CfErrorResponse {
    #[serde(default)]
    pub errors: Vec<CfErrorDetail>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Metadata {
    #[serde(default)]
    pub labels: HashMap<String, Option<String>>,
    #[serde(default)]
    pub annotations: HashMap<String, Option<String>>,
}

impl Metadata {
    /// Labels with null values dropped
    pub fn label_map(&self) -> HashMap<String, String> {
        flatten_values(&self.labels)
    }

    pub fn annotation_map(&self) -> HashMap<String, String> {
        flatten_values(&self.annotations)
    }
}

fn flatten_values(values: &HashMap<String, Option<String>>) -> HashMap<String, String> {
    values
        .iter()
        .filter_map(|(k, v)| v.as_ref().map(|v| (k.clone(), v.clone())))
        .collect()
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Link {
    pub href: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct GuidRef {
    pub guid: String,
}

impl GuidRef {
    pub fn new(guid: impl Into<String>) -> Self {
        Self { guid: guid.into() }
    }
}

/// To-one relationship `{"data": {"guid": ...}}`, data is null when unset
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ToOneRelationship {
    pub data: Option<GuidRef>,
}

impl ToOneRelationship {
    pub fn new(guid: impl Into<String>) -> Self {
        Self {
            data: Some(GuidRef::new(guid)),
        }
    }

    pub fn guid(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.guid.as_str())
    }
}

/// To-many relationship `{"data": [{"guid": ...}, ...]}`
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ToManyRelationship {
    #[serde(default)]
    pub data: Vec<GuidRef>,
}

impl ToManyRelationship {
    pub fn new<I, S>(guids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            data: guids.into_iter().map(GuidRef::new).collect(),
        }
    }

    pub fn guids(&self) -> Vec<String> {
        self.data.iter().map(|d| d.guid.clone()).collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub total_results: u64,
    #[serde(default)]
    pub total_pages: u64,
    pub next: Option<Link>,
}

/// One page of a list endpoint
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub pagination: Pagination,
    pub resources: Vec<T>,
}

/// Query string builder for list endpoints
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    params: Vec<(String, String)>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    pub fn add_optional<K: Into<String>, V: ToString>(mut self, key: K, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.params.push((key.into(), v.to_string()));
        }
        self
    }

    /// CF list filters take comma separated values, e.g. `names=a,b`
    pub fn add_list<K: Into<String>, V: AsRef<str>>(mut self, key: K, values: &[V]) -> Self {
        if !values.is_empty() {
            let joined = values
                .iter()
                .map(|v| v.as_ref())
                .collect::<Vec<_>>()
                .join(",");
            self.params.push((key.into(), joined));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn to_query_string(&self) -> String {
        if self.params.is_empty() {
            String::new()
        } else {
            format!(
                "?{}",
                self.params
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
                    .collect::<Vec<_>>()
                    .join("&")
            )
        }
    }
}

/// Labels and annotations in a create or update body. `None` values delete
/// the key on update.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct MetadataRequest {
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, Option<String>>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub annotations: HashMap<String, Option<String>>,
}

impl MetadataRequest {
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty() && self.annotations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_options_join_and_encode_values() {
        let query = ListOptions::new()
            .add_list("names", &["my org", "other"])
            .add_optional("types", None::<String>)
            .add("per_page", 50)
            .to_query_string();

        assert_eq!(query, "?names=my%20org%2Cother&per_page=50");
    }

    #[test]
    fn empty_list_options_produce_no_query() {
        let options = ListOptions::new().add_list::<_, String>("guids", &[]);
        assert!(options.is_empty());
        assert_eq!(options.to_query_string(), "");
    }

    #[test]
    fn relationships_deserialize_null_and_arrays() {
        let one: ToOneRelationship = serde_json::from_str(r#"{"data": null}"#).unwrap();
        assert_eq!(one.guid(), None);

        let many: ToManyRelationship =
            serde_json::from_str(r#"{"data": [{"guid": "a"}, {"guid": "b"}]}"#).unwrap();
        assert_eq!(many.guids(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn metadata_drops_null_values() {
        let metadata: Metadata = serde_json::from_str(
            r#"{"labels": {"env": "dev", "gone": null}, "annotations": {}}"#,
        )
        .unwrap();

        let labels = metadata.label_map();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels["env"], "dev");
    }
}
