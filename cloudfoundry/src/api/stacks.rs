//! Stack API implementation

use serde::Deserialize;

use super::client::Client;
use super::common::{ListOptions, Metadata};
use super::error::ApiError;

#[derive(Debug, Clone, Deserialize)]
pub struct Stack {
    pub guid: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub build_rootfs_image: Option<String>,
    #[serde(default)]
    pub run_rootfs_image: Option<String>,
    #[serde(default)]
    pub default: bool,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub metadata: Metadata,
}

pub struct StacksApi<'a> {
    client: &'a Client,
}

impl<'a> StacksApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /v3/stacks
    pub async fn list(&self, options: &ListOptions) -> Result<Vec<Stack>, ApiError> {
        self.client.list_all("/v3/stacks", options).await
    }

    /// GET /v3/stacks/{guid}
    pub async fn get(&self, guid: &str) -> Result<Stack, ApiError> {
        self.client.get(&format!("/v3/stacks/{}", guid)).await
    }
}
