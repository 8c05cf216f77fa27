//! MultiApps controller API
//!
//! Multi-target applications are deployed by the MultiApps controller, which
//! lives next to the CF API (`https://deploy-service.<system domain>`). An
//! archive is uploaded to the space, then a DEPLOY operation is started and
//! polled until it finishes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use url::Url;

use super::client::Client;
use super::error::ApiError;
use super::jobs::PollState;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mta {
    pub metadata: MtaMetadata,
    #[serde(default)]
    pub modules: Vec<MtaModule>,
    #[serde(default)]
    pub services: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MtaMetadata {
    pub id: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MtaModule {
    pub module_name: String,
    pub app_name: String,
    #[serde(default)]
    pub created_on: Option<String>,
    #[serde(default)]
    pub updated_on: Option<String>,
    #[serde(default)]
    pub provided_dendency_names: Vec<String>,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub uris: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub digest: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub process_id: String,
    #[serde(default)]
    pub process_type: String,
    #[serde(default)]
    pub mta_id: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub messages: Vec<OperationMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationMessage {
    #[serde(default)]
    pub text: String,
    #[serde(rename = "type", default)]
    pub message_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartOperationRequest {
    process_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
    parameters: HashMap<String, String>,
}

/// Derive the MultiApps controller URL from the CF API URL
pub fn default_deploy_url(api_url: &str) -> String {
    let Ok(mut url) = Url::parse(api_url) else {
        return api_url.to_string();
    };
    let host = url.host_str().unwrap_or_default();
    if let Some(domain) = host.strip_prefix("api.") {
        let host = format!("deploy-service.{}", domain);
        if url.set_host(Some(&host)).is_err() {
            return api_url.to_string();
        }
    }
    url.as_str().trim_end_matches('/').to_string()
}

pub struct MtasApi<'a> {
    client: &'a Client,
    base_url: String,
}

impl<'a> MtasApi<'a> {
    pub fn new(client: &'a Client, deploy_url: Option<&str>) -> Self {
        let base_url = deploy_url
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| default_deploy_url(client.base_url()));
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, space_guid: &str, path: &str) -> String {
        format!("{}/api/v1/spaces/{}{}", self.base_url, space_guid, path)
    }

    /// GET /api/v1/spaces/{space}/mtas
    pub async fn list(&self, space_guid: &str) -> Result<Vec<Mta>, ApiError> {
        self.client.get(&self.url(space_guid, "/mtas")).await
    }

    /// GET /api/v1/spaces/{space}/mtas/{id}
    pub async fn get(&self, space_guid: &str, mta_id: &str) -> Result<Mta, ApiError> {
        self.client
            .get(&self.url(space_guid, &format!("/mtas/{}", mta_id)))
            .await
    }

    /// POST /api/v1/spaces/{space}/files
    pub async fn upload_file(
        &self,
        space_guid: &str,
        path: &Path,
        namespace: Option<&str>,
    ) -> Result<FileMetadata, ApiError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| {
                ApiError::InvalidInput(format!("{} is not a file path", path.display()))
            })?;
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/octet-stream")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let mut url = self.url(space_guid, "/files");
        if let Some(namespace) = namespace {
            url = format!("{}?namespace={}", url, urlencoding::encode(namespace));
        }

        let response = self
            .client
            .send(self.client.http().post(&url).multipart(form))
            .await?;
        super::client::parse_body(response).await
    }

    /// Start a DEPLOY operation for an uploaded archive and wait for it.
    /// Returns the finished operation, which names the deployed MTA.
    pub async fn deploy(
        &self,
        space_guid: &str,
        archive_id: &str,
        extension_descriptor_ids: &[String],
        namespace: Option<&str>,
    ) -> Result<Operation, ApiError> {
        let mut parameters = HashMap::new();
        parameters.insert("appArchiveId".to_string(), archive_id.to_string());
        if !extension_descriptor_ids.is_empty() {
            parameters.insert(
                "mtaExtDescriptorId".to_string(),
                extension_descriptor_ids.join(","),
            );
        }
        self.run_operation(
            space_guid,
            StartOperationRequest {
                process_type: "DEPLOY",
                namespace: namespace.map(|n| n.to_string()),
                parameters,
            },
        )
        .await
    }

    /// Start an UNDEPLOY operation and wait for it
    pub async fn undeploy(
        &self,
        space_guid: &str,
        mta_id: &str,
        namespace: Option<&str>,
    ) -> Result<Operation, ApiError> {
        let mut parameters = HashMap::new();
        parameters.insert("mtaId".to_string(), mta_id.to_string());
        self.run_operation(
            space_guid,
            StartOperationRequest {
                process_type: "UNDEPLOY",
                namespace: namespace.map(|n| n.to_string()),
                parameters,
            },
        )
        .await
    }

    pub async fn get_operation(
        &self,
        space_guid: &str,
        operation_id: &str,
    ) -> Result<Operation, ApiError> {
        self.client
            .get(&self.url(
                space_guid,
                &format!("/operations/{}?embed=messages", operation_id),
            ))
            .await
    }

    async fn run_operation(
        &self,
        space_guid: &str,
        request: StartOperationRequest,
    ) -> Result<Operation, ApiError> {
        let started: Operation = self
            .client
            .post(&self.url(space_guid, "/operations"), &request)
            .await?;
        tracing::debug!(
            "Started {} operation {}",
            request.process_type,
            started.process_id
        );

        let what = format!("MTA operation {}", started.process_id);
        let operation_id = started.process_id.as_str();
        self.client
            .poll_until(&what, move || async move {
                let operation = self.get_operation(space_guid, operation_id).await?;
                match operation.state.as_deref() {
                    Some("FINISHED") => Ok(PollState::Done(operation)),
                    Some(state @ ("ERROR" | "ABORTED")) => {
                        for message in &operation.messages {
                            tracing::warn!(operation = %operation.process_id, "{}", message.text);
                        }
                        Err(ApiError::OperationFailed {
                            operation: format!(
                                "{} {}",
                                operation.process_type, operation.process_id
                            ),
                            state: state.to_string(),
                        })
                    }
                    _ => Ok(PollState::Pending),
                }
            })
            .await
    }
}
