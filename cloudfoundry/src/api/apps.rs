//! Application API implementation
//!
//! Apps are created empty. Code arrives through a package (docker image or
//! uploaded bits), which is staged by a build into a droplet that becomes the
//! app's current droplet.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use super::client::Client;
use super::common::{GuidRef, ListOptions, Metadata, MetadataRequest, ToOneRelationship};
use super::error::ApiError;
use super::jobs::PollState;

#[derive(Debug, Clone, Deserialize)]
pub struct App {
    pub guid: String,
    pub name: String,
    pub state: String,
    pub created_at: String,
    pub updated_at: String,
    pub lifecycle: Lifecycle,
    pub relationships: AppRelationships,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Lifecycle {
    #[serde(rename = "type")]
    pub lifecycle_type: String,
    #[serde(default)]
    pub data: LifecycleData,
}

impl Lifecycle {
    pub fn docker() -> Self {
        Self {
            lifecycle_type: "docker".to_string(),
            data: LifecycleData::default(),
        }
    }

    pub fn buildpack(buildpacks: Vec<String>, stack: Option<String>) -> Self {
        Self {
            lifecycle_type: "buildpack".to_string(),
            data: LifecycleData { buildpacks, stack },
        }
    }

    pub fn is_docker(&self) -> bool {
        self.lifecycle_type == "docker"
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct LifecycleData {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buildpacks: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppRelationships {
    pub space: ToOneRelationship,
}

#[derive(Debug, Serialize)]
pub struct CreateAppRequest {
    pub name: String,
    pub relationships: AppRelationships,
    pub lifecycle: Lifecycle,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub environment_variables: HashMap<String, String>,
    #[serde(skip_serializing_if = "MetadataRequest::is_empty")]
    pub metadata: MetadataRequest,
}

#[derive(Debug, Default, Serialize)]
pub struct UpdateAppRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifecycle: Option<Lifecycle>,
    #[serde(skip_serializing_if = "MetadataRequest::is_empty")]
    pub metadata: MetadataRequest,
}

#[derive(Debug, Deserialize, Serialize)]
struct EnvironmentVariables {
    var: HashMap<String, Option<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Package {
    pub guid: String,
    #[serde(rename = "type")]
    pub package_type: String,
    pub state: String,
}

/// Registry credentials for private docker images
#[derive(Debug, Clone, Serialize)]
pub struct DockerCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
struct CreatePackageRequest<'a> {
    #[serde(rename = "type")]
    package_type: &'a str,
    relationships: PackageRelationships,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<DockerPackageData<'a>>,
}

#[derive(Debug, Serialize)]
struct PackageRelationships {
    app: ToOneRelationship,
}

#[derive(Debug, Serialize)]
struct DockerPackageData<'a> {
    image: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Build {
    pub guid: String,
    pub state: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub droplet: Option<GuidRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Process {
    pub guid: String,
    #[serde(rename = "type")]
    pub process_type: String,
    pub instances: i64,
    pub memory_in_mb: i64,
    pub disk_in_mb: i64,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub health_check: Option<HealthCheck>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthCheck {
    #[serde(rename = "type")]
    pub check_type: String,
}

#[derive(Debug, Default, Serialize)]
pub struct ScaleRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instances: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_in_mb: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_in_mb: Option<i64>,
}

/// Apps API for application operations
pub struct AppsApi<'a> {
    client: &'a Client,
}

impl<'a> AppsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /v3/apps
    pub async fn list(&self, options: &ListOptions) -> Result<Vec<App>, ApiError> {
        self.client.list_all("/v3/apps", options).await
    }

    /// GET /v3/apps/{guid}
    pub async fn get(&self, guid: &str) -> Result<App, ApiError> {
        self.client.get(&format!("/v3/apps/{}", guid)).await
    }

    /// POST /v3/apps
    pub async fn create(&self, request: &CreateAppRequest) -> Result<App, ApiError> {
        self.client.post("/v3/apps", request).await
    }

    /// PATCH /v3/apps/{guid}
    pub async fn update(&self, guid: &str, request: &UpdateAppRequest) -> Result<App, ApiError> {
        self.client
            .patch(&format!("/v3/apps/{}", guid), request)
            .await
    }

    /// DELETE /v3/apps/{guid}, waits for the deletion job
    pub async fn delete(&self, guid: &str) -> Result<(), ApiError> {
        self.client
            .delete_and_wait(&format!("/v3/apps/{}", guid))
            .await
    }

    /// GET /v3/apps/{guid}/environment_variables
    pub async fn environment_variables(
        &self,
        guid: &str,
    ) -> Result<HashMap<String, String>, ApiError> {
        let env: EnvironmentVariables = self
            .client
            .get(&format!("/v3/apps/{}/environment_variables", guid))
            .await?;
        Ok(env
            .var
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect())
    }

    /// PATCH /v3/apps/{guid}/environment_variables. `None` values unset the
    /// variable.
    pub async fn update_environment_variables(
        &self,
        guid: &str,
        vars: HashMap<String, Option<String>>,
    ) -> Result<(), ApiError> {
        self.client
            .patch::<EnvironmentVariables, _>(
                &format!("/v3/apps/{}/environment_variables", guid),
                &EnvironmentVariables { var: vars },
            )
            .await
            .map(|_| ())
    }

    /// POST /v3/packages for a docker image
    pub async fn create_docker_package(
        &self,
        app_guid: &str,
        image: &str,
        credentials: Option<&DockerCredentials>,
    ) -> Result<Package, ApiError> {
        let request = CreatePackageRequest {
            package_type: "docker",
            relationships: PackageRelationships {
                app: ToOneRelationship::new(app_guid),
            },
            data: Some(DockerPackageData {
                image,
                username: credentials.map(|c| c.username.as_str()),
                password: credentials.map(|c| c.password.as_str()),
            }),
        };
        self.client.post("/v3/packages", &request).await
    }

    /// POST /v3/packages for uploaded bits
    pub async fn create_bits_package(&self, app_guid: &str) -> Result<Package, ApiError> {
        let request = CreatePackageRequest {
            package_type: "bits",
            relationships: PackageRelationships {
                app: ToOneRelationship::new(app_guid),
            },
            data: None,
        };
        self.client.post("/v3/packages", &request).await
    }

    /// POST /v3/packages/{guid}/upload with the zip at `path`, then wait
    /// until the package is READY
    pub async fn upload_bits(&self, package_guid: &str, path: &Path) -> Result<Package, ApiError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "app.zip".to_string());
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/zip")?;
        let form = reqwest::multipart::Form::new().part("bits", part);

        self.client
            .post_multipart::<Package>(&format!("/v3/packages/{}/upload", package_guid), form)
            .await?;
        self.wait_for_package(package_guid).await
    }

    pub async fn get_package(&self, guid: &str) -> Result<Package, ApiError> {
        self.client.get(&format!("/v3/packages/{}", guid)).await
    }

    async fn wait_for_package(&self, guid: &str) -> Result<Package, ApiError> {
        let what = format!("package {}", guid);
        self.client
            .poll_until(&what, move || async move {
                let package = self.get_package(guid).await?;
                match package.state.as_str() {
                    "READY" => Ok(PollState::Done(package)),
                    "FAILED" | "EXPIRED" => Err(ApiError::OperationFailed {
                        operation: format!("package {}", package.guid),
                        state: package.state,
                    }),
                    _ => Ok(PollState::Pending),
                }
            })
            .await
    }

    /// POST /v3/builds and wait until the build is STAGED
    pub async fn stage(&self, package_guid: &str) -> Result<Build, ApiError> {
        let build: Build = self
            .client
            .post(
                "/v3/builds",
                &serde_json::json!({ "package": { "guid": package_guid } }),
            )
            .await?;
        tracing::debug!("Staging package {} in build {}", package_guid, build.guid);

        let what = format!("build {}", build.guid);
        let build_guid = build.guid.as_str();
        self.client
            .poll_until(&what, move || async move {
                let build: Build = self
                    .client
                    .get(&format!("/v3/builds/{}", build_guid))
                    .await?;
                match build.state.as_str() {
                    "STAGED" => Ok(PollState::Done(build)),
                    "FAILED" => Err(ApiError::OperationFailed {
                        operation: format!(
                            "build {} ({})",
                            build.guid,
                            build.error.unwrap_or_default()
                        ),
                        state: build.state,
                    }),
                    _ => Ok(PollState::Pending),
                }
            })
            .await
    }

    /// PATCH /v3/apps/{guid}/relationships/current_droplet
    pub async fn set_current_droplet(&self, guid: &str, droplet_guid: &str) -> Result<(), ApiError> {
        self.client
            .patch::<ToOneRelationship, _>(
                &format!("/v3/apps/{}/relationships/current_droplet", guid),
                &ToOneRelationship::new(droplet_guid),
            )
            .await
            .map(|_| ())
    }

    /// GET /v3/apps/{guid}/processes/web
    pub async fn web_process(&self, guid: &str) -> Result<Process, ApiError> {
        self.client
            .get(&format!("/v3/apps/{}/processes/web", guid))
            .await
    }

    /// POST /v3/apps/{guid}/processes/web/actions/scale
    pub async fn scale(&self, guid: &str, request: &ScaleRequest) -> Result<Process, ApiError> {
        self.client
            .post(
                &format!("/v3/apps/{}/processes/web/actions/scale", guid),
                request,
            )
            .await
    }

    /// POST /v3/apps/{guid}/actions/start
    pub async fn start(&self, guid: &str) -> Result<App, ApiError> {
        self.client
            .post(&format!("/v3/apps/{}/actions/start", guid), &serde_json::json!({}))
            .await
    }

    /// POST /v3/apps/{guid}/actions/stop
    pub async fn stop(&self, guid: &str) -> Result<App, ApiError> {
        self.client
            .post(&format!("/v3/apps/{}/actions/stop", guid), &serde_json::json!({}))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn docker_package_carries_image_and_credentials() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v3/packages")
            .match_body(Matcher::Json(serde_json::json!({
                "type": "docker",
                "relationships": {"app": {"data": {"guid": "app-1"}}},
                "data": {"image": "nginx:latest", "username": "bob", "password": "pw"}
            })))
            .with_status(201)
            .with_body(r#"{"guid":"pkg-1","type":"docker","state":"READY"}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let package = client
            .apps()
            .create_docker_package(
                "app-1",
                "nginx:latest",
                Some(&DockerCredentials {
                    username: "bob".to_string(),
                    password: "pw".to_string(),
                }),
            )
            .await
            .unwrap();

        assert_eq!(package.state, "READY");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn stage_polls_build_until_staged() {
        let mut server = Server::new_async().await;
        let _create = server
            .mock("POST", "/v3/builds")
            .match_body(Matcher::PartialJsonString(
                r#"{"package":{"guid":"pkg-1"}}"#.to_string(),
            ))
            .with_status(201)
            .with_body(r#"{"guid":"build-1","state":"STAGING"}"#)
            .create_async()
            .await;
        let staging = server
            .mock("GET", "/v3/builds/build-1")
            .with_body(r#"{"guid":"build-1","state":"STAGING"}"#)
            .expect(1)
            .create_async()
            .await;
        let staged = server
            .mock("GET", "/v3/builds/build-1")
            .with_body(r#"{"guid":"build-1","state":"STAGED","droplet":{"guid":"drop-1"}}"#)
            .expect(1)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let build = client.apps().stage("pkg-1").await.unwrap();

        assert_eq!(build.droplet.unwrap().guid, "drop-1");
        staging.assert_async().await;
        staged.assert_async().await;
    }

    #[tokio::test]
    async fn failed_build_reports_error() {
        let mut server = Server::new_async().await;
        let _create = server
            .mock("POST", "/v3/builds")
            .with_status(201)
            .with_body(r#"{"guid":"build-2","state":"STAGING"}"#)
            .create_async()
            .await;
        let _poll = server
            .mock("GET", "/v3/builds/build-2")
            .with_body(r#"{"guid":"build-2","state":"FAILED","error":"NoAppDetectedError"}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let err = client.apps().stage("pkg-2").await.unwrap_err();
        assert!(err.to_string().contains("NoAppDetectedError"));
    }

    #[tokio::test]
    async fn environment_variables_drop_nulls() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v3/apps/app-1/environment_variables")
            .with_body(r#"{"var":{"A":"1","B":null}}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let env = client.apps().environment_variables("app-1").await.unwrap();
        assert_eq!(env.len(), 1);
        assert_eq!(env["A"], "1");
    }
}
