use reqwest::header::{ACCEPT, AUTHORIZATION, LOCATION};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::common::{CfErrorResponse, ListOptions, Page};
use super::error::ApiError;

/// Cloud Foundry v3 API client
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: String,
    access_token: String,
    auth_header: String,
    config: ClientConfig,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub request_timeout: Duration,
    /// Delay between polls of jobs, packages, builds and MTA operations
    pub job_poll_interval: Duration,
    /// Upper bound for any single asynchronous operation
    pub job_timeout: Duration,
    pub skip_ssl_validation: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            job_poll_interval: Duration::from_secs(2),
            job_timeout: Duration::from_secs(20 * 60),
            skip_ssl_validation: false,
        }
    }
}

/// Result of a call the platform may finish asynchronously. `Job` carries
/// the `Location` of the job to poll.
#[derive(Debug)]
pub enum AsyncResponse<T> {
    Ready(T),
    Job(String),
}

impl Client {
    /// Create a client from an already issued access token
    pub fn new(api_url: &str, access_token: &str, skip_ssl_validation: bool) -> Result<Self, ApiError> {
        Self::with_config(
            api_url,
            access_token,
            ClientConfig {
                skip_ssl_validation,
                ..Default::default()
            },
        )
    }

    pub fn with_config(api_url: &str, access_token: &str, config: ClientConfig) -> Result<Self, ApiError> {
        let http_client = build_http_client(&config)?;
        let access_token = strip_bearer(access_token).to_string();

        if access_token.is_empty() {
            return Err(ApiError::AuthError("access token is empty".to_string()));
        }

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                base_url: api_url.trim_end_matches('/').to_string(),
                auth_header: format!("Bearer {}", access_token),
                access_token,
                config,
            }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn access_token(&self) -> &str {
        &self.inner.access_token
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.inner.http_client
    }

    /// Absolute URLs (pagination and job links) pass through untouched
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.inner.base_url, path)
        }
    }

    /// Execute a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        tracing::debug!("GET request to: {}", url);
        let response = self.send(self.http().get(&url)).await?;
        parse_body(response).await
    }

    pub async fn get_with_options<T: DeserializeOwned>(
        &self,
        path: &str,
        options: &ListOptions,
    ) -> Result<T, ApiError> {
        self.get(&format!("{}{}", path, options.to_query_string()))
            .await
    }

    /// Fetch every page of a list endpoint by following `pagination.next`
    pub async fn list_all<T: DeserializeOwned>(
        &self,
        path: &str,
        options: &ListOptions,
    ) -> Result<Vec<T>, ApiError> {
        let mut page: Page<T> = self.get_with_options(path, options).await?;
        let mut resources = std::mem::take(&mut page.resources);

        while let Some(next) = page.pagination.next.take() {
            tracing::debug!("Following pagination link: {}", next.href);
            page = self.get(&next.href).await?;
            resources.append(&mut page.resources);
        }

        Ok(resources)
    }

    /// Execute a POST request and parse the created resource
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        tracing::debug!("POST request to: {}", url);
        let response = self.send(self.http().post(&url).json(body)).await?;
        parse_body(response).await
    }

    /// POST that may be answered with `202 Accepted` and a job location
    pub async fn post_async<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<AsyncResponse<T>, ApiError> {
        let url = self.url(path);
        tracing::debug!("POST request to: {}", url);
        let response = self.send(self.http().post(&url).json(body)).await?;
        into_async_response(response).await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        tracing::debug!("PATCH request to: {}", url);
        let response = self.send(self.http().patch(&url).json(body)).await?;
        parse_body(response).await
    }

    pub async fn patch_async<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<AsyncResponse<T>, ApiError> {
        let url = self.url(path);
        tracing::debug!("PATCH request to: {}", url);
        let response = self.send(self.http().patch(&url).json(body)).await?;
        into_async_response(response).await
    }

    /// Execute a DELETE request. Returns the job location for `202 Accepted`.
    pub async fn delete(&self, path: &str) -> Result<Option<String>, ApiError> {
        let url = self.url(path);
        tracing::debug!("DELETE request to: {}", url);
        let response = self.send(self.http().delete(&url)).await?;
        Ok(job_location(&response))
    }

    /// DELETE and wait for the deletion job when the platform starts one
    pub async fn delete_and_wait(&self, path: &str) -> Result<(), ApiError> {
        if let Some(location) = self.delete(path).await? {
            self.wait_for_job(&location).await?;
        }
        Ok(())
    }

    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<AsyncResponse<T>, ApiError> {
        let url = self.url(path);
        tracing::debug!("POST multipart request to: {}", url);
        let response = self.send(self.http().post(&url).multipart(form)).await?;
        into_async_response(response).await
    }

    /// Authorize and send a request, mapping non-2xx answers to `ApiError`
    pub(crate) async fn send(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ApiError> {
        let response = builder
            .header(AUTHORIZATION, &self.inner.auth_header)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("Response status: {}", status);

        if status.is_success() {
            return Ok(response);
        }

        Err(error_from_response(response).await)
    }
}

pub(crate) fn build_http_client(config: &ClientConfig) -> Result<reqwest::Client, ApiError> {
    Ok(reqwest::ClientBuilder::new()
        .danger_accept_invalid_certs(config.skip_ssl_validation)
        .timeout(config.request_timeout)
        .build()?)
}

fn strip_bearer(token: &str) -> &str {
    let token = token.trim();
    match token.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        _ => token,
    }
}

pub(crate) async fn error_from_response(response: reqwest::Response) -> ApiError {
    let status = response.status().as_u16();
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    tracing::error!("API error response: {}", text);

    let errors = serde_json::from_str::<CfErrorResponse>(&text)
        .map(|envelope| envelope.errors)
        .unwrap_or_default();

    ApiError::ApiError {
        status,
        message: text,
        errors,
    }
}

pub(crate) async fn parse_body<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let text = response.text().await?;
    tracing::debug!("API response body: {}", text);

    let text = if text.trim().is_empty() { "null" } else { text.as_str() };
    serde_json::from_str::<T>(text).map_err(|e| {
        tracing::error!("Failed to deserialize response: {}, body: {}", e, text);
        ApiError::ParseError(format!("Failed to parse response: {}", e))
    })
}

fn job_location(response: &reqwest::Response) -> Option<String> {
    if response.status() != reqwest::StatusCode::ACCEPTED {
        return None;
    }
    response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

async fn into_async_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<AsyncResponse<T>, ApiError> {
    match job_location(&response) {
        Some(location) => Ok(AsyncResponse::Job(location)),
        None => Ok(AsyncResponse::Ready(parse_body(response).await?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use mockito::{Matcher, Server};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Named {
        guid: String,
        name: String,
    }

    #[tokio::test]
    async fn client_sends_bearer_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v3/organizations/org-1")
            .match_header("authorization", "Bearer test-token")
            .with_body(r#"{"guid":"org-1","name":"demo"}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let org: Named = client.get("/v3/organizations/org-1").await.unwrap();
        assert_eq!(org.guid, "org-1");
        assert_eq!(org.name, "demo");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn client_accepts_tokens_with_bearer_prefix() {
        let client = Client::new("https://api.example.com/", "bearer abc", false).unwrap();
        assert_eq!(client.access_token(), "abc");
        assert_eq!(client.base_url(), "https://api.example.com");
    }

    #[tokio::test]
    async fn client_parses_cf_error_envelope() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v3/spaces/missing")
            .with_status(404)
            .with_body(
                r#"{"errors":[{"code":10010,"title":"CF-ResourceNotFound","detail":"Space not found"}]}"#,
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let err = client.get::<Named>("/v3/spaces/missing").await.unwrap_err();

        assert!(err.is_not_found());
        assert!(err.to_string().contains("Space not found"));
    }

    #[tokio::test]
    async fn list_all_follows_next_links() {
        let mut server = Server::new_async().await;
        let next = format!("{}/v3/stacks?page=2&per_page=1", server.url());
        let first = server
            .mock("GET", "/v3/stacks")
            .match_query(Matcher::Missing)
            .with_body(format!(
                r#"{{"pagination":{{"total_results":2,"total_pages":2,"next":{{"href":"{}"}}}},"resources":[{{"guid":"s1","name":"cflinuxfs3"}}]}}"#,
                next
            ))
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/v3/stacks")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("page".into(), "2".into()),
                Matcher::UrlEncoded("per_page".into(), "1".into()),
            ]))
            .with_body(
                r#"{"pagination":{"total_results":2,"total_pages":2,"next":null},"resources":[{"guid":"s2","name":"cflinuxfs4"}]}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let stacks: Vec<Named> = client
            .list_all("/v3/stacks", &ListOptions::new())
            .await
            .unwrap();

        assert_eq!(stacks.len(), 2);
        assert_eq!(stacks[1].name, "cflinuxfs4");
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn delete_returns_job_location_on_accepted() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("DELETE", "/v3/organizations/org-1")
            .with_status(202)
            .with_header("location", "https://api.example.com/v3/jobs/job-1")
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let location = client.delete("/v3/organizations/org-1").await.unwrap();
        assert_eq!(
            location.as_deref(),
            Some("https://api.example.com/v3/jobs/job-1")
        );
    }

    #[tokio::test]
    async fn delete_without_job_returns_none() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("DELETE", "/v3/isolation_segments/iso-1")
            .with_status(204)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let location = client.delete("/v3/isolation_segments/iso-1").await.unwrap();
        assert!(location.is_none());
    }

    #[tokio::test]
    async fn client_handles_network_errors() {
        let client = Client::new("http://localhost:1", "token", true).unwrap();
        let result = client.get::<Named>("/v3/info").await;
        assert!(matches!(result, Err(ApiError::RequestError(_))));
    }
}
