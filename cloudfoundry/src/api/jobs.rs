//! Asynchronous job polling
//!
//! Long running CF operations answer `202 Accepted` with a `Location` header
//! pointing at `/v3/jobs/{guid}`. The job is polled until it reaches a final
//! state or the configured job timeout elapses.

use serde::Deserialize;
use std::future::Future;
use tokio::time::Instant;

use super::client::{AsyncResponse, Client};
use super::common::CfErrorDetail;
use super::error::ApiError;

#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    pub guid: String,
    #[serde(default)]
    pub operation: String,
    pub state: String,
    #[serde(default)]
    pub errors: Vec<CfErrorDetail>,
    #[serde(default)]
    pub warnings: Vec<JobWarning>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobWarning {
    pub detail: String,
}

/// Outcome of one poll
pub enum PollState<T> {
    Done(T),
    Pending,
}

impl Client {
    pub async fn get_job(&self, location: &str) -> Result<Job, ApiError> {
        self.get(location).await
    }

    /// Poll a job until it is COMPLETE. A FAILED job is returned as
    /// `ApiError::JobFailed` carrying the job errors.
    pub async fn wait_for_job(&self, location: &str) -> Result<Job, ApiError> {
        tracing::debug!("Waiting for job: {}", location);
        let what = format!("job {}", location);

        self.poll_until(&what, move || async move {
            let job = self.get_job(location).await?;
            for warning in &job.warnings {
                tracing::warn!(job = %job.guid, "{}", warning.detail);
            }
            match job.state.as_str() {
                "COMPLETE" => Ok::<_, ApiError>(PollState::Done(job)),
                "FAILED" => Err(ApiError::JobFailed {
                    guid: job.guid,
                    errors: job.errors,
                }),
                _ => Ok(PollState::Pending),
            }
        })
        .await
    }

    /// Resolve an `AsyncResponse`, waiting on the job when there is one
    pub async fn complete<T>(&self, response: AsyncResponse<T>) -> Result<Option<T>, ApiError> {
        match response {
            AsyncResponse::Ready(value) => Ok(Some(value)),
            AsyncResponse::Job(location) => {
                self.wait_for_job(&location).await?;
                Ok(None)
            }
        }
    }

    /// Call `poll` every `job_poll_interval` until it returns `Done`, fails,
    /// or `job_timeout` elapses
    pub async fn poll_until<T, F, Fut>(&self, what: &str, mut poll: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<PollState<T>, ApiError>>,
    {
        let config = self.config();
        let deadline = Instant::now() + config.job_timeout;

        loop {
            if let PollState::Done(value) = poll().await? {
                return Ok(value);
            }
            if Instant::now() >= deadline {
                return Err(ApiError::Timeout {
                    what: what.to_string(),
                    seconds: config.job_timeout.as_secs(),
                });
            }
            tokio::time::sleep(config.job_poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use mockito::Server;

    #[tokio::test]
    async fn wait_for_job_polls_until_complete() {
        let mut server = Server::new_async().await;
        // The first matching mock serves requests until its expected hits are used up
        let processing = server
            .mock("GET", "/v3/jobs/job-1")
            .with_body(r#"{"guid":"job-1","operation":"org.delete","state":"PROCESSING","errors":[],"warnings":[]}"#)
            .expect(2)
            .create_async()
            .await;
        let complete = server
            .mock("GET", "/v3/jobs/job-1")
            .with_body(r#"{"guid":"job-1","operation":"org.delete","state":"COMPLETE","errors":[],"warnings":[]}"#)
            .expect(1)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let location = format!("{}/v3/jobs/job-1", server.url());
        let job = client.wait_for_job(&location).await.unwrap();

        assert_eq!(job.state, "COMPLETE");
        processing.assert_async().await;
        complete.assert_async().await;
    }

    #[tokio::test]
    async fn failed_job_reports_errors() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v3/jobs/job-2")
            .with_body(
                r#"{"guid":"job-2","state":"FAILED","errors":[{"code":10008,"title":"CF-UnprocessableEntity","detail":"Service broker rejected the request"}]}"#,
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let err = client.wait_for_job("/v3/jobs/job-2").await.unwrap_err();

        match &err {
            ApiError::JobFailed { guid, errors } => {
                assert_eq!(guid, "job-2");
                assert_eq!(errors.len(), 1);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(err.to_string().contains("Service broker rejected the request"));
    }

    #[tokio::test]
    async fn job_polling_times_out() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v3/jobs/job-3")
            .with_body(r#"{"guid":"job-3","state":"PROCESSING"}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let err = client.wait_for_job("/v3/jobs/job-3").await.unwrap_err();
        assert!(matches!(err, ApiError::Timeout { .. }));
    }
}
