//! Reference polling consumer
//!
//! Submits a job and polls status plus incremental output until the
//! job reaches a terminal state. Transient fetch failures are logged
//! and tolerated up to a consecutive-failure threshold; interruption
//! handling is the caller's business, via [`PollingClient::stop`].

use std::time::Duration;

use tracing::{debug, warn};

use crate::api::{JobStatusDto, OutputResponseDto, SubmitResponseDto};
use crate::job::{JobId, JobParameters, OutputLine};

/// Client error types
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server rejected request ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Aborted after {attempts} consecutive poll failures")]
    TooManyFailures { attempts: u32 },
}

/// Polling client settings
#[derive(Debug, Clone)]
pub struct PollingClientConfig {
    pub base_url: String,
    pub poll_interval: Duration,
    pub max_consecutive_failures: u32,
}

impl PollingClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            poll_interval: Duration::from_secs(10),
            max_consecutive_failures: 5,
        }
    }
}

pub struct PollingClient {
    http: reqwest::Client,
    config: PollingClientConfig,
}

impl PollingClient {
    pub fn new(config: PollingClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Submit a job and return its id
    pub async fn submit(&self, parameters: &JobParameters) -> Result<JobId, ClientError> {
        let response = self
            .http
            .post(format!("{}/api/jobs", self.config.base_url))
            .json(parameters)
            .send()
            .await?;
        let response = Self::expect_ok(response).await?;
        let ack: SubmitResponseDto = response.json().await?;
        Ok(ack.job_id)
    }

    /// Fetch one job's record snapshot
    pub async fn status(&self, job_id: &JobId) -> Result<JobStatusDto, ClientError> {
        let response = self
            .http
            .get(format!("{}/api/jobs/{}/status", self.config.base_url, job_id))
            .send()
            .await?;
        let response = Self::expect_ok(response).await?;
        Ok(response.json().await?)
    }

    /// Fetch output lines past `since`
    pub async fn output(
        &self,
        job_id: &JobId,
        since: u64,
    ) -> Result<OutputResponseDto, ClientError> {
        let response = self
            .http
            .get(format!(
                "{}/api/jobs/{}/output?since={}",
                self.config.base_url, job_id, since
            ))
            .send()
            .await?;
        let response = Self::expect_ok(response).await?;
        Ok(response.json().await?)
    }

    /// Request termination of a running job
    pub async fn stop(&self, job_id: &JobId) -> Result<(), ClientError> {
        let response = self
            .http
            .post(format!("{}/api/jobs/{}/stop", self.config.base_url, job_id))
            .send()
            .await?;
        Self::expect_ok(response).await?;
        Ok(())
    }

    /// Submit and poll until terminal, delivering new lines to `on_line`
    ///
    /// Each cycle fetches status, then output past the cursor, then
    /// sleeps the fixed interval. A fetch failure does not terminate
    /// the loop until `max_consecutive_failures` in a row.
    pub async fn run_to_completion<F>(
        &self,
        parameters: &JobParameters,
        mut on_line: F,
    ) -> Result<JobStatusDto, ClientError>
    where
        F: FnMut(&OutputLine),
    {
        let job_id = self.submit(parameters).await?;
        debug!(job_id = %job_id, "Job submitted, polling until terminal");

        let mut cursor: u64 = 0;
        let mut failures: u32 = 0;

        loop {
            match self.poll_once(&job_id, cursor).await {
                Ok((status, output)) => {
                    failures = 0;
                    for line in &output.lines {
                        on_line(line);
                    }
                    cursor = output.next_cursor;

                    if status.state.is_terminal() {
                        return Ok(status);
                    }
                }
                Err(e) => {
                    failures += 1;
                    warn!(
                        job_id = %job_id,
                        failures, "Poll failed, will retry: {}", e
                    );
                    if failures >= self.config.max_consecutive_failures {
                        return Err(ClientError::TooManyFailures { attempts: failures });
                    }
                }
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// One status + output fetch. Status comes first so output seen
    /// after a terminal status is guaranteed complete.
    async fn poll_once(
        &self,
        job_id: &JobId,
        cursor: u64,
    ) -> Result<(JobStatusDto, OutputResponseDto), ClientError> {
        let status = self.status(job_id).await?;
        let output = self.output(job_id, cursor).await?;
        Ok((status, output))
    }

    async fn expect_ok(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|v| {
                v.get("message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| status.to_string());

        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }
}
