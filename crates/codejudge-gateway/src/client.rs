//! Client side of the gateway → worker round trip.

use async_trait::async_trait;
use codejudge_types::{ErrorBody, WorkerRequest, WorkerResponse};
use thiserror::Error;

use crate::config::WorkerEndpoint;

#[derive(Error, Debug)]
pub enum WorkerClientError {
    /// No answer within the endpoint's timeout.
    #[error("execution worker did not answer within {0}")]
    Timeout(String),

    /// The worker could not be reached.
    #[error("execution worker is unavailable: {0}")]
    Unavailable(String),

    /// The worker refused the request (4xx).
    #[error("execution worker rejected the submission: {message}")]
    Rejected {
        status: u16,
        kind: Option<String>,
        message: String,
    },

    /// The worker failed (5xx) or answered with something unreadable.
    #[error("execution worker failed: {0}")]
    Failed(String),
}

/// Sends submissions to an execution worker.
#[async_trait]
pub trait WorkerClient: Send + Sync {
    async fn process(&self, request: &WorkerRequest) -> Result<WorkerResponse, WorkerClientError>;

    async fn health_check(&self) -> Result<(), WorkerClientError>;
}

pub struct HttpWorkerClient {
    endpoint: WorkerEndpoint,
    client: reqwest::Client,
}

impl HttpWorkerClient {
    pub fn new(endpoint: WorkerEndpoint) -> Self {
        Self {
            endpoint,
            client: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> &WorkerEndpoint {
        &self.endpoint
    }

    fn classify(&self, err: reqwest::Error) -> WorkerClientError {
        if err.is_timeout() {
            WorkerClientError::Timeout(format!("{:?}", self.endpoint.timeout))
        } else if err.is_connect() || err.is_request() {
            WorkerClientError::Unavailable(err.to_string())
        } else {
            WorkerClientError::Failed(err.to_string())
        }
    }
}

#[async_trait]
impl WorkerClient for HttpWorkerClient {
    async fn process(&self, request: &WorkerRequest) -> Result<WorkerResponse, WorkerClientError> {
        let url = self.endpoint.url();
        log::debug!(
            "Dispatching {} example(s) for '{}' to {}",
            request.problem_examples.len(),
            request.problem,
            url
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .timeout(self.endpoint.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if status.is_success() {
            return response.json::<WorkerResponse>().await.map_err(|e| {
                if e.is_timeout() {
                    self.classify(e)
                } else {
                    WorkerClientError::Failed(format!("unreadable worker response: {}", e))
                }
            });
        }

        let text = response.text().await.map_err(|e| self.classify(e))?;
        let (kind, message) = match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => (Some(body.kind), body.error),
            Err(_) => (None, text),
        };

        if status.is_client_error() {
            Err(WorkerClientError::Rejected {
                status: status.as_u16(),
                kind,
                message,
            })
        } else {
            Err(WorkerClientError::Failed(format!("{}: {}", status, message)))
        }
    }

    async fn health_check(&self) -> Result<(), WorkerClientError> {
        let response = self
            .client
            .get(self.endpoint.health_url())
            .timeout(self.endpoint.timeout)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        if !response.status().is_success() {
            return Err(WorkerClientError::Failed(format!(
                "health check failed: {}",
                response.status()
            )));
        }
        Ok(())
    }
}
