//! Long-running operation tracking for ARM writes.
//!
//! ARM acknowledges `PUT` and `DELETE` calls before the work is done and
//! points at a status resource through either the `Azure-AsyncOperation` or
//! the `Location` header.

use reqwest::header::{HeaderMap, LOCATION};
use reqwest::{Method, StatusCode};
use tokio::time::{Instant, sleep};
use tracing::debug;

use super::models::OperationStatus;
use super::{AzureBackend, AzureBackendError, error_from_response};

const ASYNC_OPERATION_HEADER: &str = "azure-asyncoperation";

/// Status resource to follow after a write was accepted.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(super) enum OperationTracker {
    /// `Azure-AsyncOperation`: poll until the body reports a terminal status.
    AsyncOperation(String),
    /// `Location`: poll until the status code is no longer `202 Accepted`.
    Location(String),
    /// The write completed synchronously.
    Completed,
}

impl OperationTracker {
    pub(super) fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_owned)
        };
        if let Some(url) = header(ASYNC_OPERATION_HEADER) {
            return Self::AsyncOperation(url);
        }
        if let Some(url) = header(LOCATION.as_str()) {
            return Self::Location(url);
        }
        Self::Completed
    }
}

enum Progress {
    Running,
    Done,
}

impl AzureBackend {
    pub(super) async fn wait_for_operation(
        &self,
        resource: &str,
        tracker: OperationTracker,
    ) -> Result<(), AzureBackendError> {
        let deadline = Instant::now() + self.operation_timeout;
        while Instant::now() <= deadline {
            let progress = match &tracker {
                OperationTracker::Completed => return Ok(()),
                OperationTracker::AsyncOperation(url) => {
                    self.poll_async_operation(resource, url).await?
                }
                OperationTracker::Location(url) => self.poll_location(url).await?,
            };
            if matches!(progress, Progress::Done) {
                return Ok(());
            }
            debug!(resource, "operation still running");
            sleep(self.operation_interval).await;
        }

        Err(AzureBackendError::Timeout {
            resource: resource.to_owned(),
        })
    }

    async fn poll_async_operation(
        &self,
        resource: &str,
        url: &str,
    ) -> Result<Progress, AzureBackendError> {
        let response = self.send(Method::GET, url, None).await?;
        if !response.status().is_success() {
            return Err(error_from_response(&Method::GET, url, response).await);
        }
        let status: OperationStatus =
            response
                .json()
                .await
                .map_err(|err| AzureBackendError::Decode {
                    url: url.to_owned(),
                    message: err.to_string(),
                })?;

        match status.status.as_str() {
            "Succeeded" => Ok(Progress::Done),
            "Failed" | "Canceled" => Err(AzureBackendError::OperationFailed {
                resource: resource.to_owned(),
                status: status.status.clone(),
                message: status.error.map(|detail| detail.message).unwrap_or_default(),
            }),
            _ => Ok(Progress::Running),
        }
    }

    async fn poll_location(&self, url: &str) -> Result<Progress, AzureBackendError> {
        let response = self.send(Method::GET, url, None).await?;
        let status = response.status();
        if status == StatusCode::ACCEPTED {
            return Ok(Progress::Running);
        }
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(Progress::Done);
        }
        Err(error_from_response(&Method::GET, url, response).await)
    }
}
