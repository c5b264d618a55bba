//! Azure Resource Manager implementation of the NetApp backend.

mod auth;
mod error;
mod lro;
mod models;

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use tracing::{debug, info};

use crate::backend::{
    AccountRequest, BackendFuture, LookupFuture, NetAppBackend, NetAppResource, PollOutcome,
    PoolRequest, VolumeRequest,
};
use crate::locator::ResourceKey;
use models::{AccountBody, ArmErrorBody, PoolBody, ResourceEnvelope, VolumeBody};

pub use auth::{AUTH_LOCATION_ENV, AzureCredentials};
pub use error::AzureBackendError;

/// API version of the `Microsoft.NetApp` provider used by default.
pub const DEFAULT_API_VERSION: &str = "2022-05-01";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const OPERATION_POLL_INTERVAL: Duration = Duration::from_secs(5);
const OPERATION_TIMEOUT: Duration = Duration::from_secs(1800);

/// Backend that manages NetApp resources through the ARM REST API.
#[derive(Clone, Debug)]
pub struct AzureBackend {
    http: reqwest::Client,
    credentials: AzureCredentials,
    token: Arc<tokio::sync::Mutex<Option<auth::AccessToken>>>,
    api_version: String,
    operation_interval: Duration,
    operation_timeout: Duration,
}

impl AzureBackend {
    /// Creates a backend for the subscription named in `credentials`.
    ///
    /// # Errors
    ///
    /// Returns [`AzureBackendError::Transport`] when the HTTP client cannot
    /// be constructed.
    pub fn new(
        credentials: AzureCredentials,
        api_version: impl Into<String>,
    ) -> Result<Self, AzureBackendError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|err| AzureBackendError::Transport {
                url: credentials.resource_manager().to_owned(),
                message: err.to_string(),
            })?;
        Ok(Self {
            http,
            credentials,
            token: Arc::new(tokio::sync::Mutex::new(None)),
            api_version: api_version.into(),
            operation_interval: OPERATION_POLL_INTERVAL,
            operation_timeout: OPERATION_TIMEOUT,
        })
    }

    /// Overrides how long-running operations are polled.
    #[must_use]
    pub fn with_operation_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.operation_interval = interval;
        self.operation_timeout = timeout;
        self
    }

    fn resource_url(&self, key: ResourceKey<'_>) -> String {
        format!(
            "{}{}?api-version={}",
            self.credentials.resource_manager(),
            key.resource_id(&self.credentials.subscription_id),
            self.api_version
        )
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response, AzureBackendError> {
        let token = auth::bearer_token(&self.http, &self.credentials, &self.token).await?;
        let mut request = self
            .http
            .request(method.clone(), url)
            .bearer_auth(token);
        if let Some(json) = body {
            request = request.json(&json);
        }
        debug!(%method, url, "sending management request");
        request
            .send()
            .await
            .map_err(|err| AzureBackendError::Transport {
                url: url.to_owned(),
                message: err.to_string(),
            })
    }

    async fn put_resource(
        &self,
        key: ResourceKey<'_>,
        body: serde_json::Value,
    ) -> Result<NetAppResource, AzureBackendError> {
        let url = self.resource_url(key);
        let response = self.send(Method::PUT, &url, Some(body)).await?;
        if !response.status().is_success() {
            return Err(error_from_response(&Method::PUT, &url, response).await);
        }

        let tracker = lro::OperationTracker::from_headers(response.headers());
        self.wait_for_operation(&key.to_string(), tracker).await?;

        let resource = self.fetch(key).await;
        match resource {
            PollOutcome::Found(resource) => Ok(resource),
            PollOutcome::NotFound => Err(AzureBackendError::Http {
                method: Method::GET.to_string(),
                url,
                status: StatusCode::NOT_FOUND.as_u16(),
                code: String::from("ResourceNotFound"),
                message: String::from("resource missing after create"),
            }),
            PollOutcome::TransientError(err) => Err(err),
        }
    }

    async fn fetch(&self, key: ResourceKey<'_>) -> PollOutcome<AzureBackendError> {
        let url = self.resource_url(key);
        let response = match self.send(Method::GET, &url, None).await {
            Ok(response) => response,
            Err(err) => return PollOutcome::TransientError(err),
        };
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return PollOutcome::NotFound;
        }
        if !status.is_success() {
            return PollOutcome::TransientError(
                error_from_response(&Method::GET, &url, response).await,
            );
        }
        match response.json::<ResourceEnvelope>().await {
            Ok(envelope) => PollOutcome::Found(envelope.into()),
            Err(err) => PollOutcome::TransientError(AzureBackendError::Decode {
                url,
                message: err.to_string(),
            }),
        }
    }

    async fn remove(&self, key: ResourceKey<'_>) -> Result<(), AzureBackendError> {
        let url = self.resource_url(key);
        let response = self.send(Method::DELETE, &url, None).await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(%key, "resource already absent");
            return Ok(());
        }
        if !status.is_success() {
            return Err(error_from_response(&Method::DELETE, &url, response).await);
        }
        let tracker = lro::OperationTracker::from_headers(response.headers());
        self.wait_for_operation(&key.to_string(), tracker).await
    }
}

async fn error_from_response(
    method: &Method,
    url: &str,
    response: reqwest::Response,
) -> AzureBackendError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ArmErrorBody>(&body)
        .map(|parsed| parsed.error)
        .unwrap_or_default();
    let message = if detail.message.is_empty() {
        body.trim().to_owned()
    } else {
        detail.message
    };
    AzureBackendError::Http {
        method: method.to_string(),
        url: url.to_owned(),
        status,
        code: detail.code,
        message,
    }
}

fn to_json<T: serde::Serialize>(body: &T) -> Result<serde_json::Value, AzureBackendError> {
    serde_json::to_value(body).map_err(|err| AzureBackendError::Validation(err.to_string()))
}

impl NetAppBackend for AzureBackend {
    type Error = AzureBackendError;

    fn subscription_id(&self) -> &str {
        &self.credentials.subscription_id
    }

    fn create_account<'a>(
        &'a self,
        request: &'a AccountRequest,
    ) -> BackendFuture<'a, NetAppResource, Self::Error> {
        Box::pin(async move {
            request.validate()?;
            info!(account = %request.name, location = %request.location, "creating account");
            let body = to_json(&AccountBody::from(request))?;
            self.put_resource(request.key(), body).await
        })
    }

    fn create_pool<'a>(
        &'a self,
        request: &'a PoolRequest,
    ) -> BackendFuture<'a, NetAppResource, Self::Error> {
        Box::pin(async move {
            request.validate()?;
            info!(
                account = %request.account,
                pool = %request.name,
                service_level = %request.service_level,
                size_bytes = request.size_bytes,
                "creating capacity pool"
            );
            let body = to_json(&PoolBody::from(request))?;
            self.put_resource(request.key(), body).await
        })
    }

    fn create_volume<'a>(
        &'a self,
        request: &'a VolumeRequest,
    ) -> BackendFuture<'a, NetAppResource, Self::Error> {
        Box::pin(async move {
            request.validate()?;
            info!(
                pool = %request.pool,
                volume = %request.name,
                usage_threshold_bytes = request.usage_threshold_bytes,
                "creating volume"
            );
            let body = to_json(&VolumeBody::from(request))?;
            self.put_resource(request.key(), body).await
        })
    }

    fn get<'a>(&'a self, key: ResourceKey<'a>) -> LookupFuture<'a, Self::Error> {
        Box::pin(async move { self.fetch(key).await })
    }

    fn delete<'a>(&'a self, key: ResourceKey<'a>) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(async move {
            info!(%key, "deleting resource");
            self.remove(key).await
        })
    }
}

#[cfg(test)]
mod tests;
