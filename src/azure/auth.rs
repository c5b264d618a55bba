//! Service principal credentials and bearer token acquisition.

use std::fmt;
use std::io;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde::Deserialize;
use tracing::debug;

use super::error::AzureBackendError;
use super::models::TokenResponse;

/// Environment variable naming the credential file.
pub const AUTH_LOCATION_ENV: &str = "AZURE_AUTH_LOCATION";

const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";
const DEFAULT_RESOURCE_MANAGER: &str = "https://management.azure.com/";
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(300);
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Service principal credentials as written by `az ad sp create-for-rbac
/// --sdk-auth`.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AzureCredentials {
    /// Application (client) id.
    pub client_id: String,
    /// Client secret.
    pub client_secret: String,
    /// Subscription resources are created in.
    pub subscription_id: String,
    /// Directory (tenant) id.
    pub tenant_id: String,
    /// Token authority, defaults to the public cloud.
    #[serde(default = "default_authority")]
    pub active_directory_endpoint_url: String,
    /// ARM endpoint, defaults to the public cloud.
    #[serde(default = "default_resource_manager")]
    pub resource_manager_endpoint_url: String,
}

fn default_authority() -> String {
    DEFAULT_AUTHORITY.to_owned()
}

fn default_resource_manager() -> String {
    DEFAULT_RESOURCE_MANAGER.to_owned()
}

impl fmt::Debug for AzureCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("subscription_id", &self.subscription_id)
            .field("tenant_id", &self.tenant_id)
            .field(
                "active_directory_endpoint_url",
                &self.active_directory_endpoint_url,
            )
            .field(
                "resource_manager_endpoint_url",
                &self.resource_manager_endpoint_url,
            )
            .finish()
    }
}

impl AzureCredentials {
    /// Parses a credential document.
    ///
    /// # Errors
    ///
    /// Returns [`AzureBackendError::Credentials`] when the JSON is invalid or
    /// a required field is empty.
    pub fn from_json(contents: &str) -> Result<Self, AzureBackendError> {
        let credentials: Self = serde_json::from_str(contents)
            .map_err(|err| AzureBackendError::Credentials(err.to_string()))?;
        credentials.validate()?;
        Ok(credentials)
    }

    /// Reads and parses the credential file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`AzureBackendError::Credentials`] when the file cannot be
    /// read or parsed.
    pub fn from_file(path: &Utf8Path) -> Result<Self, AzureBackendError> {
        let parent = path.parent().unwrap_or_else(|| Utf8Path::new("."));
        let file_name = path.file_name().ok_or_else(|| {
            AzureBackendError::Credentials(format!("{path} does not name a file"))
        })?;
        let dir = Dir::open_ambient_dir(parent, ambient_authority())
            .map_err(|err| credential_io_error(parent, &err))?;
        let contents = dir
            .read_to_string(file_name)
            .map_err(|err| credential_io_error(path, &err))?;
        Self::from_json(&contents)
    }

    /// Reads the credential file named by `explicit`, falling back to
    /// [`AUTH_LOCATION_ENV`].
    ///
    /// # Errors
    ///
    /// Returns [`AzureBackendError::Credentials`] when no location is known
    /// or the file cannot be loaded.
    pub fn locate(explicit: Option<&str>) -> Result<Self, AzureBackendError> {
        let location = explicit
            .map(str::to_owned)
            .or_else(|| std::env::var(AUTH_LOCATION_ENV).ok())
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| {
                AzureBackendError::Credentials(format!(
                    "no credential file: set {AUTH_LOCATION_ENV} or auth_location in anf-provision.toml"
                ))
            })?;
        Self::from_file(&Utf8PathBuf::from(location.trim()))
    }

    fn validate(&self) -> Result<(), AzureBackendError> {
        for (value, field) in [
            (&self.client_id, "clientId"),
            (&self.client_secret, "clientSecret"),
            (&self.subscription_id, "subscriptionId"),
            (&self.tenant_id, "tenantId"),
        ] {
            if value.trim().is_empty() {
                return Err(AzureBackendError::Credentials(format!(
                    "credential file is missing {field}"
                )));
            }
        }
        Ok(())
    }

    /// ARM endpoint without a trailing slash.
    #[must_use]
    pub fn resource_manager(&self) -> &str {
        self.resource_manager_endpoint_url.trim_end_matches('/')
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.active_directory_endpoint_url.trim_end_matches('/'),
            self.tenant_id
        )
    }

    fn scope(&self) -> String {
        format!("{}/.default", self.resource_manager())
    }
}

fn credential_io_error(path: &Utf8Path, err: &io::Error) -> AzureBackendError {
    AzureBackendError::Credentials(format!("failed to read {path}: {err}"))
}

#[derive(Clone, Debug)]
pub(super) struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + REFRESH_MARGIN < self.expires_at
    }
}

/// Returns a cached bearer token, fetching a new one when it is close to
/// expiry.
pub(super) async fn bearer_token(
    http: &reqwest::Client,
    credentials: &AzureCredentials,
    cache: &tokio::sync::Mutex<Option<AccessToken>>,
) -> Result<String, AzureBackendError> {
    let mut cached = cache.lock().await;
    if let Some(token) = cached.as_ref().filter(|token| token.is_fresh()) {
        return Ok(token.value.clone());
    }

    let token = fetch_token(http, credentials).await?;
    let value = token.value.clone();
    *cached = Some(token);
    Ok(value)
}

async fn fetch_token(
    http: &reqwest::Client,
    credentials: &AzureCredentials,
) -> Result<AccessToken, AzureBackendError> {
    let url = credentials.token_url();
    let scope = credentials.scope();
    debug!(tenant = %credentials.tenant_id, "requesting management token");
    let response = http
        .post(&url)
        .form(&[
            ("grant_type", "client_credentials"),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("scope", scope.as_str()),
        ])
        .send()
        .await
        .map_err(|err| AzureBackendError::Transport {
            url: url.clone(),
            message: err.to_string(),
        })?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| AzureBackendError::Transport {
            url: url.clone(),
            message: err.to_string(),
        })?;
    if !status.is_success() {
        return Err(AzureBackendError::Auth {
            message: format!("token endpoint returned {status}: {}", body.trim()),
        });
    }

    let parsed: TokenResponse =
        serde_json::from_str(&body).map_err(|err| AzureBackendError::Decode {
            url,
            message: err.to_string(),
        })?;
    let lifetime = parsed
        .expires_in
        .as_ref()
        .and_then(super::models::Seconds::as_secs)
        .map_or(DEFAULT_TOKEN_LIFETIME, Duration::from_secs);
    Ok(AccessToken {
        value: parsed.access_token,
        expires_at: expiry_after(Instant::now(), lifetime),
    })
}

fn expiry_after(now: Instant, lifetime: Duration) -> Instant {
    now.checked_add(lifetime)
        .or_else(|| now.checked_add(DEFAULT_TOKEN_LIFETIME))
        .unwrap_or(now)
}
