//! Configuration loading via `ortho-config`.

use std::ffi::OsString;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::azure::DEFAULT_API_VERSION;
use crate::backend::{
    MAX_POOL_SIZE_BYTES, MAX_VOLUME_QUOTA_BYTES, MIN_POOL_SIZE_BYTES, MIN_VOLUME_QUOTA_BYTES,
    ServiceLevel,
};
use crate::locator::reserved_char;
use crate::poller::PollConfig;
use crate::units::{gib_to_bytes, tib_to_bytes};

const CONFIG_FILE: &str = "anf-provision.toml";

/// Provisioning settings layered from defaults, `anf-provision.toml` and
/// `ANF_*` environment variables.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "ANF",
    discovery(
        app_name = "anf-provision",
        env_var = "ANF_CONFIG_PATH",
        config_file_name = "anf-provision.toml",
        dotfile_name = ".anf-provision.toml",
        project_file_name = "anf-provision.toml"
    )
)]
pub struct ProvisionConfig {
    /// Azure region every resource is created in.
    #[ortho_config(default = "eastus".to_owned())]
    pub location: String,
    /// Resource group holding the NetApp account.
    #[ortho_config(default = "anf01-rg".to_owned())]
    pub resource_group: String,
    /// Resource group of the virtual network. Defaults to `resource_group`.
    pub vnet_resource_group: Option<String>,
    /// Virtual network with a subnet delegated to `Microsoft.NetApp/volumes`.
    #[ortho_config(default = "vnet-01".to_owned())]
    pub vnet_name: String,
    /// Delegated subnet.
    #[ortho_config(default = "anf-sn".to_owned())]
    pub subnet_name: String,
    /// NetApp account name. Generated when unset.
    pub account_name: Option<String>,
    /// Capacity pool name.
    #[ortho_config(default = "Pool01".to_owned())]
    pub pool_name: String,
    /// `Standard`, `Premium` or `Ultra`.
    #[ortho_config(default = "Standard".to_owned())]
    pub service_level: String,
    /// Capacity pool size in TiB.
    #[ortho_config(default = 4)]
    pub pool_size_tib: u64,
    /// Volume name. Defaults to `Vol-{account}-{pool}`.
    pub volume_name: Option<String>,
    /// Volume quota in GiB.
    #[ortho_config(default = 100)]
    pub volume_quota_gib: u64,
    /// Delete everything again once the volume is confirmed.
    #[ortho_config(default = false)]
    pub should_cleanup: bool,
    /// Seconds between propagation lookups.
    #[ortho_config(default = 10)]
    pub poll_interval_secs: u64,
    /// Lookups before a propagation wait gives up.
    #[ortho_config(default = 60)]
    pub poll_max_attempts: u32,
    /// `Microsoft.NetApp` API version.
    #[ortho_config(default = DEFAULT_API_VERSION.to_owned())]
    pub api_version: String,
    /// Credential file. Falls back to `AZURE_AUTH_LOCATION`.
    pub auth_location: Option<String>,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn hint(&self) -> String {
        format!(
            "set {} or add {} to {CONFIG_FILE}",
            self.env_var, self.toml_key
        )
    }
}

const LOCATION: FieldMetadata = FieldMetadata::new("Azure region", "ANF_LOCATION", "location");
const RESOURCE_GROUP: FieldMetadata =
    FieldMetadata::new("resource group", "ANF_RESOURCE_GROUP", "resource_group");
const VNET_RESOURCE_GROUP: FieldMetadata = FieldMetadata::new(
    "virtual network resource group",
    "ANF_VNET_RESOURCE_GROUP",
    "vnet_resource_group",
);
const VNET_NAME: FieldMetadata =
    FieldMetadata::new("virtual network name", "ANF_VNET_NAME", "vnet_name");
const SUBNET_NAME: FieldMetadata =
    FieldMetadata::new("delegated subnet name", "ANF_SUBNET_NAME", "subnet_name");
const ACCOUNT_NAME: FieldMetadata =
    FieldMetadata::new("NetApp account name", "ANF_ACCOUNT_NAME", "account_name");
const POOL_NAME: FieldMetadata =
    FieldMetadata::new("capacity pool name", "ANF_POOL_NAME", "pool_name");
const VOLUME_NAME: FieldMetadata =
    FieldMetadata::new("volume name", "ANF_VOLUME_NAME", "volume_name");
const API_VERSION: FieldMetadata =
    FieldMetadata::new("API version", "ANF_API_VERSION", "api_version");
const SERVICE_LEVEL: FieldMetadata =
    FieldMetadata::new("service level", "ANF_SERVICE_LEVEL", "service_level");
const POOL_SIZE: FieldMetadata =
    FieldMetadata::new("pool size", "ANF_POOL_SIZE_TIB", "pool_size_tib");
const VOLUME_QUOTA: FieldMetadata =
    FieldMetadata::new("volume quota", "ANF_VOLUME_QUOTA_GIB", "volume_quota_gib");
const POLL_MAX_ATTEMPTS: FieldMetadata = FieldMetadata::new(
    "poll attempt budget",
    "ANF_POLL_MAX_ATTEMPTS",
    "poll_max_attempts",
);

impl ProvisionConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: {}",
                metadata.description,
                metadata.hint()
            )));
        }
        if let Some(found) = reserved_char(value) {
            return Err(Self::invalid(
                metadata,
                &format!("'{value}' must not contain '{found}'"),
            ));
        }
        Ok(())
    }

    fn reject_blank(value: Option<&str>, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        value.map_or(Ok(()), |inner| Self::require_field(inner, metadata))
    }

    fn invalid(metadata: &FieldMetadata, problem: &str) -> ConfigError {
        ConfigError::Invalid(format!(
            "invalid {}: {problem}; {}",
            metadata.description,
            metadata.hint()
        ))
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("anf-provision")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages name the environment
    /// variable and the `anf-provision.toml` key that supply the value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// and [`ConfigError::Invalid`] when a value is out of range or a name
    /// contains `/`, `?` or `#`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(&self.location, &LOCATION)?;
        Self::require_field(&self.resource_group, &RESOURCE_GROUP)?;
        Self::reject_blank(self.vnet_resource_group.as_deref(), &VNET_RESOURCE_GROUP)?;
        Self::require_field(&self.vnet_name, &VNET_NAME)?;
        Self::require_field(&self.subnet_name, &SUBNET_NAME)?;
        Self::reject_blank(self.account_name.as_deref(), &ACCOUNT_NAME)?;
        Self::require_field(&self.pool_name, &POOL_NAME)?;
        Self::reject_blank(self.volume_name.as_deref(), &VOLUME_NAME)?;
        Self::require_field(&self.api_version, &API_VERSION)?;
        self.service_level()?;
        self.pool_size_bytes()?;
        self.volume_quota_bytes()?;
        if self.poll_max_attempts == 0 {
            return Err(Self::invalid(&POLL_MAX_ATTEMPTS, "must be at least 1"));
        }
        Ok(())
    }

    /// Parsed service level.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an unknown tier.
    pub fn service_level(&self) -> Result<ServiceLevel, ConfigError> {
        self.service_level
            .parse()
            .map_err(|err: crate::backend::RequestError| {
                Self::invalid(&SERVICE_LEVEL, &err.to_string())
            })
    }

    /// Pool size in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the size is outside 4–500 TiB.
    pub fn pool_size_bytes(&self) -> Result<u64, ConfigError> {
        tib_to_bytes(self.pool_size_tib)
            .filter(|bytes| (MIN_POOL_SIZE_BYTES..=MAX_POOL_SIZE_BYTES).contains(bytes))
            .ok_or_else(|| {
                Self::invalid(
                    &POOL_SIZE,
                    &format!("{} TiB is outside 4..=500 TiB", self.pool_size_tib),
                )
            })
    }

    /// Volume quota in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the quota is outside
    /// 100 GiB–100 TiB.
    pub fn volume_quota_bytes(&self) -> Result<u64, ConfigError> {
        gib_to_bytes(self.volume_quota_gib)
            .filter(|bytes| (MIN_VOLUME_QUOTA_BYTES..=MAX_VOLUME_QUOTA_BYTES).contains(bytes))
            .ok_or_else(|| {
                Self::invalid(
                    &VOLUME_QUOTA,
                    &format!(
                        "{} GiB is outside 100..=102400 GiB",
                        self.volume_quota_gib
                    ),
                )
            })
    }

    /// Resource group of the virtual network.
    #[must_use]
    pub fn vnet_resource_group(&self) -> &str {
        self.vnet_resource_group
            .as_deref()
            .unwrap_or(&self.resource_group)
    }

    /// Explicit credential file location, if configured.
    ///
    /// When unset, callers fall back to [`crate::azure::AUTH_LOCATION_ENV`].
    #[must_use]
    pub fn auth_location(&self) -> Option<&str> {
        self.auth_location.as_deref()
    }

    /// Interval and attempt budget for propagation waits.
    #[must_use]
    pub const fn poll_config(&self) -> PollConfig {
        PollConfig::new(
            Duration::from_secs(self.poll_interval_secs),
            self.poll_max_attempts,
        )
    }
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            location: String::from("eastus"),
            resource_group: String::from("anf01-rg"),
            vnet_resource_group: None,
            vnet_name: String::from("vnet-01"),
            subnet_name: String::from("anf-sn"),
            account_name: None,
            pool_name: String::from("Pool01"),
            service_level: String::from("Standard"),
            pool_size_tib: 4,
            volume_name: None,
            volume_quota_gib: 100,
            should_cleanup: false,
            poll_interval_secs: 10,
            poll_max_attempts: 60,
            api_version: DEFAULT_API_VERSION.to_owned(),
            auth_location: None,
        }
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a value is present but unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
