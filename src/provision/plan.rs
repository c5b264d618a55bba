//! Derives concrete resource requests from configuration.

use uuid::Uuid;

use crate::backend::{AccountRequest, PoolRequest, Tags, VolumeRequest};
use crate::config::{ConfigError, ProvisionConfig};

const ACCOUNT_PREFIX: &str = "anf";
const ACCOUNT_SUFFIX_LEN: usize = 8;

/// Requests for one run of the provisioning workflow.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProvisionPlan {
    /// Account to create.
    pub account: AccountRequest,
    /// Capacity pool to create. The account name is replaced by the one
    /// reported for the created account.
    pub pool: PoolRequest,
    /// Volume to create. Account and pool names are replaced by the ones
    /// reported for the created pool.
    pub volume: VolumeRequest,
    /// Delete the resources again once the volume is confirmed.
    pub cleanup: bool,
}

impl ProvisionPlan {
    /// Builds a plan for `subscription` from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration is invalid or the
    /// resulting requests fail validation.
    pub fn from_config(config: &ProvisionConfig, subscription: &str) -> Result<Self, ConfigError> {
        config.validate()?;
        let service_level = config.service_level()?;
        let account_name = config
            .account_name
            .as_deref()
            .map_or_else(generate_account_name, |name| name.trim().to_owned());
        let pool_name = config.pool_name.trim().to_owned();
        let volume_name = config
            .volume_name
            .as_deref()
            .map_or_else(
                || default_volume_name(&account_name, &pool_name),
                |name| name.trim().to_owned(),
            );

        let account = AccountRequest {
            resource_group: config.resource_group.trim().to_owned(),
            name: account_name.clone(),
            location: config.location.trim().to_owned(),
            tags: Tags::new(),
        };
        let pool = PoolRequest {
            resource_group: account.resource_group.clone(),
            account: account_name.clone(),
            name: pool_name.clone(),
            location: account.location.clone(),
            service_level,
            size_bytes: config.pool_size_bytes()?,
            tags: Tags::new(),
        };
        let volume = VolumeRequest::builder()
            .resource_group(&account.resource_group)
            .account(&account_name)
            .pool(&pool_name)
            .name(&volume_name)
            .location(&account.location)
            .service_level(service_level)
            .usage_threshold_bytes(config.volume_quota_bytes()?)
            .creation_token(&volume_name)
            .subnet_id(subnet_id(
                subscription,
                config.vnet_resource_group().trim(),
                config.vnet_name.trim(),
                config.subnet_name.trim(),
            ))
            .build()
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;

        Ok(Self {
            account,
            pool,
            volume,
            cleanup: config.should_cleanup,
        })
    }
}

/// Id of a delegated subnet.
#[must_use]
pub fn subnet_id(subscription: &str, resource_group: &str, vnet: &str, subnet: &str) -> String {
    format!(
        "/subscriptions/{subscription}/resourceGroups/{resource_group}/providers/Microsoft.Network/virtualNetworks/{vnet}/subnets/{subnet}"
    )
}

fn generate_account_name() -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(ACCOUNT_SUFFIX_LEN)
        .collect();
    format!("{ACCOUNT_PREFIX}{suffix}")
}

fn default_volume_name(account: &str, pool: &str) -> String {
    format!("Vol-{account}-{pool}")
}
