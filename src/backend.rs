//! Backend abstraction over the NetApp resource-management control plane.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use thiserror::Error;

use crate::locator::{LocatorError, ResourceKey, ResourceLocator, reserved_char};
use crate::units::{BYTES_PER_GIB, BYTES_PER_TIB};

/// Smallest capacity pool the service accepts (4 TiB).
pub const MIN_POOL_SIZE_BYTES: u64 = 4 * BYTES_PER_TIB;
/// Largest capacity pool the service accepts (500 TiB).
pub const MAX_POOL_SIZE_BYTES: u64 = 500 * BYTES_PER_TIB;
/// Smallest volume quota the service accepts (100 GiB).
pub const MIN_VOLUME_QUOTA_BYTES: u64 = 100 * BYTES_PER_GIB;
/// Largest volume quota the service accepts (100 TiB).
pub const MAX_VOLUME_QUOTA_BYTES: u64 = 100 * BYTES_PER_TIB;

/// Resource tags attached on creation.
pub type Tags = BTreeMap<String, String>;

/// Performance tier of a capacity pool and the volumes carved from it.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum ServiceLevel {
    /// Standard throughput tier.
    #[default]
    Standard,
    /// Premium throughput tier.
    Premium,
    /// Ultra throughput tier.
    Ultra,
}

impl ServiceLevel {
    /// Name used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "Standard",
            Self::Premium => "Premium",
            Self::Ultra => "Ultra",
        }
    }
}

impl fmt::Display for ServiceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceLevel {
    type Err = RequestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "premium" => Ok(Self::Premium),
            "ultra" => Ok(Self::Ultra),
            _ => Err(RequestError::UnknownServiceLevel(value.trim().to_owned())),
        }
    }
}

/// Errors raised when a request fails validation.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RequestError {
    /// Raised when a required field is missing.
    #[error("missing or empty field: {0}")]
    Validation(String),
    /// Raised when a size falls outside the range the service accepts.
    #[error("{field} of {value} bytes is outside the accepted range {min}..={max}")]
    OutOfRange {
        /// Field being validated.
        field: String,
        /// Value supplied.
        value: u64,
        /// Inclusive lower bound.
        min: u64,
        /// Inclusive upper bound.
        max: u64,
    },
    /// Raised when a name would change the shape of the resource id.
    #[error("{field} '{value}' must not contain '{found}'")]
    ReservedCharacter {
        /// Field being validated.
        field: String,
        /// Value supplied.
        value: String,
        /// Offending character.
        found: char,
    },
    /// Raised when a service level name is not recognised.
    #[error("unknown service level '{0}' (expected Standard, Premium or Ultra)")]
    UnknownServiceLevel(String),
}

fn require(value: &str, field: &str) -> Result<(), RequestError> {
    require_present(value, field)?;
    if let Some(found) = reserved_char(value) {
        return Err(RequestError::ReservedCharacter {
            field: field.to_owned(),
            value: value.to_owned(),
            found,
        });
    }
    Ok(())
}

fn require_present(value: &str, field: &str) -> Result<(), RequestError> {
    if value.trim().is_empty() {
        return Err(RequestError::Validation(field.to_owned()));
    }
    Ok(())
}

fn require_range(field: &str, value: u64, min: u64, max: u64) -> Result<(), RequestError> {
    if value < min || value > max {
        return Err(RequestError::OutOfRange {
            field: field.to_owned(),
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Parameters for creating a NetApp account.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AccountRequest {
    /// Resource group that will hold the account.
    pub resource_group: String,
    /// Account name.
    pub name: String,
    /// Azure region short name (for example `eastus`).
    pub location: String,
    /// Optional tags.
    pub tags: Tags,
}

impl AccountRequest {
    /// Validates the request.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Validation`] when any string field is empty
    /// and [`RequestError::ReservedCharacter`] when a name contains `/`, `?`
    /// or `#`.
    pub fn validate(&self) -> Result<(), RequestError> {
        require(&self.resource_group, "resource_group")?;
        require(&self.name, "account_name")?;
        require(&self.location, "location")?;
        Ok(())
    }

    /// Key addressing the account once created.
    #[must_use]
    pub fn key(&self) -> ResourceKey<'_> {
        ResourceKey::Account {
            resource_group: &self.resource_group,
            account: &self.name,
        }
    }
}

/// Parameters for creating a capacity pool.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PoolRequest {
    /// Resource group holding the account.
    pub resource_group: String,
    /// Parent account name.
    pub account: String,
    /// Pool name.
    pub name: String,
    /// Region; must match the account.
    pub location: String,
    /// Performance tier.
    pub service_level: ServiceLevel,
    /// Provisioned size in bytes (4 TiB to 500 TiB).
    pub size_bytes: u64,
    /// Optional tags.
    pub tags: Tags,
}

impl PoolRequest {
    /// Validates the request.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError`] when a name is empty or the size is outside
    /// the accepted range.
    pub fn validate(&self) -> Result<(), RequestError> {
        require(&self.resource_group, "resource_group")?;
        require(&self.account, "account_name")?;
        require(&self.name, "pool_name")?;
        require(&self.location, "location")?;
        require_range(
            "pool size",
            self.size_bytes,
            MIN_POOL_SIZE_BYTES,
            MAX_POOL_SIZE_BYTES,
        )
    }

    /// Key addressing the pool once created.
    #[must_use]
    pub fn key(&self) -> ResourceKey<'_> {
        ResourceKey::Pool {
            resource_group: &self.resource_group,
            account: &self.account,
            pool: &self.name,
        }
    }
}

/// Single export policy rule of a volume.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExportPolicyRule {
    /// Order of the rule within the policy, starting at 1.
    pub rule_index: u32,
    /// Client addresses allowed, as a comma separated list of CIDRs.
    pub allowed_clients: String,
    /// Read-only access for Unix clients.
    pub unix_read_only: bool,
    /// Read-write access for Unix clients.
    pub unix_read_write: bool,
    /// Allow CIFS.
    pub cifs: bool,
    /// Allow NFSv3.
    pub nfsv3: bool,
    /// Allow NFSv4.1.
    pub nfsv41: bool,
}

impl ExportPolicyRule {
    /// Read-write NFSv4.1 rule open to every client.
    #[must_use]
    pub fn nfsv41_open() -> Self {
        Self {
            rule_index: 1,
            allowed_clients: String::from("0.0.0.0/0"),
            unix_read_only: false,
            unix_read_write: true,
            cifs: false,
            nfsv3: false,
            nfsv41: true,
        }
    }
}

/// Parameters for creating a volume.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VolumeRequest {
    /// Resource group holding the account.
    pub resource_group: String,
    /// Parent account name.
    pub account: String,
    /// Parent pool name.
    pub pool: String,
    /// Volume name.
    pub name: String,
    /// Region; must match the account.
    pub location: String,
    /// Performance tier; must match the pool.
    pub service_level: ServiceLevel,
    /// Quota in bytes (100 GiB to 100 TiB).
    pub usage_threshold_bytes: u64,
    /// Unique file path used when mounting the volume.
    pub creation_token: String,
    /// Resource id of the subnet delegated to NetApp volumes.
    pub subnet_id: String,
    /// Protocols enabled on the volume, e.g. `NFSv4.1`.
    pub protocol_types: Vec<String>,
    /// Export policy rules.
    pub export_rules: Vec<ExportPolicyRule>,
    /// Optional tags.
    pub tags: Tags,
}

impl VolumeRequest {
    /// Starts a builder for a [`VolumeRequest`].
    #[must_use]
    pub fn builder() -> VolumeRequestBuilder {
        VolumeRequestBuilder::default()
    }

    /// Validates the request.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError`] when a required field is empty, the quota is
    /// out of range, or no export rule is present.
    pub fn validate(&self) -> Result<(), RequestError> {
        require(&self.resource_group, "resource_group")?;
        require(&self.account, "account_name")?;
        require(&self.pool, "pool_name")?;
        require(&self.name, "volume_name")?;
        require(&self.location, "location")?;
        require(&self.creation_token, "creation_token")?;
        require_present(&self.subnet_id, "subnet_id")?;
        if self.protocol_types.is_empty() {
            return Err(RequestError::Validation(String::from("protocol_types")));
        }
        if self.export_rules.is_empty() {
            return Err(RequestError::Validation(String::from("export_rules")));
        }
        require_range(
            "volume quota",
            self.usage_threshold_bytes,
            MIN_VOLUME_QUOTA_BYTES,
            MAX_VOLUME_QUOTA_BYTES,
        )
    }

    /// Key addressing the volume once created.
    #[must_use]
    pub fn key(&self) -> ResourceKey<'_> {
        ResourceKey::Volume {
            resource_group: &self.resource_group,
            account: &self.account,
            pool: &self.pool,
            volume: &self.name,
        }
    }
}

/// Builder for [`VolumeRequest`] that trims inputs and validates on build.
///
/// Defaults to a single NFSv4.1 protocol with an open read-write export rule
/// and uses the volume name as creation token unless one is given.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct VolumeRequestBuilder {
    resource_group: String,
    account: String,
    pool: String,
    name: String,
    location: String,
    service_level: ServiceLevel,
    usage_threshold_bytes: u64,
    creation_token: Option<String>,
    subnet_id: String,
    tags: Tags,
}

impl VolumeRequestBuilder {
    /// Sets the resource group.
    #[must_use]
    pub fn resource_group(mut self, value: impl Into<String>) -> Self {
        self.resource_group = value.into();
        self
    }

    /// Sets the parent account name.
    #[must_use]
    pub fn account(mut self, value: impl Into<String>) -> Self {
        self.account = value.into();
        self
    }

    /// Sets the parent pool name.
    #[must_use]
    pub fn pool(mut self, value: impl Into<String>) -> Self {
        self.pool = value.into();
        self
    }

    /// Sets the volume name.
    #[must_use]
    pub fn name(mut self, value: impl Into<String>) -> Self {
        self.name = value.into();
        self
    }

    /// Sets the region.
    #[must_use]
    pub fn location(mut self, value: impl Into<String>) -> Self {
        self.location = value.into();
        self
    }

    /// Sets the service level.
    #[must_use]
    pub fn service_level(mut self, value: ServiceLevel) -> Self {
        self.service_level = value;
        self
    }

    /// Sets the quota in bytes.
    #[must_use]
    pub fn usage_threshold_bytes(mut self, value: u64) -> Self {
        self.usage_threshold_bytes = value;
        self
    }

    /// Overrides the creation token (defaults to the volume name).
    #[must_use]
    pub fn creation_token(mut self, value: impl Into<String>) -> Self {
        self.creation_token = Some(value.into());
        self
    }

    /// Sets the delegated subnet id.
    #[must_use]
    pub fn subnet_id(mut self, value: impl Into<String>) -> Self {
        self.subnet_id = value.into();
        self
    }

    /// Sets resource tags.
    #[must_use]
    pub fn tags(mut self, value: Tags) -> Self {
        self.tags = value;
        self
    }

    /// Builds and validates the [`VolumeRequest`].
    ///
    /// # Errors
    ///
    /// Returns [`RequestError`] when validation fails.
    pub fn build(self) -> Result<VolumeRequest, RequestError> {
        let name = self.name.trim().to_owned();
        let creation_token = self
            .creation_token
            .map_or_else(|| name.clone(), |token| token.trim().to_owned());
        let request = VolumeRequest {
            resource_group: self.resource_group.trim().to_owned(),
            account: self.account.trim().to_owned(),
            pool: self.pool.trim().to_owned(),
            name,
            location: self.location.trim().to_owned(),
            service_level: self.service_level,
            usage_threshold_bytes: self.usage_threshold_bytes,
            creation_token,
            subnet_id: self.subnet_id.trim().to_owned(),
            protocol_types: vec![String::from("NFSv4.1")],
            export_rules: vec![ExportPolicyRule::nfsv41_open()],
            tags: self.tags,
        };
        request.validate()?;
        Ok(request)
    }
}

/// Resource as reported by the control plane.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NetAppResource {
    /// Full ARM id.
    pub id: String,
    /// Display name; child resources report `account/pool/...`.
    pub name: String,
    /// Region.
    pub location: String,
    /// Provisioning state when reported (for example `Succeeded`).
    pub provisioning_state: Option<String>,
}

impl NetAppResource {
    /// Parses the resource id into a [`ResourceLocator`].
    ///
    /// # Errors
    ///
    /// Returns [`LocatorError::Malformed`] when the id is not a NetApp id.
    pub fn locator(&self) -> Result<ResourceLocator, LocatorError> {
        ResourceLocator::parse(&self.id)
    }
}

/// Result of a single remote lookup.
#[derive(Debug)]
pub enum PollOutcome<E> {
    /// The resource exists.
    Found(NetAppResource),
    /// The control plane reports the resource as absent.
    NotFound,
    /// Any other failure; callers must not treat this as absence.
    TransientError(E),
}

/// Future returned by backend operations.
pub type BackendFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Future returned by [`NetAppBackend::get`].
pub type LookupFuture<'a, E> = Pin<Box<dyn Future<Output = PollOutcome<E>> + Send + 'a>>;

/// Operations the provisioning workflow needs from the control plane.
pub trait NetAppBackend {
    /// Provider specific error type returned by the backend.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Subscription the backend operates in.
    fn subscription_id(&self) -> &str;

    /// Creates or updates an account and returns it once provisioning ends.
    fn create_account<'a>(
        &'a self,
        request: &'a AccountRequest,
    ) -> BackendFuture<'a, NetAppResource, Self::Error>;

    /// Creates or updates a capacity pool and returns it once provisioning
    /// ends.
    fn create_pool<'a>(
        &'a self,
        request: &'a PoolRequest,
    ) -> BackendFuture<'a, NetAppResource, Self::Error>;

    /// Creates or updates a volume and returns it once provisioning ends.
    fn create_volume<'a>(
        &'a self,
        request: &'a VolumeRequest,
    ) -> BackendFuture<'a, NetAppResource, Self::Error>;

    /// Looks up a resource at the level named by `key`.
    fn get<'a>(&'a self, key: ResourceKey<'a>) -> LookupFuture<'a, Self::Error>;

    /// Deletes the resource named by `key`. Deletion of an absent resource
    /// succeeds.
    fn delete<'a>(&'a self, key: ResourceKey<'a>) -> BackendFuture<'a, (), Self::Error>;
}
