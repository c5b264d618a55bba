//! Core library for the Azure NetApp Files provisioning tool.
//!
//! The crate exposes a backend abstraction over the NetApp control plane, an
//! Azure Resource Manager implementation of it, a poller that waits out the
//! control plane's eventual consistency, and the workflow that creates an
//! account, capacity pool and volume in turn (create → confirm visible →
//! create child, and the reverse for cleanup).

pub mod azure;
pub mod backend;
pub mod config;
pub mod locator;
pub mod poller;
pub mod provision;
pub mod test_support;
pub mod units;

pub use azure::{AzureBackend, AzureBackendError, AzureCredentials};
pub use backend::{
    AccountRequest, NetAppBackend, NetAppResource, PollOutcome, PoolRequest, RequestError,
    ServiceLevel, VolumeRequest, VolumeRequestBuilder,
};
pub use config::{ConfigError, ProvisionConfig};
pub use locator::{LocatorError, ResourceKey, ResourceLevel, ResourceLocator};
pub use poller::{PollConfig, TargetState, WaitError, WaitOutcome, await_state};
pub use provision::{
    ProvisionError, ProvisionOrchestrator, ProvisionOutcome, ProvisionPlan, ProvisionStep,
};
