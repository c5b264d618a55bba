use std::fmt;

use thiserror::Error;

use crate::locator::{LocatorError, ResourceLevel};
use crate::poller::{TargetState, WaitError};

/// Step of the provisioning workflow that issued a remote call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProvisionStep {
    /// Creating the NetApp account.
    CreateAccount,
    /// Creating the capacity pool.
    CreatePool,
    /// Creating the volume.
    CreateVolume,
    /// Deleting a resource at the given level.
    Delete(ResourceLevel),
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateAccount => f.write_str("create account"),
            Self::CreatePool => f.write_str("create capacity pool"),
            Self::CreateVolume => f.write_str("create volume"),
            Self::Delete(level) => write!(f, "delete {level}"),
        }
    }
}

/// Errors surfaced by the provisioning workflow.
#[derive(Debug, Error)]
pub enum ProvisionError<E>
where
    E: std::error::Error + 'static,
{
    /// Raised when a create or delete call fails.
    #[error("failed to {step}: {source}")]
    Remote {
        /// Step that failed.
        step: ProvisionStep,
        /// Backend error.
        #[source]
        source: E,
    },
    /// Raised when a lookup fails while waiting for propagation.
    #[error("failed while waiting for propagation: {0}")]
    Wait(#[source] WaitError<E>),
    /// Raised when the attempt budget runs out before the change is visible.
    #[error("{locator} was not observed as {target} after {attempts} lookups")]
    NotPropagated {
        /// Resource being waited on.
        locator: String,
        /// State that was never observed.
        target: TargetState,
        /// Lookups performed.
        attempts: u32,
    },
    /// Raised when the control plane reports an id that cannot be decomposed.
    #[error(transparent)]
    Locator(#[from] LocatorError),
}

impl<E> ProvisionError<E>
where
    E: std::error::Error + 'static,
{
    /// Step that failed, for remote call failures.
    #[must_use]
    pub const fn step(&self) -> Option<ProvisionStep> {
        match self {
            Self::Remote { step, .. } => Some(*step),
            _ => None,
        }
    }
}
