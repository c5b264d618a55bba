//! Provisioning workflow for an account, capacity pool and volume.
//!
//! Every write is followed by a propagation wait: creations wait until the
//! resource can be read and deletions wait until it is reported as not
//! found. Child requests take their parent names from the ids the control
//! plane reports, decomposed through [`ResourceLocator`].

mod error;
mod plan;

use tracing::info;

use crate::backend::{NetAppBackend, NetAppResource};
use crate::locator::{LocatorError, ResourceLocator};
use crate::poller::{PollConfig, TargetState, WaitOutcome, await_state};

pub use error::{ProvisionError, ProvisionStep};
pub use plan::{ProvisionPlan, subnet_id};

/// Resources created by a workflow run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProvisionOutcome {
    /// Created account.
    pub account: NetAppResource,
    /// Created capacity pool.
    pub pool: NetAppResource,
    /// Created volume.
    pub volume: NetAppResource,
    /// Whether the resources were deleted again.
    pub cleaned_up: bool,
}

/// Runs the provisioning workflow against a backend.
#[derive(Debug)]
pub struct ProvisionOrchestrator<B> {
    backend: B,
    poll: PollConfig,
}

impl<B> ProvisionOrchestrator<B>
where
    B: NetAppBackend,
{
    /// Creates an orchestrator that waits for propagation using `poll`.
    #[must_use]
    pub const fn new(backend: B, poll: PollConfig) -> Self {
        Self { backend, poll }
    }

    /// Backend the orchestrator drives.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Creates the account, pool and volume in order, confirming each before
    /// creating its child, then optionally deletes them in reverse order.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Remote`] when a call fails,
    /// [`ProvisionError::NotPropagated`] when a change is not observed within
    /// the attempt budget and [`ProvisionError::Wait`] when a lookup fails.
    pub async fn execute(
        &self,
        plan: &ProvisionPlan,
    ) -> Result<ProvisionOutcome, ProvisionError<B::Error>> {
        info!(account = %plan.account.name, "creating NetApp account");
        let account = self
            .backend
            .create_account(&plan.account)
            .await
            .map_err(|source| ProvisionError::Remote {
                step: ProvisionStep::CreateAccount,
                source,
            })?;
        let account_locator = account.locator()?;
        self.confirm(&account_locator, TargetState::Exists).await?;

        let mut pool_request = plan.pool.clone();
        account_locator.account().clone_into(&mut pool_request.account);
        info!(
            account = %pool_request.account,
            pool = %pool_request.name,
            "creating capacity pool"
        );
        let pool = self
            .backend
            .create_pool(&pool_request)
            .await
            .map_err(|source| ProvisionError::Remote {
                step: ProvisionStep::CreatePool,
                source,
            })?;
        let pool_locator = pool.locator()?;
        self.confirm(&pool_locator, TargetState::Exists).await?;

        let mut volume_request = plan.volume.clone();
        pool_locator.account().clone_into(&mut volume_request.account);
        pool_locator.pool()?.clone_into(&mut volume_request.pool);
        info!(
            pool = %volume_request.pool,
            volume = %volume_request.name,
            "creating volume"
        );
        let volume = self
            .backend
            .create_volume(&volume_request)
            .await
            .map_err(|source| ProvisionError::Remote {
                step: ProvisionStep::CreateVolume,
                source,
            })?;
        let volume_locator = volume.locator()?;
        self.confirm(&volume_locator, TargetState::Exists).await?;
        info!(volume = %volume_locator, "volume ready");

        if plan.cleanup {
            for locator in [&volume_locator, &pool_locator, &account_locator] {
                self.delete_resource(locator).await?;
            }
        }

        Ok(ProvisionOutcome {
            account,
            pool,
            volume,
            cleaned_up: plan.cleanup,
        })
    }

    /// Deletes a single resource and waits until it is reported as absent.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Remote`] when the delete fails and
    /// [`ProvisionError::NotPropagated`] when the resource is still visible
    /// after the attempt budget.
    pub async fn delete_resource(
        &self,
        locator: &ResourceLocator,
    ) -> Result<(), ProvisionError<B::Error>> {
        info!(%locator, level = %locator.level(), "deleting resource");
        self.backend
            .delete(locator.key())
            .await
            .map_err(|source| ProvisionError::Remote {
                step: ProvisionStep::Delete(locator.level()),
                source,
            })?;
        self.confirm(locator, TargetState::Absent).await?;
        info!(%locator, "resource deleted");
        Ok(())
    }

    /// Parses `resource_id` and deletes the resource it names.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Locator`] when the id is malformed, plus
    /// everything [`Self::delete_resource`] returns.
    pub async fn delete_by_id(&self, resource_id: &str) -> Result<(), ProvisionError<B::Error>> {
        let locator = ResourceLocator::parse(resource_id)?;
        if !locator
            .subscription()
            .eq_ignore_ascii_case(self.backend.subscription_id())
        {
            return Err(LocatorError::Malformed {
                locator: resource_id.to_owned(),
                reason: format!(
                    "subscription does not match the credentials ({})",
                    self.backend.subscription_id()
                ),
            }
            .into());
        }
        self.delete_resource(&locator).await
    }

    async fn confirm(
        &self,
        locator: &ResourceLocator,
        target: TargetState,
    ) -> Result<u32, ProvisionError<B::Error>> {
        match await_state(&self.backend, locator, target, &self.poll)
            .await
            .map_err(ProvisionError::Wait)?
        {
            WaitOutcome::Confirmed { attempts } => Ok(attempts),
            WaitOutcome::TimedOut { attempts } => Err(ProvisionError::NotPropagated {
                locator: locator.to_string(),
                target,
                attempts,
            }),
        }
    }
}
