//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::backend::{
    AccountRequest, BackendFuture, LookupFuture, NetAppBackend, NetAppResource, PollOutcome,
    PoolRequest, VolumeRequest,
};
use crate::locator::{ResourceKey, ResourceLevel};

/// Subscription used by [`ScriptedBackend`] unless overridden.
pub const TEST_SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000000";

/// Error returned by [`ScriptedBackend`] when a failure is injected.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("scripted failure: {message}")]
pub struct ScriptedBackendError {
    /// Message supplied when the failure was scripted.
    pub message: String,
}

/// Scripted answer for a single lookup.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ScriptedLookup {
    /// Report the resource as present.
    Found,
    /// Report the resource as absent.
    NotFound,
    /// Fail the lookup with the given message.
    Error(String),
}

/// Operations whose failure can be injected.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Operation {
    /// `create_account`
    CreateAccount,
    /// `create_pool`
    CreatePool,
    /// `create_volume`
    CreateVolume,
    /// `delete` at the given level.
    Delete(ResourceLevel),
}

/// Call recorded by [`ScriptedBackend`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BackendCall {
    /// Account creation with the account name.
    CreateAccount(String),
    /// Pool creation with the pool name.
    CreatePool(String),
    /// Volume creation with the volume name.
    CreateVolume(String),
    /// Lookup of the key rendered as `rg/netAppAccounts/...`.
    Get(String),
    /// Deletion of the key rendered as `rg/netAppAccounts/...`.
    Delete(String),
}

#[derive(Debug, Default)]
struct State {
    resources: BTreeMap<String, NetAppResource>,
    scripted: BTreeMap<String, VecDeque<ScriptedLookup>>,
    failures: HashSet<Operation>,
    calls: Vec<BackendCall>,
}

/// In-memory control plane that models resources as a map and lets tests
/// script lookup answers to simulate propagation delay.
///
/// Lookups consume scripted answers for their key first and fall back to the
/// in-memory state once the script for that key is exhausted.
#[derive(Clone, Debug)]
pub struct ScriptedBackend {
    state: Arc<Mutex<State>>,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBackend {
    /// Creates an empty backend in [`TEST_SUBSCRIPTION`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues lookup answers for `key`.
    pub fn script_lookups(
        &self,
        key: ResourceKey<'_>,
        answers: impl IntoIterator<Item = ScriptedLookup>,
    ) {
        self.lock()
            .scripted
            .entry(key.to_string())
            .or_default()
            .extend(answers);
    }

    /// Makes every subsequent call of `operation` fail.
    pub fn fail_on(&self, operation: Operation) {
        self.lock().failures.insert(operation);
    }

    /// Seeds an existing resource.
    pub fn insert_existing(&self, key: ResourceKey<'_>, location: &str) {
        let mut state = self.lock();
        let resource = resource_for(key, location);
        state.resources.insert(key.to_string(), resource);
    }

    /// Returns `true` when the resource is present in the in-memory state.
    #[must_use]
    pub fn contains(&self, key: ResourceKey<'_>) -> bool {
        self.lock().resources.contains_key(&key.to_string())
    }

    /// Snapshot of every call made so far.
    #[must_use]
    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    /// Number of lookups made for `key`.
    #[must_use]
    pub fn lookups_for(&self, key: ResourceKey<'_>) -> usize {
        let rendered = key.to_string();
        self.lock()
            .calls
            .iter()
            .filter(|call| matches!(call, BackendCall::Get(target) if *target == rendered))
            .count()
    }

    fn create(
        &self,
        operation: Operation,
        call: BackendCall,
        key: ResourceKey<'_>,
        location: &str,
    ) -> Result<NetAppResource, ScriptedBackendError> {
        let mut state = self.lock();
        state.calls.push(call);
        if state.failures.contains(&operation) {
            return Err(ScriptedBackendError {
                message: format!("{operation:?} failed"),
            });
        }
        let resource = resource_for(key, location);
        state.resources.insert(key.to_string(), resource.clone());
        Ok(resource)
    }

    fn lookup(&self, key: ResourceKey<'_>) -> PollOutcome<ScriptedBackendError> {
        let rendered = key.to_string();
        let mut state = self.lock();
        state.calls.push(BackendCall::Get(rendered.clone()));
        let scripted = state
            .scripted
            .get_mut(&rendered)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(ScriptedLookup::Found) => {
                PollOutcome::Found(resource_for(key, "scripted"))
            }
            Some(ScriptedLookup::NotFound) => PollOutcome::NotFound,
            Some(ScriptedLookup::Error(message)) => {
                PollOutcome::TransientError(ScriptedBackendError { message })
            }
            None => state
                .resources
                .get(&rendered)
                .cloned()
                .map_or(PollOutcome::NotFound, PollOutcome::Found),
        }
    }

    fn remove(&self, key: ResourceKey<'_>) -> Result<(), ScriptedBackendError> {
        let rendered = key.to_string();
        let mut state = self.lock();
        state.calls.push(BackendCall::Delete(rendered.clone()));
        if state.failures.contains(&Operation::Delete(key.level())) {
            return Err(ScriptedBackendError {
                message: format!("delete {} failed", key.level()),
            });
        }
        state.resources.remove(&rendered);
        Ok(())
    }
}

fn resource_for(key: ResourceKey<'_>, location: &str) -> NetAppResource {
    let id = key.resource_id(TEST_SUBSCRIPTION);
    let name = match key {
        ResourceKey::Account { account, .. } => account.to_owned(),
        ResourceKey::Pool { account, pool, .. } => format!("{account}/{pool}"),
        ResourceKey::Volume {
            account,
            pool,
            volume,
            ..
        } => format!("{account}/{pool}/{volume}"),
        ResourceKey::Snapshot {
            account,
            pool,
            volume,
            snapshot,
            ..
        } => format!("{account}/{pool}/{volume}/{snapshot}"),
    };
    NetAppResource {
        id,
        name,
        location: location.to_owned(),
        provisioning_state: Some(String::from("Succeeded")),
    }
}

impl NetAppBackend for ScriptedBackend {
    type Error = ScriptedBackendError;

    fn subscription_id(&self) -> &str {
        TEST_SUBSCRIPTION
    }

    fn create_account<'a>(
        &'a self,
        request: &'a AccountRequest,
    ) -> BackendFuture<'a, NetAppResource, Self::Error> {
        Box::pin(async move {
            self.create(
                Operation::CreateAccount,
                BackendCall::CreateAccount(request.name.clone()),
                request.key(),
                &request.location,
            )
        })
    }

    fn create_pool<'a>(
        &'a self,
        request: &'a PoolRequest,
    ) -> BackendFuture<'a, NetAppResource, Self::Error> {
        Box::pin(async move {
            self.create(
                Operation::CreatePool,
                BackendCall::CreatePool(request.name.clone()),
                request.key(),
                &request.location,
            )
        })
    }

    fn create_volume<'a>(
        &'a self,
        request: &'a VolumeRequest,
    ) -> BackendFuture<'a, NetAppResource, Self::Error> {
        Box::pin(async move {
            self.create(
                Operation::CreateVolume,
                BackendCall::CreateVolume(request.name.clone()),
                request.key(),
                &request.location,
            )
        })
    }

    fn get<'a>(&'a self, key: ResourceKey<'a>) -> LookupFuture<'a, Self::Error> {
        Box::pin(async move { self.lookup(key) })
    }

    fn delete<'a>(&'a self, key: ResourceKey<'a>) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(async move { self.remove(key) })
    }
}
