//! Shared fixtures for provisioning BDD scenarios.

use anf_provision::test_support::{ScriptedBackend, TEST_SUBSCRIPTION};
use anf_provision::{ConfigError, ProvisionConfig, ProvisionPlan, ResourceKey};
use rstest::fixture;
use thiserror::Error;

pub const RESOURCE_GROUP: &str = "anf01-rg";
pub const ACCOUNT: &str = "acct";
pub const POOL: &str = "Pool01";
pub const VOLUME: &str = "Vol-acct-Pool01";
pub const MAX_ATTEMPTS: u32 = 3;

pub const ACCOUNT_KEY: ResourceKey<'static> = ResourceKey::Account {
    resource_group: RESOURCE_GROUP,
    account: ACCOUNT,
};
pub const POOL_KEY: ResourceKey<'static> = ResourceKey::Pool {
    resource_group: RESOURCE_GROUP,
    account: ACCOUNT,
    pool: POOL,
};
pub const VOLUME_KEY: ResourceKey<'static> = ResourceKey::Volume {
    resource_group: RESOURCE_GROUP,
    account: ACCOUNT,
    pool: POOL,
    volume: VOLUME,
};

#[derive(Clone, Debug)]
pub struct ProvisionContext {
    pub backend: ScriptedBackend,
    pub plan: ProvisionPlan,
    pub outcome: Option<ProvisionResult>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProvisionFailureKind {
    Remote,
    Wait,
    NotPropagated,
    Locator,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProvisionFailure {
    pub kind: ProvisionFailureKind,
    pub message: String,
}

#[derive(Clone, Debug)]
pub enum ProvisionResult {
    Success,
    Failure(ProvisionFailure),
}

#[derive(Debug, Error)]
pub enum ProvisionTestError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type ProvisionContextResult = Result<ProvisionContext, ProvisionTestError>;

#[fixture]
pub fn provision_context_result() -> ProvisionContextResult {
    build_provision_context()
}

#[fixture]
pub fn provision_context(provision_context_result: ProvisionContextResult) -> ProvisionContext {
    provision_context_result
        .unwrap_or_else(|err| panic!("provision context fixture should initialise: {err}"))
}

fn build_provision_context() -> ProvisionContextResult {
    let config = ProvisionConfig {
        account_name: Some(String::from(ACCOUNT)),
        ..ProvisionConfig::default()
    };
    let plan = ProvisionPlan::from_config(&config, TEST_SUBSCRIPTION)?;

    Ok(ProvisionContext {
        backend: ScriptedBackend::new(),
        plan,
        outcome: None,
    })
}
