//! BDD step definitions for the provisioning workflow.

use std::time::Duration;

use anf_provision::test_support::{
    BackendCall, Operation, ScriptedBackendError, ScriptedLookup,
};
use anf_provision::{PollConfig, ProvisionError, ProvisionOrchestrator, ResourceKey};
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;

use super::test_helpers::{
    ACCOUNT_KEY, MAX_ATTEMPTS, POOL_KEY, ProvisionContext, ProvisionFailure,
    ProvisionFailureKind, ProvisionResult, VOLUME_KEY,
};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("a ready provisioning workflow")]
fn ready_workflow(provision_context: ProvisionContext) -> ProvisionContext {
    provision_context
}

#[given("cleanup is requested")]
fn cleanup_requested(mut provision_context: ProvisionContext) -> ProvisionContext {
    provision_context.plan.cleanup = true;
    provision_context
}

#[given("the pool becomes visible after {count} lookups")]
fn pool_visible_after(provision_context: ProvisionContext, count: usize) -> ProvisionContext {
    let misses = vec![ScriptedLookup::NotFound; count.saturating_sub(1)];
    provision_context.backend.script_lookups(POOL_KEY, misses);
    provision_context
}

#[given("the volume never becomes visible")]
fn volume_never_visible(provision_context: ProvisionContext) -> ProvisionContext {
    let misses = (0..MAX_ATTEMPTS).map(|_| ScriptedLookup::NotFound);
    provision_context.backend.script_lookups(VOLUME_KEY, misses);
    provision_context
}

#[given("volume creation fails")]
fn volume_creation_fails(provision_context: ProvisionContext) -> ProvisionContext {
    provision_context.backend.fail_on(Operation::CreateVolume);
    provision_context
}

#[given("account lookups are throttled")]
fn account_lookups_throttled(provision_context: ProvisionContext) -> ProvisionContext {
    provision_context.backend.script_lookups(
        ACCOUNT_KEY,
        [ScriptedLookup::Error(String::from("TooManyRequests"))],
    );
    provision_context
}

#[when("I provision the volume")]
fn provision_volume(provision_context: ProvisionContext) -> Result<ProvisionContext, StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))?;
    let ProvisionContext { backend, plan, .. } = provision_context;

    let orchestrator = ProvisionOrchestrator::new(
        backend.clone(),
        PollConfig::new(Duration::ZERO, MAX_ATTEMPTS),
    );
    let plan_clone = plan.clone();
    let result = runtime.block_on(async move { orchestrator.execute(&plan_clone).await });
    let outcome = match result {
        Ok(_) => ProvisionResult::Success,
        Err(err) => ProvisionResult::Failure(ProvisionFailure {
            kind: map_failure_kind(&err),
            message: err.to_string(),
        }),
    };

    Ok(ProvisionContext {
        backend,
        plan,
        outcome: Some(outcome),
    })
}

#[then("the provisioning result is successful")]
fn provision_success(provision_context: &ProvisionContext) -> Result<(), StepError> {
    match provision_context.outcome {
        Some(ProvisionResult::Success) => Ok(()),
        Some(ProvisionResult::Failure(ref failure)) => Err(StepError::Assertion(format!(
            "expected success, got failure: {}",
            failure.message
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

#[then("the provisioning error kind is \"{kind}\"")]
fn provision_error_kind(provision_context: &ProvisionContext, kind: String) -> Result<(), StepError> {
    let expected = parse_failure_kind(&kind)?;
    let Some(ProvisionResult::Failure(failure)) = &provision_context.outcome else {
        return Err(StepError::Assertion(String::from(
            "expected failure outcome",
        )));
    };
    if failure.kind == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected failure kind {expected:?}, got {:?}: {}",
            failure.kind, failure.message
        )))
    }
}

#[then("resources were created parent first")]
fn created_parent_first(provision_context: &ProvisionContext) -> Result<(), StepError> {
    let creates: Vec<BackendCall> = provision_context
        .backend
        .calls()
        .into_iter()
        .filter(|call| {
            matches!(
                call,
                BackendCall::CreateAccount(_)
                    | BackendCall::CreatePool(_)
                    | BackendCall::CreateVolume(_)
            )
        })
        .collect();
    let expected = vec![
        BackendCall::CreateAccount(provision_context.plan.account.name.clone()),
        BackendCall::CreatePool(provision_context.plan.pool.name.clone()),
        BackendCall::CreateVolume(provision_context.plan.volume.name.clone()),
    ];
    if creates == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {expected:?}, got {creates:?}"
        )))
    }
}

#[then("the pool was looked up {count} times")]
fn pool_lookups(provision_context: &ProvisionContext, count: usize) -> Result<(), StepError> {
    let actual = provision_context.backend.lookups_for(POOL_KEY);
    if actual == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} pool lookups, got {actual}"
        )))
    }
}

#[then("every resource was deleted child first")]
fn deleted_child_first(provision_context: &ProvisionContext) -> Result<(), StepError> {
    let deletes: Vec<BackendCall> = provision_context
        .backend
        .calls()
        .into_iter()
        .filter(|call| matches!(call, BackendCall::Delete(_)))
        .collect();
    let expected: Vec<BackendCall> = [VOLUME_KEY, POOL_KEY, ACCOUNT_KEY]
        .into_iter()
        .map(|key: ResourceKey<'_>| BackendCall::Delete(key.to_string()))
        .collect();
    if deletes != expected {
        return Err(StepError::Assertion(format!(
            "expected {expected:?}, got {deletes:?}"
        )));
    }
    if provision_context.backend.contains(ACCOUNT_KEY) {
        return Err(StepError::Assertion(String::from(
            "account should be gone after cleanup",
        )));
    }
    Ok(())
}

#[then("no pool is created")]
fn pool_not_created(provision_context: &ProvisionContext) -> Result<(), StepError> {
    let created = provision_context
        .backend
        .calls()
        .iter()
        .any(|call| matches!(call, BackendCall::CreatePool(_)));
    if created {
        Err(StepError::Assertion(String::from(
            "pool should not be created",
        )))
    } else {
        Ok(())
    }
}

const fn map_failure_kind(err: &ProvisionError<ScriptedBackendError>) -> ProvisionFailureKind {
    match err {
        ProvisionError::Remote { .. } => ProvisionFailureKind::Remote,
        ProvisionError::Wait(_) => ProvisionFailureKind::Wait,
        ProvisionError::NotPropagated { .. } => ProvisionFailureKind::NotPropagated,
        ProvisionError::Locator(_) => ProvisionFailureKind::Locator,
    }
}

fn parse_failure_kind(kind: &str) -> Result<ProvisionFailureKind, StepError> {
    match kind {
        "remote" => Ok(ProvisionFailureKind::Remote),
        "wait" => Ok(ProvisionFailureKind::Wait),
        "not-propagated" => Ok(ProvisionFailureKind::NotPropagated),
        "locator" => Ok(ProvisionFailureKind::Locator),
        _ => Err(StepError::Assertion(format!(
            "unknown failure kind: {kind}"
        ))),
    }
}
