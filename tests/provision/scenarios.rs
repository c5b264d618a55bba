//! BDD scenarios for the provisioning workflow.

use rstest_bdd_macros::scenario;

use super::test_helpers::{ProvisionContextResult, provision_context_result};

#[scenario(
    path = "tests/features/provision.feature",
    name = "Provision an account, pool and volume"
)]
fn scenario_provision(provision_context_result: ProvisionContextResult) {
    drop(provision_context_result);
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Wait out propagation delay on the pool"
)]
fn scenario_propagation_delay(provision_context_result: ProvisionContextResult) {
    drop(provision_context_result);
}

#[scenario(path = "tests/features/provision.feature", name = "Clean up child first")]
fn scenario_cleanup(provision_context_result: ProvisionContextResult) {
    drop(provision_context_result);
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Surface a volume that never becomes visible"
)]
fn scenario_not_propagated(provision_context_result: ProvisionContextResult) {
    drop(provision_context_result);
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Surface volume creation failures"
)]
fn scenario_volume_create_failure(provision_context_result: ProvisionContextResult) {
    drop(provision_context_result);
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Stop on lookup failures"
)]
fn scenario_lookup_failure(provision_context_result: ProvisionContextResult) {
    drop(provision_context_result);
}
