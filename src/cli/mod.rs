//! Command-line interface definitions for the `anf-provision` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `anf-provision` binary.
#[derive(Debug, Parser)]
#[command(
    name = "anf-provision",
    about = "Provision Azure NetApp Files accounts, capacity pools and volumes",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Create an account, capacity pool and volume and wait for each to appear.
    #[command(
        name = "provision",
        about = "Create an account, capacity pool and volume and wait for each to appear"
    )]
    Provision(ProvisionCommand),
    /// Delete one NetApp resource and wait until it is gone.
    #[command(name = "delete", about = "Delete one NetApp resource and wait until it is gone")]
    Delete(DeleteCommand),
}

/// Arguments for the `anf-provision provision` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct ProvisionCommand {
    /// Delete the volume, pool and account again once the volume is visible.
    ///
    /// Overrides `should_cleanup` from configuration.
    #[arg(long)]
    pub(crate) cleanup: bool,
}

/// Arguments for the `anf-provision delete` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct DeleteCommand {
    /// Full resource id of an account, capacity pool, volume or snapshot.
    #[arg(value_name = "RESOURCE_ID")]
    pub(crate) resource_id: String,
}
