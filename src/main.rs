//! Binary entry point for the `anf-provision` CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tracing::info;

use anf_provision::{
    AzureBackend, AzureBackendError, AzureCredentials, ConfigError, LocatorError, NetAppBackend,
    ProvisionConfig, ProvisionError, ProvisionOrchestrator, ProvisionOutcome, ProvisionPlan,
    ResourceLocator,
};

mod cli;

use cli::{Cli, DeleteCommand, ProvisionCommand};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("backend error: {0}")]
    Backend(#[from] AzureBackendError),
    #[error(transparent)]
    Locator(#[from] LocatorError),
    #[error("provisioning failed: {0}")]
    Provision(#[from] ProvisionError<AzureBackendError>),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli {
        Cli::Provision(command) => provision_command(command).await,
        Cli::Delete(command) => delete_command(command).await,
    }
}

fn load_config(cleanup_override: bool) -> Result<ProvisionConfig, CliError> {
    let mut config = ProvisionConfig::load_without_cli_args()?;
    if cleanup_override {
        config.should_cleanup = true;
    }
    config.validate()?;
    Ok(config)
}

fn connect(config: &ProvisionConfig) -> Result<AzureBackend, CliError> {
    let credentials = AzureCredentials::locate(config.auth_location())?;
    Ok(AzureBackend::new(credentials, config.api_version.as_str())?)
}

async fn provision_command(args: ProvisionCommand) -> Result<(), CliError> {
    let config = load_config(args.cleanup)?;
    let backend = connect(&config)?;
    let plan = ProvisionPlan::from_config(&config, backend.subscription_id())?;
    info!(
        account = %plan.account.name,
        pool = %plan.pool.name,
        volume = %plan.volume.name,
        cleanup = plan.cleanup,
        "starting provisioning run"
    );

    let orchestrator = ProvisionOrchestrator::new(backend, config.poll_config());
    let outcome = orchestrator.execute(&plan).await?;
    write_summary(io::stdout(), &outcome);
    Ok(())
}

async fn delete_command(args: DeleteCommand) -> Result<(), CliError> {
    let locator = ResourceLocator::parse(&args.resource_id)?;
    let config = load_config(false)?;
    let backend = connect(&config)?;
    let orchestrator = ProvisionOrchestrator::new(backend, config.poll_config());
    orchestrator.delete_by_id(locator.as_str()).await?;
    writeln!(io::stdout(), "deleted {locator}").ok();
    Ok(())
}

fn write_summary(mut target: impl Write, outcome: &ProvisionOutcome) {
    writeln!(target, "account: {}", outcome.account.id).ok();
    writeln!(target, "pool:    {}", outcome.pool.id).ok();
    writeln!(target, "volume:  {}", outcome.volume.id).ok();
    if outcome.cleaned_up {
        writeln!(target, "all resources deleted again").ok();
    }
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
