//! # icx
//!
//! Command-line access to identity connectors.

#![forbid(unsafe_code)]

use anyhow::Context;
use clap::Parser;
use ic_cli::{
    cli::{Cli, Command},
    commands::{
        run_check_credentials, run_identities, run_ous, run_roles, run_status, ConnectorHandle,
    },
    config::CliConfig,
    output::error,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = CliConfig::load(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;
    let output = config.effective_output(cli.output);
    let handle = ConnectorHandle::new(&config).context("invalid connector configuration")?;

    match cli.command {
        Command::Identities { name, guid } => {
            run_identities(&handle, name.as_deref(), guid.as_deref(), output)?;
        }
        Command::Roles { name } => run_roles(&handle, name.as_deref(), output)?,
        Command::Ous => run_ous(&handle, output)?,
        Command::CheckCredentials {
            principal,
            password,
        } => run_check_credentials(&handle, &principal, password)?,
        Command::Status => run_status(&handle)?,
    }
    Ok(())
}
