mod cli;
mod commands;
mod error;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use entitle_api::{RegistrationClient, TracingSink};

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Certificate commands are local; no client needed.
        Command::Cert(command) => commands::cert(command, &cli.global),

        Command::Status(args) => {
            let client = build_client(&cli.global)?;
            commands::status(&client, args, &cli.global).await
        }
        Command::Register(args) => {
            let client = build_client(&cli.global)?;
            commands::register(&client, args, &cli.global).await
        }
        Command::Deregister => {
            let client = build_client(&cli.global)?;
            commands::deregister(&client, &cli.global).await
        }
    }
}

/// Build a `RegistrationClient` from the config file plus CLI overrides.
fn build_client(global: &cli::GlobalOpts) -> Result<RegistrationClient, CliError> {
    let mut config = entitle_config::load()?;

    if let Some(url) = &global.url {
        config.url = url.clone();
    }
    if global.insecure {
        config.insecure = true;
    }
    if let Some(timeout) = global.timeout {
        config.timeout = timeout;
    }

    tracing::debug!(url = %config.url, insecure = config.insecure, "connecting");

    let mut builder = config.client_builder()?.sink(Arc::new(TracingSink));
    if let Some(path) = &global.credentials {
        builder = builder.credentials_path(path);
    }
    builder.build().map_err(CliError::from)
}
