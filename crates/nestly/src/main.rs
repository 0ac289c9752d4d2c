mod cli;
mod commands;
mod error;
mod output;

use std::time::Duration;

use clap::Parser;
use secrecy::{ExposeSecret, SecretString};
use tracing_subscriber::EnvFilter;

use nestly_core::Nest;

use crate::cli::{Cli, Command, GlobalOpts};
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
    let cfg = nestly_config::load_config_or_default();

    match cli.command {
        // Config commands never touch the network
        Command::Config(args) => commands::config_cmd::handle(&args, &cfg, &cli.global),

        // Auth runs before a token exists
        Command::Auth(args) => {
            let nest = build_nest(&cfg, &cli.global)?;
            commands::auth::handle(&args, &nest, cfg, &cli.global).await
        }

        Command::Watch => commands::watch::handle(&connect(&cfg, &cli.global)?, &cli.global).await,
        Command::Devices(args) => {
            commands::devices::handle(&args, &connect(&cfg, &cli.global)?, &cli.global).await
        }
        Command::Structures => {
            commands::structures::handle(&connect(&cfg, &cli.global)?, &cli.global).await
        }
        Command::Set(args) => {
            commands::set::handle(&args, &connect(&cfg, &cli.global)?, &cli.global).await
        }
    }
}

/// Build the context and install the resolved token.
fn connect(cfg: &nestly_config::Config, global: &GlobalOpts) -> Result<Nest, CliError> {
    let nest = build_nest(cfg, global)?;
    let token = resolve_token(cfg, global)?;
    nest.set_token(token.expose_secret())?;
    tracing::debug!(api_root = %nest.config().api_root, "token installed");
    Ok(nest)
}

/// Build the SDK context from the config file plus CLI overrides.
fn build_nest(cfg: &nestly_config::Config, global: &GlobalOpts) -> Result<Nest, CliError> {
    let mut config = nestly_config::to_nest_config(cfg)?;
    if let Some(secs) = global.timeout {
        config.timeout = Duration::from_secs(secs);
    }
    Ok(Nest::new(config)?)
}

/// `--token` / `NESTLY_TOKEN` first, then the config crate's chain.
fn resolve_token(cfg: &nestly_config::Config, global: &GlobalOpts) -> Result<SecretString, CliError> {
    if let Some(ref token) = global.token {
        return Ok(SecretString::from(token.clone()));
    }
    Ok(nestly_config::resolve_token(cfg)?)
}
