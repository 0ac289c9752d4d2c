//! Config subcommand handlers.

use std::fmt::Write;

use nestly_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

const MASK: &str = "****";

/// Format config for display, masking secrets.
fn format_config_redacted(cfg: &Config) -> String {
    let mut out = String::new();

    let mut line = |key: &str, value: Option<&str>| {
        if let Some(v) = value {
            let _ = writeln!(out, "{key} = \"{v}\"");
        }
    };
    line("token", cfg.token.as_ref().map(|_| MASK));
    line("client_id", cfg.client_id.as_deref());
    line("product_id", cfg.product_id.as_deref());
    line("product_secret", cfg.product_secret.as_ref().map(|_| MASK));
    line("api_root", cfg.api_root.as_deref());
    line("token_url", cfg.token_url.as_deref());
    let ca = cfg.ca_cert.as_ref().map(|p| p.display().to_string());
    line("ca_cert", ca.as_deref());

    let _ = writeln!(out, "timeout = {}", cfg.timeout);
    out
}

fn redacted(cfg: &Config) -> Config {
    Config {
        token: cfg.token.as_ref().map(|_| MASK.into()),
        product_secret: cfg.product_secret.as_ref().map(|_| MASK.into()),
        ..cfg.clone()
    }
}

pub fn handle(args: &ConfigArgs, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&nestly_config::config_path().display().to_string(), global.quiet);
        }
        ConfigCommand::Show => {
            let out = match global.output {
                OutputFormat::Json => output::render_json_pretty(&redacted(cfg)),
                OutputFormat::JsonCompact => output::render_json_compact(&redacted(cfg)),
                OutputFormat::Table | OutputFormat::Plain => format_config_redacted(cfg),
            };
            output::print_output(out.trim_end(), global.quiet);
        }
    }
    Ok(())
}
