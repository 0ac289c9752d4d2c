//! Clap derive structures for the `nestly` CLI.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// nestly -- watch and control Nest devices from the command line
#[derive(Debug, Parser)]
#[command(
    name = "nestly",
    version,
    about = "Watch and control Nest devices from the command line",
    long_about = "Streams live device and structure state from the Nest developer API\n\
        and writes device fields back.\n\n\
        Authorize once with `nestly auth`, then use `devices`, `watch`, or `set`.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Access token (overrides keyring and config)
    #[arg(long, env = "NESTLY_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "NESTLY_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Connect timeout in seconds (overrides config)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one identifier per line (scripting)
    Plain,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Exchange a PIN for an access token and save it
    Auth(AuthArgs),

    /// Stream live updates until the server closes the stream or Ctrl-C
    Watch,

    /// List devices
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// List structures (homes)
    #[command(alias = "st")]
    Structures,

    /// Write one field of one device
    Set(SetArgs),

    /// Inspect CLI configuration
    Config(ConfigArgs),
}

// ── Auth ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct AuthArgs {
    /// PIN shown on the Nest authorization page (prompted when omitted)
    #[arg(long)]
    pub pin: Option<String>,

    /// Store the token in the system keyring instead of the config file
    #[arg(long)]
    pub keyring: bool,
}

// ── Devices ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    /// Only devices with this exact name
    #[arg(long, short = 'n')]
    pub name: Option<String>,

    /// Only devices of this type (e.g. thermostats, smoke_co_alarms, cameras)
    #[arg(long, short = 't')]
    pub device_type: Option<String>,
}

// ── Set ──────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Device id
    pub device_id: String,

    /// Field name (e.g. target_temperature_f, hvac_mode)
    pub field: String,

    /// New value; parsed as JSON when possible, otherwise sent as a string
    pub value: String,

    /// Device type; skips the lookup stream when given
    #[arg(long, short = 't')]
    pub device_type: Option<String>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,
    /// Show the effective configuration (secrets masked)
    Show,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_set_with_global_flags() {
        let cli = Cli::try_parse_from([
            "nestly",
            "set",
            "peyiJNo0IldT2YlIVtYaGQ",
            "target_temperature_f",
            "72",
            "--device-type",
            "thermostats",
            "-o",
            "json",
            "-vv",
        ])
        .unwrap();

        assert_eq!(cli.global.verbose, 2);
        assert!(matches!(cli.global.output, OutputFormat::Json));
        match cli.command {
            Command::Set(args) => {
                assert_eq!(args.field, "target_temperature_f");
                assert_eq!(args.value, "72");
                assert_eq!(args.device_type.as_deref(), Some("thermostats"));
            }
            other => panic!("expected set, got {other:?}"),
        }
    }

    #[test]
    fn devices_alias() {
        let cli = Cli::try_parse_from(["nestly", "dev", "--name", "Hallway"]).unwrap();
        assert!(matches!(cli.command, Command::Devices(DevicesArgs { name: Some(ref n), .. }) if n == "Hallway"));
    }
}
