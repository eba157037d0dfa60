//! Clap derive structures for the `sbbridge` binary.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// sbbridge -- expose SwitchBot devices as accessories
#[derive(Debug, Parser)]
#[command(
    name = "sbbridge",
    version,
    about = "Bridge SwitchBot devices to an accessory host",
    long_about = "Keeps SwitchBot locks, sensors, plugs, bots, vacuums and IR remotes in sync\n\
        with an accessory host, over the cloud OpenAPI, local BLE, or both.",
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
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, short = 'c', env = "SBBRIDGE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the bridge until interrupted
    Run(RunArgs),

    /// List the devices on the cloud account
    #[command(alias = "ls")]
    Devices(DevicesArgs),

    /// Validate the configuration and print the resolved devices
    Check,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Address for the accessory and webhook endpoints (overrides server.listen)
    #[arg(long, short = 'l')]
    pub listen: Option<SocketAddr>,
}

#[derive(Debug, Args)]
pub struct DevicesArgs {
    /// Print `[[devices]]` entries ready to paste into the config file
    #[arg(long)]
    pub toml: bool,
}
