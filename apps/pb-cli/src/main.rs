//! # pb-cli
//!
//! Command-line interface for the pbuild policy builder.
//!
//! - `pbuild build`: compile policy sources into a bundle archive
//! - `pbuild version`: print library and toolchain metadata
//! - `pbuild capabilities`: list releases or print a capability set
//!
//! Defaults are read from `pbuild.toml` when present; flags override them.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// pbuild: compile Rego policies into deployable bundles.
#[derive(Parser)]
#[command(name = "pbuild", version, about)]
struct Cli {
    /// Config file with build defaults.
    #[arg(long, default_value = pb_build::CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile policy sources into a bundle.
    Build(commands::build::BuildArgs),
    /// Print version metadata.
    Version {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Inspect the capability catalog.
    Capabilities {
        /// Release whose capabilities to print (default: the current one).
        #[arg(long)]
        version: Option<String>,
        /// List the known releases instead.
        #[arg(long, conflicts_with = "version")]
        list: bool,
    },
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they never mix with command output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pb_build=warn".parse()?))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Build(args) => commands::build::execute(args, &cli.config),
        Commands::Version { json } => commands::version::execute(*json),
        Commands::Capabilities { version, list } => {
            commands::capabilities::execute(version.as_deref(), *list)
        }
    }
}
