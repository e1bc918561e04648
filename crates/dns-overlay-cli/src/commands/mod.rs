//! CLI definition and dispatch.

pub mod plan;
pub mod run;

use std::path::PathBuf;

use clap::Parser;
use dns_overlay_common::config::{OverlayConfig, ValidatedConfig};
use dns_overlay_common::constants::{DEFAULT_COMMAND, OVERLAY_FILE_ENV};

/// Run a command with a private /etc/resolv.conf.
#[derive(Parser, Debug)]
#[command(name = "dns-overlay", version, about, long_about = None)]
pub struct Cli {
    /// File to overlay /etc/resolv.conf with.
    #[arg(short = 'f', long = "resolv-file", env = OVERLAY_FILE_ENV)]
    pub resolv_file: PathBuf,

    /// Command to execute.
    #[arg(short, long, default_value = DEFAULT_COMMAND)]
    pub command: String,

    /// Environment variable set to 1 in the new process.
    #[arg(short, long = "env", value_name = "NAME")]
    pub env: Option<String>,

    /// Be verbose.
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the planned steps without mounting anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the dry-run plan as JSON.
    #[arg(long, requires = "dry_run")]
    pub json: bool,
}

impl Cli {
    /// Validates the arguments into a run configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the overlay file is unreadable or an argument is invalid.
    pub fn config(&self) -> anyhow::Result<ValidatedConfig> {
        let mut config = OverlayConfig::new(&self.resolv_file).with_command(&self.command);
        if let Some(name) = &self.env {
            config = config.with_marker_env(name);
        }
        config.verbose = self.verbose;
        Ok(config.validate()?)
    }
}

/// Dispatches the parsed CLI to the run or dry-run handler.
///
/// # Errors
///
/// Returns an error if validation or the gate's setup fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = cli.config()?;
    if cli.dry_run {
        plan::execute(&config, cli.json)
    } else {
        run::execute(&config)
    }
}
