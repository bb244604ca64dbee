// src/cli.rs

//! Command line of the `backhaul` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::default_config_path;
use crate::types::ExitCode;

/// Command-line arguments for `backhaul`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "backhaul",
    version,
    about = "Run backup phases through supervised SSH tunnels and background remote commands.",
    long_about = None
)]
pub struct CliArgs {
    /// What to do; without a subcommand the phases are run.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// TOML file describing tunnels, remote commands and phases.
    #[arg(long, global = true, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Run only the phase with this name.
    #[arg(long, value_name = "NAME")]
    pub phase: Option<String>,

    /// Verbosity of status output on stderr.
    ///
    /// If omitted, `BACKHAUL_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print phases and command lines, but don't execute
    /// anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Operator commands. All but `run` act on `[config].lockfile` only.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Run the configured phases (the default).
    Run,
    /// Show whether a run holds the lock or runs are disabled.
    Status,
    /// Forcibly remove the lock left behind by a run that died.
    Unlock {
        /// Do not ask for confirmation.
        #[arg(long, short)]
        yes: bool,
    },
    /// Disable runs until `start`; a run in progress finishes normally.
    Stop,
    /// Re-enable runs disabled with `stop`.
    Start,
}

impl CliArgs {
    /// The subcommand, with a bare invocation meaning `run`.
    pub fn command(&self) -> &Command {
        self.command.as_ref().unwrap_or(&Command::Run)
    }
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Parse the process arguments, exiting with [`ExitCode::USAGE`] on bad
/// input (`--help` and `--version` exit with [`ExitCode::OK`]).
pub fn parse() -> CliArgs {
    match CliArgs::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            let code = if err.use_stderr() {
                ExitCode::USAGE
            } else {
                ExitCode::OK
            };
            std::process::exit(code);
        }
    }
}
