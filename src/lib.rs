// src/lib.rs

pub mod alert;
pub mod cleanup;
pub mod cli;
pub mod config;
pub mod control;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod process;
pub mod ssh;
pub mod supervisor;
pub mod types;

use tracing::debug;

use crate::alert::alerter_from_config;
use crate::cli::{CliArgs, Command};
use crate::config::ConfigFile;
use crate::engine::Runtime;
use crate::errors::Result;
use crate::process::ProcessLauncher;
use crate::supervisor::{Supervisor, SupervisorOptions};
use crate::types::ExitCode;

/// High-level entry point used by `main.rs`.
///
/// Operator subcommands (`status`, `unlock`, `stop`, `start`) only touch
/// the run lock. A run wires together:
/// - the process launcher and alerter selected by the config
/// - the supervisor
/// - the runtime (lockfile, phases, signal handling, exit-callback drain)
///
/// Returns the exit code for the process.
pub async fn run(args: CliArgs, cfg: ConfigFile) -> Result<i32> {
    let command = args.command();
    if *command != Command::Run {
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        return control::execute(command, &cfg, &mut stdin.lock(), &mut stdout.lock());
    }

    if args.dry_run {
        print_dry_run(&cfg, args.phase.as_deref());
        return Ok(ExitCode::OK);
    }

    let launcher = ProcessLauncher::new(cfg.config.print_cmds);
    let alerter = alerter_from_config(cfg.config.alert_cmd.as_deref());
    let options = SupervisorOptions::from_config(&cfg.config);
    let supervisor = Supervisor::new(launcher, alerter, options);

    let mut runtime = Runtime::new(cfg, supervisor);
    Ok(runtime.run(args.phase.as_deref()).await)
}

/// Simple dry-run output: print settings, phases and command lines.
fn print_dry_run(cfg: &ConfigFile, only: Option<&str>) {
    println!("backhaul dry-run");
    println!("  config.tunnel_timeout = {}", cfg.config.tunnel_timeout);
    println!("  config.on_tunnel_failure = {}", cfg.config.on_tunnel_failure);
    if let Some(ref lockfile) = cfg.config.lockfile {
        println!("  config.lockfile = {}", lockfile.display());
    }
    println!();

    let phases = cfg
        .phase
        .iter()
        .filter(|p| only.is_none_or(|name| p.name == name));

    for phase in phases {
        println!("phase {}:", phase.name);
        for name in phase.tunnels.iter() {
            if let Some(tunnel) = cfg.tunnel.get(name) {
                println!("  tunnel {name}: {}", tunnel.effective_description(name));
                println!("      cmd: {}", ssh::tunnel_command(&cfg.ssh, tunnel));
            }
        }
        for name in phase.remote.iter() {
            if let Some(remote) = cfg.remote.get(name) {
                println!("  remote {name}:");
                println!("      cmd: {}", ssh::remote_command(&cfg.ssh, remote));
            }
        }
        if let Some(spec) = phase.cmd.as_deref().and_then(exec::CommandSpec::from_argv) {
            println!("  cmd: {spec}");
        }
    }

    debug!("dry-run complete (no execution)");
}
