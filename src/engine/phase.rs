// src/engine/phase.rs

use tracing::{error, info, warn};

use crate::alert::Alerter;
use crate::config::{ConfigFile, PhaseConfig};
use crate::errors::{BackhaulError, Result};
use crate::exec::{CommandSpec, run_with_logging};
use crate::process::BackgroundLauncher;
use crate::ssh;
use crate::supervisor::Supervisor;
use crate::types::ExitCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOutcome {
    Succeeded,
    /// The phase was abandoned; `code` is the phase error code recorded.
    Failed { code: i32 },
}

/// Outcome of every phase that ran, in run order.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub phases: Vec<(String, PhaseOutcome)>,
}

impl RunSummary {
    /// `0` if every phase succeeded, otherwise the code of the last failed
    /// phase.
    pub fn exit_code(&self) -> i32 {
        self.phases
            .iter()
            .rev()
            .find_map(|(_, outcome)| match outcome {
                PhaseOutcome::Failed { code } => Some(*code),
                PhaseOutcome::Succeeded => None,
            })
            .unwrap_or(ExitCode::OK)
    }

    pub fn failed(&self) -> impl Iterator<Item = &str> {
        self.phases
            .iter()
            .filter(|(_, o)| *o != PhaseOutcome::Succeeded)
            .map(|(name, _)| name.as_str())
    }
}

/// Run the configured phases in order, or just `only` if given.
///
/// A failed phase does not stop later ones; only [`BackhaulError::Fatal`]
/// (the `exit` tunnel-failure policy) ends the run early.
pub async fn run_phases<L, A>(
    supervisor: &mut Supervisor<L, A>,
    cfg: &ConfigFile,
    only: Option<&str>,
) -> Result<RunSummary>
where
    L: BackgroundLauncher,
    A: Alerter,
{
    let phases: Vec<&PhaseConfig> = match only {
        Some(name) => vec![cfg.find_phase(name).ok_or_else(|| {
            BackhaulError::ConfigError(format!("no phase named '{name}'"))
        })?],
        None => cfg.phase.iter().collect(),
    };

    let mut summary = RunSummary::default();
    for phase in phases {
        let outcome = run_phase(supervisor, cfg, phase).await?;
        summary.phases.push((phase.name.clone(), outcome));
    }

    let failed: Vec<&str> = summary.failed().collect();
    if failed.is_empty() {
        info!(count = summary.phases.len(), "all phases finished");
    } else {
        warn!(?failed, "some phases failed");
    }
    Ok(summary)
}

/// Run one phase.
///
/// Whatever the phase started is torn down again, most recent first,
/// before this returns, whether the phase succeeded or not.
pub async fn run_phase<L, A>(
    supervisor: &mut Supervisor<L, A>,
    cfg: &ConfigFile,
    phase: &PhaseConfig,
) -> Result<PhaseOutcome>
where
    L: BackgroundLauncher,
    A: Alerter,
{
    info!(phase = %phase.name, "starting phase");

    let mut opened: Vec<&str> = Vec::new();
    let mut launched: Vec<&str> = Vec::new();
    let result = start_and_run(supervisor, cfg, phase, &mut opened, &mut launched).await;

    for name in launched.iter().rev() {
        supervisor.terminate(name, true).await;
    }
    for name in opened.iter().rev() {
        supervisor.close(name, true).await;
    }

    match result {
        Ok(None) => {}
        Ok(Some(code)) => {
            error!(phase = %phase.name, exit_code = code, "phase command failed");
            supervisor.record_phase_error(ExitCode::PHASE_COMMAND);
        }
        // The supervisor has already recorded the phase error.
        Err(BackhaulError::PhaseAborted { name, reason }) => {
            warn!(phase = %phase.name, tunnel = %name, %reason, "phase aborted");
        }
        Err(e @ BackhaulError::Fatal { .. }) => return Err(e),
        Err(e) => {
            error!(phase = %phase.name, error = %e, "phase failed");
            supervisor.record_phase_error(ExitCode::PHASE_COMMAND);
        }
    }

    // Taking the code resets it for the next phase.
    let outcome = match supervisor.take_phase_error() {
        None => PhaseOutcome::Succeeded,
        Some(code) => PhaseOutcome::Failed { code },
    };

    info!(phase = %phase.name, ?outcome, "phase finished");
    Ok(outcome)
}

/// Bring the phase's processes up and run its command.
///
/// Returns `Ok(Some(code))` when the command exited non-zero.
async fn start_and_run<'a, L, A>(
    supervisor: &mut Supervisor<L, A>,
    cfg: &ConfigFile,
    phase: &'a PhaseConfig,
    opened: &mut Vec<&'a str>,
    launched: &mut Vec<&'a str>,
) -> Result<Option<i32>>
where
    L: BackgroundLauncher,
    A: Alerter,
{
    for name in phase.tunnels.iter() {
        let tunnel = cfg.tunnel.get(name).ok_or_else(|| {
            BackhaulError::ConfigError(format!("unknown tunnel '{name}'"))
        })?;
        let request = ssh::tunnel_request(&cfg.ssh, name, tunnel);
        supervisor.open(name, &request, true).await?;
        opened.push(name);
    }

    for name in phase.remote.iter() {
        let remote = cfg.remote.get(name).ok_or_else(|| {
            BackhaulError::ConfigError(format!("unknown remote command '{name}'"))
        })?;
        supervisor
            .launch(name, &ssh::remote_command(&cfg.ssh, remote), true)
            .await?;
        launched.push(name);
    }

    let Some(spec) = phase.cmd.as_deref().and_then(CommandSpec::from_argv) else {
        return Ok(None);
    };

    let descr = format!("phase {}", phase.name);
    let code = run_with_logging(&descr, &spec, cfg.config.print_cmds).await?;
    Ok((code != 0).then_some(code))
}
