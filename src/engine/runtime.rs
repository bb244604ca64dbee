// src/engine/runtime.rs

use std::fmt;
use std::future::Future;

use tracing::{error, info, warn};

use crate::alert::{AlertChannel, Alerter};
use crate::cleanup::{CleanupAction, LockState, acquire_lockfile, lock_state, note_lock_contention};
use crate::config::ConfigFile;
use crate::errors::Result;
use crate::process::BackgroundLauncher;
use crate::supervisor::Supervisor;

use super::phase::{RunSummary, run_phases};
use super::shutdown::{ShutdownSignal, shutdown_signal};

/// How the pipeline part of a run ended.
enum RunEnd {
    Finished(Result<RunSummary>),
    Interrupted(ShutdownSignal),
}

/// One run of the toolkit: lockfile, phases, and the exit-callback drain.
///
/// Every way out of [`Runtime::run_until`] (phases finished, a fatal
/// tunnel failure, a termination signal) passes through
/// [`Supervisor::drain_on_exit`] exactly once, followed by a bounded wait
/// for alert deliveries still in flight.
pub struct Runtime<L: BackgroundLauncher, A: Alerter> {
    cfg: ConfigFile,
    supervisor: Supervisor<L, A>,
}

impl<L: BackgroundLauncher, A: Alerter> fmt::Debug for Runtime<L, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("supervisor", &self.supervisor)
            .finish_non_exhaustive()
    }
}

impl<L: BackgroundLauncher, A: Alerter> Runtime<L, A> {
    pub fn new(cfg: ConfigFile, supervisor: Supervisor<L, A>) -> Self {
        Self { cfg, supervisor }
    }

    pub fn supervisor(&self) -> &Supervisor<L, A> {
        &self.supervisor
    }

    /// Run until done or until SIGINT/SIGTERM/SIGHUP; returns the exit code.
    pub async fn run(&mut self, only_phase: Option<&str>) -> i32 {
        self.run_until(only_phase, shutdown_signal()).await
    }

    /// Like [`Runtime::run`], with the shutdown trigger supplied by the
    /// caller.
    pub async fn run_until<S>(&mut self, only_phase: Option<&str>, shutdown: S) -> i32
    where
        S: Future<Output = ShutdownSignal>,
    {
        if let Some(lockfile) = self.cfg.config.lockfile.clone() {
            if let Err(e) = acquire_lockfile(&lockfile) {
                error!(error = %e, "cannot start run");
                if lock_state(&lockfile) != LockState::Disabled && note_lock_contention(&lockfile) {
                    self.supervisor.send_alert(&e.to_string(), AlertChannel::Log);
                    self.supervisor.flush_alerts().await;
                }
                return e.exit_code();
            }
            self.supervisor
                .register_exit_callback(CleanupAction::RemoveLockfile, &lockfile.to_string_lossy());
        }

        info!("backhaul run started");

        let end = {
            let pipeline = run_phases(&mut self.supervisor, &self.cfg, only_phase);
            tokio::select! {
                res = pipeline => RunEnd::Finished(res),
                sig = shutdown => RunEnd::Interrupted(sig),
            }
        };

        self.supervisor.drain_on_exit().await;
        self.supervisor.flush_alerts().await;

        let code = match end {
            RunEnd::Finished(Ok(summary)) => summary.exit_code(),
            RunEnd::Finished(Err(e)) => {
                error!(error = %e, "run ended with an error");
                e.exit_code()
            }
            RunEnd::Interrupted(sig) => {
                warn!(signal = %sig, "run interrupted");
                sig.exit_code()
            }
        };

        info!(exit_code = code, "backhaul run finished");
        code
    }
}
