// src/supervisor/tunnel.rs

//! Tunnel open/close protocol.

use std::fmt;

use tokio::time::{Instant, sleep};
use tracing::{debug, info};

use crate::alert::Alerter;
use crate::cleanup::CleanupAction;
use crate::errors::{BackhaulError, Result};
use crate::exec::CommandSpec;
use crate::process::{BackgroundLauncher, LivenessProbe};

use super::escalation::TunnelFailure;
use super::{Supervisor, TunnelState};

/// Everything needed to bring one tunnel up.
pub struct TunnelRequest {
    /// Free text for log and alert messages.
    pub description: String,
    /// The tunnel process, e.g. `ssh -N -L ...`.
    pub command: CommandSpec,
    /// Decides when the tunnel is usable.
    pub probe: Box<dyn LivenessProbe>,
}

impl TunnelRequest {
    pub fn new(
        description: impl Into<String>,
        command: CommandSpec,
        probe: impl LivenessProbe + 'static,
    ) -> Self {
        Self {
            description: description.into(),
            command,
            probe: Box::new(probe),
        }
    }
}

impl fmt::Debug for TunnelRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TunnelRequest")
            .field("description", &self.description)
            .field("command", &self.command)
            .field("probe", &self.probe.target())
            .finish()
    }
}

impl<L: BackgroundLauncher, A: Alerter> Supervisor<L, A> {
    /// Start the tunnel process for `name` and wait until it is usable.
    ///
    /// Polls the request's probe every `poll_interval` until it reports
    /// ready, the process exits on its own, or `ready_timeout` has elapsed
    /// (monotonic clock). In the last case the process is killed. Either
    /// failure clears the handle and escalates per the configured policy.
    ///
    /// With `auto_cleanup`, a close-on-exit callback keyed by `name` is
    /// registered for as long as the process may be alive.
    pub async fn open(
        &mut self,
        name: &str,
        request: &TunnelRequest,
        auto_cleanup: bool,
    ) -> Result<()> {
        if self.handles.is_set(name) {
            return Err(BackhaulError::HandleInUse(name.to_string()));
        }

        self.handles.set_description(name, request.description.clone());
        self.handles.set_state(name, TunnelState::Starting);
        info!(tunnel = name, "opening SSH tunnel {}", request.description);

        let process = match self.launcher.launch(name, &request.command) {
            Ok(process) => process,
            Err(e) => {
                self.handles.set_state(name, TunnelState::Failed);
                return Err(self.escalate(name, TunnelFailure::Launch(e.to_string())));
            }
        };
        debug!(tunnel = name, pid = ?process.pid(), "tunnel process launched");
        let displaced = self.handles.set(name, process);
        debug_assert!(displaced.is_none());

        if auto_cleanup {
            self.callbacks.register(CleanupAction::CloseTunnel, name);
        }

        match self.wait_until_ready(name, request.probe.as_ref()).await {
            Ok(()) => {
                self.handles.set_state(name, TunnelState::Ready);
                info!(tunnel = name, "SSH tunnel {} is open", request.description);
                Ok(())
            }
            Err(failure) => {
                self.handles.set_state(name, TunnelState::Failed);
                if auto_cleanup {
                    self.callbacks.unregister(CleanupAction::CloseTunnel, name);
                }
                Err(self.escalate(name, failure))
            }
        }
    }

    /// The poll loop. On failure the handle has already been cleared.
    async fn wait_until_ready(
        &mut self,
        name: &str,
        probe: &dyn LivenessProbe,
    ) -> std::result::Result<(), TunnelFailure> {
        let started = Instant::now();
        let timeout = self.options.ready_timeout;
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            if probe.probe().await.is_ready() {
                debug!(
                    tunnel = name,
                    attempts,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "tunnel probe succeeded"
                );
                return Ok(());
            }

            let Some(process) = self.handles.process_mut(name) else {
                return Err(TunnelFailure::Reap("process handle disappeared".to_string()));
            };

            match process.try_reap() {
                Ok(None) => {
                    if started.elapsed() >= timeout {
                        debug!(tunnel = name, attempts, "tunnel timed out; killing process");
                        self.kill_and_clear(name).await;
                        return Err(TunnelFailure::Timeout {
                            secs: timeout.as_secs(),
                        });
                    }
                    debug!(tunnel = name, target = %probe.target(), attempts, "tunnel not ready yet");
                    sleep(self.options.poll_interval).await;
                }
                Ok(Some(exit)) => {
                    debug!(tunnel = name, %exit, "tunnel process exited on its own");
                    self.forget(name);
                    return Err(TunnelFailure::Exited(exit));
                }
                Err(e) => {
                    self.kill_and_clear(name).await;
                    return Err(TunnelFailure::Reap(e.to_string()));
                }
            }
        }
    }

    /// Kill the tunnel process for `name`, if any, and clear its handle.
    ///
    /// Safe to call any number of times; without a live process it only
    /// logs "already closed". With `auto_cleanup`, the close-on-exit
    /// callback registered by `open` is removed.
    pub async fn close(&mut self, name: &str, auto_cleanup: bool) {
        let descr = self.describe(name);

        if self.handles.is_set(name) {
            self.handles.set_state(name, TunnelState::Closing);
            let exit = self.kill_and_clear(name).await;
            self.handles.set_state(name, TunnelState::Closed);
            info!(tunnel = name, ?exit, "SSH tunnel {descr} closed");
        } else {
            info!(tunnel = name, "SSH tunnel {descr} already closed");
        }

        if auto_cleanup {
            self.callbacks.unregister(CleanupAction::CloseTunnel, name);
        }
    }
}
