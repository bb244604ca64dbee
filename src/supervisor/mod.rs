// src/supervisor/mod.rs

//! Lifecycle supervisor for named background processes.
//!
//! [`Supervisor`] composes the launcher, the handle store, the exit-callback
//! registry and the alerter into the open/close protocol for tunnels
//! ([`tunnel`]), the launch/terminate protocol for plain backgrounded
//! commands ([`command`]), failure escalation ([`escalation`]) and the
//! shutdown-time drain ([`drain`]).
//!
//! Everything runs on the caller's task: the only places it waits are the
//! poll sleep while a tunnel comes up and the reap after a kill.

pub mod command;
pub mod drain;
pub mod escalation;
pub mod state;
pub mod tunnel;

use std::fmt;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use crate::alert::{AlertChannel, Alerter};
use crate::cleanup::{CleanupAction, ExitCallbackRegistry};
use crate::config::ConfigSection;
use crate::process::{BackgroundLauncher, ProcessExit, ProcessHandleStore};
use crate::types::EscalationPolicy;

pub use escalation::TunnelFailure;
pub use state::TunnelState;
pub use tunnel::TunnelRequest;

/// Logical name used for a tunnel when the caller does not pick one.
pub const DEFAULT_TUNNEL_NAME: &str = "tunnel";

/// Logical name used for a backgrounded remote command when the caller does
/// not pick one.
pub const DEFAULT_REMOTE_NAME: &str = "ssh";

#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    /// How long a tunnel may take to become reachable.
    pub ready_timeout: Duration,
    /// Sleep between readiness checks.
    pub poll_interval: Duration,
    pub policy: EscalationPolicy,
    /// Upper bound for each exit callback during the drain.
    pub drain_action_timeout: Duration,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            ready_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(1),
            policy: EscalationPolicy::default(),
            drain_action_timeout: Duration::from_secs(10),
        }
    }
}

impl SupervisorOptions {
    pub fn from_config(cfg: &ConfigSection) -> Self {
        Self {
            ready_timeout: Duration::from_secs(cfg.tunnel_timeout),
            policy: cfg.on_tunnel_failure,
            ..Self::default()
        }
    }
}

pub struct Supervisor<L: BackgroundLauncher, A: Alerter> {
    launcher: L,
    alerter: A,
    handles: ProcessHandleStore,
    callbacks: ExitCallbackRegistry,
    options: SupervisorOptions,
    phase_error: Option<i32>,
}

impl<L: BackgroundLauncher, A: Alerter> fmt::Debug for Supervisor<L, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("handles", &self.handles)
            .field("callbacks", &self.callbacks)
            .field("options", &self.options)
            .field("phase_error", &self.phase_error)
            .finish_non_exhaustive()
    }
}

impl<L: BackgroundLauncher, A: Alerter> Supervisor<L, A> {
    pub fn new(launcher: L, alerter: A, options: SupervisorOptions) -> Self {
        Self {
            launcher,
            alerter,
            handles: ProcessHandleStore::new(),
            callbacks: ExitCallbackRegistry::new(),
            options,
            phase_error: None,
        }
    }

    pub fn options(&self) -> &SupervisorOptions {
        &self.options
    }

    pub fn handles(&self) -> &ProcessHandleStore {
        &self.handles
    }

    pub fn callbacks(&self) -> &ExitCallbackRegistry {
        &self.callbacks
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub fn alerter(&self) -> &A {
        &self.alerter
    }

    /// Send an alert that is not tied to a tunnel (e.g. lock contention).
    pub fn send_alert(&mut self, message: &str, channel: AlertChannel) {
        self.alerter.send_alert(message, channel);
    }

    /// Register a cleanup action that is not tied to a process handle
    /// (e.g. removing the lockfile).
    pub fn register_exit_callback(&mut self, action: CleanupAction, arg: &str) {
        self.callbacks.register(action, arg);
    }

    pub fn unregister_exit_callback(&mut self, action: CleanupAction, arg: &str) {
        self.callbacks.unregister(action, arg);
    }

    /// Pid currently recorded under `name`.
    pub fn pid(&self, name: &str) -> Option<u32> {
        self.handles.get(name)
    }

    pub fn tunnel_state(&self, name: &str) -> TunnelState {
        self.handles.state(name)
    }

    /// Error code recorded by the last phase-level failure, if any.
    pub fn phase_error(&self) -> Option<i32> {
        self.phase_error
    }

    pub fn record_phase_error(&mut self, code: i32) {
        self.phase_error = Some(code);
    }

    pub fn take_phase_error(&mut self) -> Option<i32> {
        self.phase_error.take()
    }

    /// Description recorded for `name`, falling back to the name itself.
    fn describe(&self, name: &str) -> String {
        self.handles.description(name).unwrap_or(name).to_string()
    }

    /// Kill whatever `name` holds, wait for it, then clear the handle.
    ///
    /// The handle is cleared only after the reap, so an interrupted call
    /// leaves the process visible to the exit-callback drain. Kill and wait
    /// errors mean the process is already gone and are absorbed.
    async fn kill_and_clear(&mut self, name: &str) -> Option<ProcessExit> {
        let exit = match self.handles.process_mut(name) {
            Some(process) => match process.kill_and_reap().await {
                Ok(exit) => Some(exit),
                Err(e) => {
                    debug!(name, error = %e, "reaping process failed; treating it as gone");
                    None
                }
            },
            None => None,
        };
        self.forget(name);
        exit
    }

    /// Drop the reap handle held under `name`; its process is known to be
    /// reaped already.
    fn forget(&mut self, name: &str) {
        if let Some(process) = self.handles.clear(name) {
            debug!(name, pid = ?process.pid(), "process handle cleared");
        }
    }

    /// Wait for alert deliveries still in flight, bounded by
    /// `drain_action_timeout`.
    pub async fn flush_alerts(&mut self) {
        let bound = self.options.drain_action_timeout;
        if timeout(bound, self.alerter.flush()).await.is_err() {
            warn!(timeout_secs = bound.as_secs(), "alert delivery did not finish in time");
        }
    }
}
