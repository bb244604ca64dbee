// src/supervisor/command.rs

//! Launch/terminate protocol for plain backgrounded commands.
//!
//! Same bookkeeping as tunnels, minus the readiness probe: the process is
//! considered usable as soon as it has been started.

use tracing::info;

use crate::alert::Alerter;
use crate::cleanup::CleanupAction;
use crate::errors::{BackhaulError, Result};
use crate::exec::CommandSpec;
use crate::process::BackgroundLauncher;

use super::{Supervisor, TunnelState};

impl<L: BackgroundLauncher, A: Alerter> Supervisor<L, A> {
    /// Start `command` in the background under `name`.
    pub async fn launch(&mut self, name: &str, command: &CommandSpec, auto_cleanup: bool) -> Result<()> {
        if self.handles.is_set(name) {
            return Err(BackhaulError::HandleInUse(name.to_string()));
        }

        self.handles.set_state(name, TunnelState::Starting);
        let process = match self.launcher.launch(name, command) {
            Ok(process) => process,
            Err(e) => {
                self.handles.set_state(name, TunnelState::Failed);
                return Err(e);
            }
        };

        info!(command = name, pid = ?process.pid(), "background command started");
        let displaced = self.handles.set(name, process);
        debug_assert!(displaced.is_none());
        self.handles.set_state(name, TunnelState::Ready);

        if auto_cleanup {
            self.callbacks.register(CleanupAction::TerminateCommand, name);
        }
        Ok(())
    }

    /// Kill the background command under `name`, if any. Redundant calls
    /// are no-ops.
    pub async fn terminate(&mut self, name: &str, auto_cleanup: bool) {
        if self.handles.is_set(name) {
            self.handles.set_state(name, TunnelState::Closing);
            let exit = self.kill_and_clear(name).await;
            self.handles.set_state(name, TunnelState::Closed);
            info!(command = name, ?exit, "background command terminated");
        } else {
            info!(command = name, "background command already terminated");
        }

        if auto_cleanup {
            self.callbacks.unregister(CleanupAction::TerminateCommand, name);
        }
    }
}
