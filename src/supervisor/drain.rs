// src/supervisor/drain.rs

//! The single shutdown path: run whatever exit callbacks are left.

use std::path::Path;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::alert::Alerter;
use crate::cleanup::{CleanupAction, ExitCallback, remove_lockfile};
use crate::process::BackgroundLauncher;

use super::Supervisor;

impl<L: BackgroundLauncher, A: Alerter> Supervisor<L, A> {
    /// Invoke every still-registered exit callback, most recently
    /// registered first, then leave the registry empty.
    ///
    /// Runs at most once; later calls return immediately. Each callback is
    /// bounded by `drain_action_timeout`. Callbacks for names that were
    /// already closed by hand take the "already closed" path.
    pub async fn drain_on_exit(&mut self) {
        let Some(entries) = self.callbacks.take_for_drain() else {
            debug!("exit callbacks already drained");
            return;
        };

        if entries.is_empty() {
            debug!("no exit callbacks registered");
            return;
        }

        info!(count = entries.len(), "running exit callbacks");
        let bound = self.options.drain_action_timeout;

        for entry in entries {
            debug!(callback = %entry, "running exit callback");
            if timeout(bound, self.run_exit_callback(&entry)).await.is_err() {
                warn!(callback = %entry, timeout_secs = bound.as_secs(), "exit callback timed out; skipping");
            }
        }
    }

    async fn run_exit_callback(&mut self, entry: &ExitCallback) {
        match entry.action {
            CleanupAction::CloseTunnel => self.close(&entry.arg, false).await,
            CleanupAction::TerminateCommand => self.terminate(&entry.arg, false).await,
            CleanupAction::RemoveLockfile => remove_lockfile(Path::new(&entry.arg)),
        }
    }
}
