// src/supervisor/escalation.rs

//! What happens after a tunnel failed to come up.

use thiserror::Error;
use tracing::{error, warn};

use crate::alert::{AlertChannel, Alerter};
use crate::errors::BackhaulError;
use crate::process::{BackgroundLauncher, ProcessExit};
use crate::types::{EscalationPolicy, ExitCode};

use super::Supervisor;

/// Why a tunnel never reached `Ready`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TunnelFailure {
    #[error("could not start tunnel process: {0}")]
    Launch(String),

    #[error("tunnel not reachable after {secs} seconds")]
    Timeout { secs: u64 },

    #[error("tunnel process ended before the tunnel was usable ({0})")]
    Exited(ProcessExit),

    #[error("could not check tunnel process: {0}")]
    Reap(String),
}

impl<L: BackgroundLauncher, A: Alerter> Supervisor<L, A> {
    /// Alert about `failure` and turn it into the error the configured
    /// policy calls for.
    ///
    /// - `phase`: records [`ExitCode::SSH_TUNNEL`] as the phase error and
    ///   returns [`BackhaulError::PhaseAborted`].
    /// - `exit`: returns [`BackhaulError::Fatal`]; the top level drains the
    ///   exit callbacks and ends the run with that code.
    pub(super) fn escalate(&mut self, name: &str, failure: TunnelFailure) -> BackhaulError {
        let descr = self.describe(name);

        match self.options.policy {
            EscalationPolicy::Phase => {
                let message = format!("error opening SSH tunnel {descr}: {failure}; aborting phase");
                warn!(tunnel = name, "{message}");
                self.alerter.send_alert(&message, AlertChannel::Log);
                self.phase_error = Some(ExitCode::SSH_TUNNEL);
                BackhaulError::PhaseAborted {
                    name: name.to_string(),
                    reason: failure.to_string(),
                }
            }
            EscalationPolicy::Exit => {
                let message = format!("error opening SSH tunnel {descr}: {failure}; exiting");
                error!(tunnel = name, "{message}");
                self.alerter.send_alert(&message, AlertChannel::Fatal);
                BackhaulError::Fatal {
                    code: ExitCode::SSH_TUNNEL,
                    message,
                }
            }
        }
    }
}
