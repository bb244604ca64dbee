// src/engine/shutdown.rs

use std::fmt;

use tracing::warn;

use crate::types::ExitCode;

/// Termination signal that interrupted a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
    Hangup,
}

impl ShutdownSignal {
    pub fn signo(self) -> i32 {
        match self {
            ShutdownSignal::Hangup => 1,
            ShutdownSignal::Interrupt => 2,
            ShutdownSignal::Terminate => 15,
        }
    }

    pub fn exit_code(self) -> i32 {
        ExitCode::from_signal(self.signo())
    }
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownSignal::Interrupt => f.write_str("SIGINT"),
            ShutdownSignal::Terminate => f.write_str("SIGTERM"),
            ShutdownSignal::Hangup => f.write_str("SIGHUP"),
        }
    }
}

/// Resolve when the process receives SIGINT, SIGTERM or SIGHUP.
///
/// A signal whose handler cannot be installed is logged and simply never
/// fires.
#[cfg(unix)]
pub async fn shutdown_signal() -> ShutdownSignal {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = signal(SignalKind::terminate())
        .map_err(|e| warn!(error = %e, "failed to listen for SIGTERM"))
        .ok();
    let mut hup = signal(SignalKind::hangup())
        .map_err(|e| warn!(error = %e, "failed to listen for SIGHUP"))
        .ok();

    tokio::select! {
        _ = ctrl_c() => ShutdownSignal::Interrupt,
        _ = recv_or_pending(&mut term) => ShutdownSignal::Terminate,
        _ = recv_or_pending(&mut hup) => ShutdownSignal::Hangup,
    }
}

#[cfg(not(unix))]
pub async fn shutdown_signal() -> ShutdownSignal {
    ctrl_c().await;
    ShutdownSignal::Interrupt
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn recv_or_pending(sig: &mut Option<tokio::signal::unix::Signal>) {
    match sig {
        Some(sig) => {
            sig.recv().await;
        }
        None => std::future::pending::<()>().await,
    }
}
