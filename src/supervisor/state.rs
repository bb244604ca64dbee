// src/supervisor/state.rs

use std::fmt;

/// Lifecycle of a logical name as seen by the supervisor.
///
/// ```text
/// NotStarted -> Starting -> Ready -> Closing -> Closed
///                  \
///                   -> Failed   (timeout, unexpected exit, launch error)
/// ```
///
/// `Closed` and `Failed` both mean "no process held"; only `Failed` went
/// through escalation. Plain background commands skip the probe and go
/// straight from `Starting` to `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TunnelState {
    #[default]
    NotStarted,
    Starting,
    Ready,
    Closing,
    Closed,
    Failed,
}

impl TunnelState {
    /// True for the states in which no process is held.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TunnelState::NotStarted | TunnelState::Closed | TunnelState::Failed
        )
    }
}

impl fmt::Display for TunnelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TunnelState::NotStarted => "not started",
            TunnelState::Starting => "starting",
            TunnelState::Ready => "ready",
            TunnelState::Closing => "closing",
            TunnelState::Closed => "closed",
            TunnelState::Failed => "failed",
        };
        f.write_str(s)
    }
}
