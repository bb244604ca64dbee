// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// What happens when a tunnel cannot be opened.
///
/// - `Exit`: alert and end the whole run with [`ExitCode::SSH_TUNNEL`]
///   (default behaviour).
/// - `Phase`: alert, record a phase-level error code and abort only the
///   current phase; later phases still run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscalationPolicy {
    Exit,
    Phase,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        EscalationPolicy::Exit
    }
}

impl FromStr for EscalationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exit" => Ok(EscalationPolicy::Exit),
            "phase" => Ok(EscalationPolicy::Phase),
            other => Err(format!(
                "invalid on_tunnel_failure: {other} (expected \"exit\" or \"phase\")"
            )),
        }
    }
}

impl fmt::Display for EscalationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EscalationPolicy::Exit => f.write_str("exit"),
            EscalationPolicy::Phase => f.write_str("phase"),
        }
    }
}

/// Process exit values used by the `backhaul` binary.
pub struct ExitCode;

impl ExitCode {
    pub const OK: i32 = 0;
    /// Hardcoded by clap for usage errors.
    pub const USAGE: i32 = 2;
    pub const STARTUP: i32 = 10;
    pub const LOCKFILE: i32 = 11;
    pub const SSH_TUNNEL: i32 = 20;
    pub const PHASE_COMMAND: i32 = 21;
    pub const INTERNAL: i32 = 250;

    /// Conventional shell exit value for death by signal `signo`.
    pub fn from_signal(signo: i32) -> i32 {
        128 + signo
    }
}
