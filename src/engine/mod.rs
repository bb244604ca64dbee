// src/engine/mod.rs

//! Orchestration of a whole run.
//!
//! - [`phase`] runs backup phases: tunnels up, remote commands started,
//!   phase command run, everything torn down again.
//! - [`runtime`] wraps the phases with the lockfile, signal handling and
//!   the exit-callback drain, and turns the result into an exit code.
//! - [`shutdown`] waits for termination signals.

pub mod phase;
pub mod runtime;
pub mod shutdown;

pub use phase::{PhaseOutcome, RunSummary, run_phase, run_phases};
pub use runtime::Runtime;
pub use shutdown::{ShutdownSignal, shutdown_signal};
