// src/cleanup/mod.rs

//! Exit-time cleanup bookkeeping and the run lock.

pub mod lockfile;
pub mod registry;

pub use lockfile::{
    DISABLED_MARKER, LockState, acquire_lockfile, clear_lockfile, disable_runs, enable_runs,
    lock_contention_noted, lock_state, note_lock_contention, remove_lockfile,
};
pub use registry::{CleanupAction, ExitCallback, ExitCallbackRegistry};
