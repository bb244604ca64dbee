// src/process/mod.rs

//! Background process plumbing.
//!
//! - [`store`] keeps, per logical name, the pid and reap handle of a
//!   background process.
//! - [`launcher`] starts detached processes ([`BackgroundLauncher`]) and
//!   provides the production [`ProcessLauncher`].
//! - [`probe`] decides whether a started process is usable yet
//!   ([`LivenessProbe`], [`TcpProbe`]).

pub mod launcher;
pub mod probe;
pub mod store;

pub use launcher::{BackgroundLauncher, BackgroundProcess, ChildProcess, ProcessExit, ProcessLauncher};
pub use probe::{LivenessProbe, ProbeResult, TcpProbe};
pub use store::ProcessHandleStore;
