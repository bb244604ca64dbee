// src/exec/mod.rs

//! Command descriptions and the foreground command runner.
//!
//! - [`command`] defines [`CommandSpec`], the resolved argv handed to both
//!   the background launcher and the foreground runner.
//! - [`foreground`] runs a phase command to completion and reports its exit
//!   code.

pub mod command;
pub mod foreground;

pub use command::CommandSpec;
pub use foreground::run_with_logging;
