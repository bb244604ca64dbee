// src/control.rs

//! Operator commands around the run lock: `status`, `unlock`, `stop` and
//! `start`.
//!
//! Output goes to the given writer rather than the log, since these are
//! answers to a person at a terminal.

use std::io::{BufRead, Write};
use std::path::Path;

use tracing::info;

use crate::cleanup::{
    LockState, clear_lockfile, disable_runs, enable_runs, lock_contention_noted, lock_state,
};
use crate::cli::Command;
use crate::config::ConfigFile;
use crate::errors::{BackhaulError, Result};
use crate::types::ExitCode;

/// Run one operator command and return the exit code.
///
/// `input` is only read by `unlock` without `--yes`.
pub fn execute<R, W>(command: &Command, cfg: &ConfigFile, input: &mut R, out: &mut W) -> Result<i32>
where
    R: BufRead,
    W: Write,
{
    match command {
        Command::Run => Err(BackhaulError::Control(
            "`run` is not an operator command".to_string(),
        )),
        Command::Status => status(cfg, out),
        Command::Unlock { yes } => unlock(cfg, *yes, input, out),
        Command::Stop => stop(cfg, out),
        Command::Start => start(cfg, out),
    }
}

fn lock_path(cfg: &ConfigFile) -> Result<&Path> {
    cfg.config.lockfile.as_deref().ok_or_else(|| {
        BackhaulError::Control("no [config].lockfile is configured".to_string())
    })
}

fn status<W: Write>(cfg: &ConfigFile, out: &mut W) -> Result<i32> {
    let Some(lock) = cfg.config.lockfile.as_deref() else {
        writeln!(out, "No lockfile configured; runs are not serialized.")?;
        return Ok(ExitCode::OK);
    };

    writeln!(out, "lockfile: {}", lock.display())?;
    match lock_state(lock) {
        LockState::Free => writeln!(out, "No lock held; runs are enabled and none is in progress.")?,
        LockState::Held { since } => {
            let age = since
                .and_then(|t| t.elapsed().ok())
                .map(|d| format!(" (held for {}s)", d.as_secs()))
                .unwrap_or_default();
            writeln!(out, "Lock held{age}; a run may be in progress, or a previous one died.")?;
        }
        LockState::Disabled => writeln!(
            out,
            "Runs have been disabled (but the last one may still be running)."
        )?,
    }
    if lock_contention_noted(lock) {
        writeln!(out, "A held lock has prevented a new run from starting.")?;
    }
    Ok(ExitCode::OK)
}

fn unlock<R, W>(cfg: &ConfigFile, yes: bool, input: &mut R, out: &mut W) -> Result<i32>
where
    R: BufRead,
    W: Write,
{
    let lock = lock_path(cfg)?;
    if lock_state(lock) == LockState::Free {
        return Err(BackhaulError::Control(format!(
            "the lock directory {} has already been removed",
            lock.display()
        )));
    }

    if !yes {
        write!(
            out,
            "The lock directory should only be removed if no run is in progress.\nContinue (y/n)? "
        )?;
        out.flush()?;
        let mut answer = String::new();
        input.read_line(&mut answer)?;
        if !answer.trim().eq_ignore_ascii_case("y") {
            writeln!(out, "Exiting.")?;
            return Ok(ExitCode::OK);
        }
    }

    clear_lockfile(lock)?;
    writeln!(out, "The lock directory ({}) has been removed.", lock.display())?;
    Ok(ExitCode::OK)
}

fn stop<W: Write>(cfg: &ConfigFile, out: &mut W) -> Result<i32> {
    let lock = lock_path(cfg)?;
    if disable_runs(lock)? {
        writeln!(
            out,
            "A run is probably in progress; the stop takes effect after it finishes."
        )?;
    }
    writeln!(out, "Runs have been disabled; remember to re-enable them with `start`.")?;
    info!(lockfile = %lock.display(), "runs disabled by operator");
    Ok(ExitCode::OK)
}

fn start<W: Write>(cfg: &ConfigFile, out: &mut W) -> Result<i32> {
    let lock = lock_path(cfg)?;
    enable_runs(lock)?;
    writeln!(
        out,
        "Runs have been re-enabled.\nIf no run is in progress, remove the lock with `unlock`."
    )?;
    info!(lockfile = %lock.display(), "runs re-enabled by operator");
    Ok(ExitCode::OK)
}
