// src/cleanup/lockfile.rs

//! Run lock: a directory that exists for exactly as long as a run does.
//!
//! Next to the lock directory lives an alert marker (`<lock>.alert`),
//! created the first time a run is refused because of a held lock, so a
//! stale lock raises one alert rather than one per attempt. Inside the lock
//! directory, the [`DISABLED_MARKER`] file keeps runs disabled: its
//! presence makes the exit cleanup leave the lock in place.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info};

use crate::errors::{BackhaulError, Result};

/// File inside the lock directory that marks runs as disabled.
pub const DISABLED_MARKER: &str = "runs_disabled";

/// What the lock directory currently says about runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// No lock; a run may start.
    Free,
    /// A run holds the lock (or died without removing it).
    Held { since: Option<SystemTime> },
    /// Runs were disabled by an operator.
    Disabled,
}

pub fn lock_state(path: &Path) -> LockState {
    if disabled_marker(path).exists() {
        LockState::Disabled
    } else if path.is_dir() {
        let since = fs::metadata(path).and_then(|m| m.modified()).ok();
        LockState::Held { since }
    } else {
        LockState::Free
    }
}

/// Create the lock directory, failing if another run holds it.
///
/// `create_dir` is atomic, so two concurrent runs cannot both succeed. A
/// successful acquire also clears the alert marker of an earlier refusal.
pub fn acquire_lockfile(path: &Path) -> Result<()> {
    match fs::create_dir(path) {
        Ok(()) => {
            info!(path = %path.display(), "lockfile acquired");
            clear_alert_marker(path);
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            if disabled_marker(path).exists() {
                Err(BackhaulError::Lockfile(format!(
                    "runs have been disabled (lock {}); use `backhaul start` to re-enable",
                    path.display()
                )))
            } else {
                Err(BackhaulError::Lockfile(format!(
                    "{} already exists; a previous run may still be in progress or may have failed \
                     (use `backhaul unlock` if not)",
                    path.display()
                )))
            }
        }
        Err(e) => Err(BackhaulError::Lockfile(format!(
            "could not create {}: {e}",
            path.display()
        ))),
    }
}

/// Remove the lock directory unless runs have been disabled meanwhile.
///
/// Errors are ignored: this runs during shutdown, possibly after a signal,
/// and a leftover lock is reported by the next run anyway.
pub fn remove_lockfile(path: &Path) {
    if disabled_marker(path).exists() {
        info!(path = %path.display(), "runs were disabled during this run; keeping lockfile");
        return;
    }
    match fs::remove_dir_all(path) {
        Ok(()) => debug!(path = %path.display(), "lockfile removed"),
        Err(e) => debug!(path = %path.display(), error = %e, "could not remove lockfile"),
    }
}

/// Record that a run was refused because of the lock.
///
/// Returns `true` only for the first refusal since the lock was last
/// acquired, i.e. when an alert should go out.
pub fn note_lock_contention(path: &Path) -> bool {
    let marker = alert_marker(path);
    match File::options().write(true).create_new(true).open(&marker) {
        Ok(_) => true,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => false,
        Err(e) => {
            debug!(path = %marker.display(), error = %e, "could not create lock alert marker");
            true
        }
    }
}

/// Whether a run has been refused since the lock was last acquired.
pub fn lock_contention_noted(path: &Path) -> bool {
    alert_marker(path).exists()
}

/// Keep future runs from starting until [`enable_runs`].
///
/// Returns `true` if a lock was already held, i.e. a run is probably in
/// progress and the disable takes effect after it finishes.
pub fn disable_runs(path: &Path) -> Result<bool> {
    let marker = disabled_marker(path);
    if marker.exists() {
        return Err(BackhaulError::Control("runs were already disabled".to_string()));
    }

    let was_held = match fs::create_dir(path) {
        Ok(()) => false,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => true,
        Err(e) => {
            return Err(BackhaulError::Control(format!(
                "could not create the lock directory {}: {e}",
                path.display()
            )));
        }
    };

    File::create(&marker).map_err(|e| {
        BackhaulError::Control(format!("could not create {}: {e}", marker.display()))
    })?;
    info!(path = %path.display(), "runs disabled");
    Ok(was_held)
}

/// Undo [`disable_runs`]. The lock directory itself stays; remove it with
/// [`clear_lockfile`] once no run is in progress.
pub fn enable_runs(path: &Path) -> Result<()> {
    let marker = disabled_marker(path);
    match fs::remove_file(&marker) {
        Ok(()) => {
            info!(path = %path.display(), "runs re-enabled");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Err(BackhaulError::Control("runs were already enabled".to_string()))
        }
        Err(e) => Err(BackhaulError::Control(format!(
            "could not remove {}: {e}",
            marker.display()
        ))),
    }
}

/// Forcibly remove the lock directory (and the alert marker).
pub fn clear_lockfile(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(BackhaulError::Control(format!(
            "the lock directory {} has already been removed",
            path.display()
        )));
    }
    fs::remove_dir_all(path).map_err(|e| {
        BackhaulError::Control(format!("could not remove {}: {e}", path.display()))
    })?;
    clear_alert_marker(path);
    info!(path = %path.display(), "lockfile manually removed");
    Ok(())
}

fn disabled_marker(path: &Path) -> PathBuf {
    path.join(DISABLED_MARKER)
}

fn alert_marker(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".alert");
    PathBuf::from(name)
}

fn clear_alert_marker(path: &Path) {
    let marker = alert_marker(path);
    if fs::remove_file(&marker).is_ok() {
        debug!(path = %marker.display(), "lock alert marker removed");
    }
}
