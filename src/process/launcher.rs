// src/process/launcher.rs

//! Pluggable launcher abstraction for background processes.
//!
//! The supervisor talks to a [`BackgroundLauncher`] and gets back a
//! [`BackgroundProcess`] reap handle. Production code uses
//! [`ProcessLauncher`], which spawns real OS processes with
//! `tokio::process`; tests can provide launchers whose processes have
//! scripted lifetimes.

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tracing::{debug, info};

use crate::errors::{BackhaulError, Result};
use crate::exec::CommandSpec;
use crate::logging::DIAG_TARGET;

/// How a background process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// Exit code, or `None` if the process was terminated by a signal.
    pub code: Option<i32>,
}

impl ProcessExit {
    pub fn code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn signaled() -> Self {
        Self { code: None }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for ProcessExit {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit status {code}"),
            None => f.write_str("terminated by signal"),
        }
    }
}

/// Reap handle of a launched process.
///
/// No exit status exists at launch time; it is only known once the process
/// has been reaped, either because it exited on its own (`try_reap`) or
/// because it was killed (`kill_and_reap`).
pub trait BackgroundProcess: Send {
    /// OS process id, if one was assigned.
    fn pid(&self) -> Option<u32>;

    /// Non-blocking check: `Ok(None)` while running, `Ok(Some(exit))` once
    /// the process has exited (reaping it).
    fn try_reap(&mut self) -> io::Result<Option<ProcessExit>>;

    /// Kill the process and wait for it to be reaped.
    ///
    /// Must succeed for a process that has already exited or been reaped.
    fn kill_and_reap(&mut self) -> Pin<Box<dyn Future<Output = io::Result<ProcessExit>> + Send + '_>>;
}

/// Trait abstracting how background processes are started.
pub trait BackgroundLauncher: Send {
    /// Start `spec` detached from the foreground and return its reap handle.
    ///
    /// `name` is the logical name the caller will track the process under;
    /// it is only used for logging.
    fn launch(&mut self, name: &str, spec: &CommandSpec) -> Result<Box<dyn BackgroundProcess>>;
}

/// A real child process spawned by [`ProcessLauncher`].
#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
    pid: Option<u32>,
    exit: Option<ProcessExit>,
}

impl ChildProcess {
    fn new(child: Child) -> Self {
        let pid = child.id();
        Self {
            child,
            pid,
            exit: None,
        }
    }
}

impl BackgroundProcess for ChildProcess {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn try_reap(&mut self) -> io::Result<Option<ProcessExit>> {
        if let Some(exit) = self.exit {
            return Ok(Some(exit));
        }
        let exit = self.child.try_wait()?.map(ProcessExit::from);
        self.exit = exit;
        Ok(exit)
    }

    fn kill_and_reap(&mut self) -> Pin<Box<dyn Future<Output = io::Result<ProcessExit>> + Send + '_>> {
        Box::pin(async move {
            if let Some(exit) = self.exit {
                return Ok(exit);
            }

            // The process may have died since the last check; a failed kill
            // is expected then and the wait below still reaps it.
            if let Err(e) = self.child.start_kill() {
                debug!(pid = ?self.pid, error = %e, "kill failed; process may already be gone");
            }

            let exit = ProcessExit::from(self.child.wait().await?);
            self.exit = Some(exit);
            Ok(exit)
        })
    }
}

/// Production launcher.
///
/// Output of launched processes never reaches the caller's standard
/// streams: each line goes to the diagnostic channel instead.
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher {
    print_cmds: bool,
}

impl ProcessLauncher {
    pub fn new(print_cmds: bool) -> Self {
        Self { print_cmds }
    }
}

impl BackgroundLauncher for ProcessLauncher {
    fn launch(&mut self, name: &str, spec: &CommandSpec) -> Result<Box<dyn BackgroundProcess>> {
        if self.print_cmds {
            info!(target: DIAG_TARGET, name, "running command in background: {spec}");
        }

        let mut child = spec
            .to_tokio_command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BackhaulError::Launch {
                name: name.to_string(),
                source,
            })?;

        forward_output(child.stdout.take(), name, "stdout");
        forward_output(child.stderr.take(), name, "stderr");

        let process = ChildProcess::new(child);
        debug!(name, pid = ?process.pid(), "background process started");
        Ok(Box::new(process))
    }
}

/// Drain a pipe into the diagnostic channel so the child never blocks on a
/// full buffer.
fn forward_output<R>(pipe: Option<R>, name: &str, stream: &'static str)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let Some(pipe) = pipe else {
        return;
    };
    let name = name.to_string();

    tokio::spawn(async move {
        let mut lines = BufReader::new(pipe).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            info!(target: DIAG_TARGET, name = %name, stream, "{line}");
        }
        debug!(name = %name, stream, "background output closed");
    });
}
