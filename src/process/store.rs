// src/process/store.rs

//! Keyed store of background process handles.

use std::collections::HashMap;
use std::fmt;

use crate::process::BackgroundProcess;
use crate::supervisor::TunnelState;

/// Everything tracked under one logical name.
///
/// `pid` is `None` before a process has been started and again once it
/// has been confirmed reaped.
#[derive(Default)]
struct ProcessHandle {
    pid: Option<u32>,
    description: Option<String>,
    state: TunnelState,
    process: Option<Box<dyn BackgroundProcess>>,
}

impl ProcessHandle {
    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn state(&self) -> TunnelState {
        self.state
    }

    fn is_set(&self) -> bool {
        self.process.is_some()
    }
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.pid)
            .field("description", &self.description)
            .field("state", &self.state)
            .field("has_process", &self.process.is_some())
            .finish()
    }
}

/// Logical name -> process handle.
///
/// Each name is independent, so several callers in one run can track
/// distinct processes (e.g. a tunnel and a backgrounded remote command)
/// without colliding.
#[derive(Debug, Default)]
pub struct ProcessHandleStore {
    handles: HashMap<String, ProcessHandle>,
}

impl ProcessHandleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly launched process under `name`.
    ///
    /// Returns the process previously held under that name, if any; callers
    /// are expected to have cleared the name first.
    #[must_use]
    pub fn set(
        &mut self,
        name: &str,
        process: Box<dyn BackgroundProcess>,
    ) -> Option<Box<dyn BackgroundProcess>> {
        let handle = self.handles.entry(name.to_string()).or_default();
        handle.pid = process.pid();
        handle.process.replace(process)
    }

    /// The pid recorded under `name`, if a process is held.
    pub fn get(&self, name: &str) -> Option<u32> {
        self.handles.get(name).and_then(|h| h.pid)
    }

    /// Whether a (possibly already exited, not yet reaped) process is held.
    pub fn is_set(&self, name: &str) -> bool {
        self.handles.get(name).is_some_and(ProcessHandle::is_set)
    }

    pub fn process_mut(&mut self, name: &str) -> Option<&mut Box<dyn BackgroundProcess>> {
        self.handles.get_mut(name).and_then(|h| h.process.as_mut())
    }

    /// Forget the process under `name` and hand it back for reaping.
    ///
    /// The description and state survive; they describe the name, not the
    /// process.
    pub fn clear(&mut self, name: &str) -> Option<Box<dyn BackgroundProcess>> {
        let handle = self.handles.get_mut(name)?;
        handle.pid = None;
        handle.process.take()
    }

    pub fn set_description(&mut self, name: &str, description: impl Into<String>) {
        self.handles.entry(name.to_string()).or_default().description = Some(description.into());
    }

    pub fn description(&self, name: &str) -> Option<&str> {
        self.handles.get(name).and_then(ProcessHandle::description)
    }

    pub fn state(&self, name: &str) -> TunnelState {
        self.handles
            .get(name)
            .map(ProcessHandle::state)
            .unwrap_or_default()
    }

    pub fn set_state(&mut self, name: &str, state: TunnelState) {
        self.handles.entry(name.to_string()).or_default().state = state;
    }

    /// Names that currently hold a process.
    pub fn live_names(&self) -> impl Iterator<Item = &str> {
        self.handles
            .iter()
            .filter(|(_, h)| h.is_set())
            .map(|(name, _)| name.as_str())
    }
}
