// src/cleanup/registry.rs

//! Ordered registry of cleanup actions to run when the process terminates.
//!
//! An entry exists while the resource it names may still need cleanup: it
//! is registered when the resource is acquired and unregistered after an
//! explicit, successful teardown. Whatever is left at termination is handed
//! out once, most recent first, by [`ExitCallbackRegistry::take_for_drain`].

use std::fmt;

use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CleanupAction {
    /// Close the tunnel tracked under the argument's logical name.
    CloseTunnel,
    /// Kill the background command tracked under the argument's logical name.
    TerminateCommand,
    /// Remove the lock directory at the argument's path.
    RemoveLockfile,
}

impl fmt::Display for CleanupAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CleanupAction::CloseTunnel => "close-tunnel",
            CleanupAction::TerminateCommand => "terminate-command",
            CleanupAction::RemoveLockfile => "remove-lockfile",
        };
        f.write_str(s)
    }
}

/// One registered (action, argument) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExitCallback {
    pub action: CleanupAction,
    pub arg: String,
}

impl ExitCallback {
    pub fn new(action: CleanupAction, arg: impl Into<String>) -> Self {
        Self {
            action,
            arg: arg.into(),
        }
    }
}

impl fmt::Display for ExitCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.action, self.arg)
    }
}

#[derive(Debug, Default)]
pub struct ExitCallbackRegistry {
    entries: Vec<ExitCallback>,
    drained: bool,
}

impl ExitCallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. Registering an identical pair again is a no-op and
    /// keeps the original position.
    pub fn register(&mut self, action: CleanupAction, arg: &str) {
        if self.drained {
            warn!(%action, arg, "exit callback registered after drain; it will not run");
        }
        if self.contains(action, arg) {
            debug!(%action, arg, "exit callback already registered");
            return;
        }
        self.entries.push(ExitCallback::new(action, arg));
        debug!(%action, arg, "exit callback registered");
    }

    /// Remove an entry; absent entries are ignored.
    pub fn unregister(&mut self, action: CleanupAction, arg: &str) {
        let before = self.entries.len();
        self.entries.retain(|e| !(e.action == action && e.arg == arg));
        if self.entries.len() != before {
            debug!(%action, arg, "exit callback unregistered");
        }
    }

    pub fn contains(&self, action: CleanupAction, arg: &str) -> bool {
        self.entries.iter().any(|e| e.action == action && e.arg == arg)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered entries in registration order.
    pub fn entries(&self) -> &[ExitCallback] {
        &self.entries
    }

    pub fn is_drained(&self) -> bool {
        self.drained
    }

    /// Hand out every still-registered entry, most recently registered
    /// first, and clear the registry.
    ///
    /// Only the first call returns entries; later calls return `None`, so
    /// the drain happens exactly once.
    pub fn take_for_drain(&mut self) -> Option<Vec<ExitCallback>> {
        if self.drained {
            return None;
        }
        self.drained = true;
        let mut entries = std::mem::take(&mut self.entries);
        entries.reverse();
        Some(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_idempotent() {
        let mut reg = ExitCallbackRegistry::new();
        reg.register(CleanupAction::CloseTunnel, "a");
        reg.register(CleanupAction::CloseTunnel, "b");
        reg.register(CleanupAction::CloseTunnel, "a");
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.entries()[0].arg, "a");
    }

    #[test]
    fn same_arg_different_action_are_distinct() {
        let mut reg = ExitCallbackRegistry::new();
        reg.register(CleanupAction::CloseTunnel, "x");
        reg.register(CleanupAction::TerminateCommand, "x");
        assert_eq!(reg.len(), 2);
        reg.unregister(CleanupAction::CloseTunnel, "x");
        assert!(reg.contains(CleanupAction::TerminateCommand, "x"));
        assert!(!reg.contains(CleanupAction::CloseTunnel, "x"));
    }

    #[test]
    fn unregister_absent_is_noop() {
        let mut reg = ExitCallbackRegistry::new();
        reg.unregister(CleanupAction::CloseTunnel, "never");
        assert!(reg.is_empty());
    }

    #[test]
    fn drain_is_reverse_order_and_once() {
        let mut reg = ExitCallbackRegistry::new();
        reg.register(CleanupAction::RemoveLockfile, "/tmp/lock");
        reg.register(CleanupAction::CloseTunnel, "db");
        reg.register(CleanupAction::TerminateCommand, "ssh");

        let drained = reg.take_for_drain().unwrap();
        let rendered: Vec<String> = drained.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "terminate-command(ssh)",
                "close-tunnel(db)",
                "remove-lockfile(/tmp/lock)"
            ]
        );
        assert!(reg.is_empty());
        assert!(reg.take_for_drain().is_none());
    }
}
