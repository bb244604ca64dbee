//! Scriptable stand-ins for the launcher, probe and alerter.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use backhaul::alert::{AlertChannel, Alerter};
use backhaul::errors::{BackhaulError, Result};
use backhaul::exec::CommandSpec;
use backhaul::process::{
    BackgroundLauncher, BackgroundProcess, LivenessProbe, ProbeResult, ProcessExit,
};

/// How a fake process launched under a given name behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeBehavior {
    /// Stays alive until killed.
    RunForever,
    /// Exits with `code` when checked for the `checks`-th time.
    ExitAfter { checks: u32, code: i32 },
    /// Spawning fails.
    FailToLaunch,
    /// Stays alive, and a kill never completes (records the kill, then
    /// waits forever for the reap).
    HangOnKill,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeEvent {
    Launched { name: String, command: String },
    Killed { name: String },
}

#[derive(Debug, Default)]
struct LauncherState {
    behaviors: HashMap<String, FakeBehavior>,
    events: Vec<FakeEvent>,
    next_pid: u32,
}

/// Launcher whose processes never touch the OS.
///
/// Clones share state, so a test can keep one clone for assertions after
/// handing another to the supervisor.
#[derive(Debug, Clone, Default)]
pub struct FakeLauncher {
    state: Arc<Mutex<LauncherState>>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the behaviour of processes launched under `name`
    /// (default: [`FakeBehavior::RunForever`]).
    pub fn behave(&self, name: &str, behavior: FakeBehavior) -> &Self {
        self.state
            .lock()
            .unwrap()
            .behaviors
            .insert(name.to_string(), behavior);
        self
    }

    pub fn events(&self) -> Vec<FakeEvent> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn launched(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                FakeEvent::Launched { name, .. } => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn killed(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                FakeEvent::Killed { name } => Some(name),
                _ => None,
            })
            .collect()
    }
}

impl BackgroundLauncher for FakeLauncher {
    fn launch(&mut self, name: &str, spec: &CommandSpec) -> Result<Box<dyn BackgroundProcess>> {
        let mut state = self.state.lock().unwrap();
        let behavior = state
            .behaviors
            .get(name)
            .copied()
            .unwrap_or(FakeBehavior::RunForever);

        if behavior == FakeBehavior::FailToLaunch {
            return Err(BackhaulError::Launch {
                name: name.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "fake launch failure"),
            });
        }

        state.next_pid += 1;
        let pid = 1000 + state.next_pid;
        state.events.push(FakeEvent::Launched {
            name: name.to_string(),
            command: spec.to_string(),
        });

        Ok(Box::new(FakeProcess {
            name: name.to_string(),
            pid,
            behavior,
            checks: 0,
            exit: None,
            launcher: Arc::clone(&self.state),
        }))
    }
}

pub struct FakeProcess {
    name: String,
    pid: u32,
    behavior: FakeBehavior,
    checks: u32,
    exit: Option<ProcessExit>,
    launcher: Arc<Mutex<LauncherState>>,
}

impl BackgroundProcess for FakeProcess {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn try_reap(&mut self) -> io::Result<Option<ProcessExit>> {
        if self.exit.is_some() {
            return Ok(self.exit);
        }
        self.checks += 1;
        if let FakeBehavior::ExitAfter { checks, code } = self.behavior {
            if self.checks >= checks {
                self.exit = Some(ProcessExit::code(code));
            }
        }
        Ok(self.exit)
    }

    fn kill_and_reap(&mut self) -> Pin<Box<dyn Future<Output = io::Result<ProcessExit>> + Send + '_>> {
        Box::pin(async move {
            if let Some(exit) = self.exit {
                return Ok(exit);
            }
            self.launcher.lock().unwrap().events.push(FakeEvent::Killed {
                name: self.name.clone(),
            });
            if self.behavior == FakeBehavior::HangOnKill {
                std::future::pending::<()>().await;
            }
            let exit = ProcessExit::signaled();
            self.exit = Some(exit);
            Ok(exit)
        })
    }
}

/// Probe that reports ready from its `k`-th attempt on (or never).
#[derive(Debug, Clone)]
pub struct ScriptedProbe {
    ready_from: Option<u32>,
    attempts: Arc<AtomicU32>,
}

impl ScriptedProbe {
    pub fn never() -> Self {
        Self {
            ready_from: None,
            attempts: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn ready_on_attempt(k: u32) -> Self {
        Self {
            ready_from: Some(k),
            attempts: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Attempts made so far, across all clones.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl LivenessProbe for ScriptedProbe {
    fn probe(&self) -> Pin<Box<dyn Future<Output = ProbeResult> + Send + '_>> {
        Box::pin(async move {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            match self.ready_from {
                Some(k) if attempt >= k => ProbeResult::Ready,
                _ => ProbeResult::NotReady,
            }
        })
    }

    fn target(&self) -> String {
        "scripted".to_string()
    }
}

/// Alerter that remembers every alert.
#[derive(Debug, Clone, Default)]
pub struct RecordingAlerter {
    alerts: Arc<Mutex<Vec<(String, AlertChannel)>>>,
}

impl RecordingAlerter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<(String, AlertChannel)> {
        self.alerts.lock().unwrap().clone()
    }
}

impl Alerter for RecordingAlerter {
    fn send_alert(&mut self, message: &str, channel: AlertChannel) {
        self.alerts
            .lock()
            .unwrap()
            .push((message.to_string(), channel));
    }
}
