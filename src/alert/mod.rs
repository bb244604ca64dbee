// src/alert/mod.rs

//! Alert delivery for failures that need a human.
//!
//! Alerts are fire-and-forget: delivery problems are logged and never
//! change the outcome of the operation that raised the alert. Deliveries
//! that are still in flight are awaited by [`Alerter::flush`] before the
//! process exits.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::exec::CommandSpec;

/// Target used for alert log events.
pub const ALERT_TARGET: &str = "backhaul::alert";

/// Where an alert is headed.
///
/// - `Log`: the failure is contained (e.g. one phase aborted).
/// - `Fatal`: the run is about to end because of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertChannel {
    Log,
    Fatal,
}

impl fmt::Display for AlertChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertChannel::Log => f.write_str("log"),
            AlertChannel::Fatal => f.write_str("fatal"),
        }
    }
}

pub trait Alerter: Send {
    fn send_alert(&mut self, message: &str, channel: AlertChannel);

    /// Wait until every alert sent so far has been handed over.
    fn flush(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async {})
    }
}

/// Alerts become `error` events on [`ALERT_TARGET`].
#[derive(Debug, Clone, Default)]
pub struct TracingAlerter;

impl Alerter for TracingAlerter {
    fn send_alert(&mut self, message: &str, channel: AlertChannel) {
        error!(target: ALERT_TARGET, %channel, "{message}");
    }
}

/// Logs like [`TracingAlerter`] and also pipes the message into a
/// configured command (e.g. `mail -s "backhaul alert" root`).
///
/// Each delivery runs as its own task; the handles are kept until
/// [`Alerter::flush`] so no message is lost when the run ends right after
/// the alert.
#[derive(Debug)]
pub struct CommandAlerter {
    command: CommandSpec,
    pending: Vec<JoinHandle<()>>,
}

impl CommandAlerter {
    pub fn new(command: CommandSpec) -> Self {
        Self {
            command,
            pending: Vec::new(),
        }
    }

    /// Deliveries started but not yet flushed.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl Alerter for CommandAlerter {
    fn send_alert(&mut self, message: &str, channel: AlertChannel) {
        TracingAlerter.send_alert(message, channel);

        let mut child = match self
            .command
            .to_tokio_command()
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!(command = %self.command, error = %e, "could not start alert command");
                return;
            }
        };

        let body = format!("[{channel}] {message}\n");
        let command = self.command.to_string();
        let delivery = tokio::spawn(async move {
            if let Some(mut stdin) = child.stdin.take() {
                if let Err(e) = stdin.write_all(body.as_bytes()).await {
                    warn!(command = %command, error = %e, "could not write alert to command");
                }
                // Dropping stdin sends EOF.
            }
            match child.wait().await {
                Ok(status) => debug!(command = %command, ?status, "alert command finished"),
                Err(e) => warn!(command = %command, error = %e, "alert command wait failed"),
            }
        });
        self.pending.retain(|handle| !handle.is_finished());
        self.pending.push(delivery);
    }

    fn flush(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            for delivery in self.pending.drain(..) {
                if let Err(e) = delivery.await {
                    warn!(command = %self.command, error = %e, "alert delivery task failed");
                }
            }
        })
    }
}

/// Build the alerter selected by `[config].alert_cmd`.
pub fn alerter_from_config(alert_cmd: Option<&[String]>) -> Box<dyn Alerter> {
    match alert_cmd.and_then(CommandSpec::from_argv) {
        Some(command) => Box::new(CommandAlerter::new(command)),
        None => Box::new(TracingAlerter),
    }
}

impl Alerter for Box<dyn Alerter> {
    fn send_alert(&mut self, message: &str, channel: AlertChannel) {
        (**self).send_alert(message, channel);
    }

    fn flush(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        (**self).flush()
    }
}
