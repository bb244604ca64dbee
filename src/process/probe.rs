// src/process/probe.rs

//! Readiness checks for started background processes.
//!
//! A probe answers "is the service behind this process reachable yet?",
//! which is a different question from "is the OS process still running?".
//! One probe attempt is always bounded; the retry loop belongs to the
//! caller.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    Ready,
    NotReady,
}

impl ProbeResult {
    pub fn is_ready(self) -> bool {
        matches!(self, ProbeResult::Ready)
    }
}

pub trait LivenessProbe: Send + Sync {
    /// Make one bounded readiness attempt.
    fn probe(&self) -> Pin<Box<dyn Future<Output = ProbeResult> + Send + '_>>;

    /// Human-readable target, for log messages.
    fn target(&self) -> String;
}

/// Default bound for a single connect attempt.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(500);

/// Ready once a TCP connection to `host:port` succeeds.
///
/// For a tunnel, `host:port` is the local end of the forward, so a
/// successful connect means the remote endpoint is reachable through it.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    host: String,
    port: u16,
    attempt_timeout: Duration,
}

impl TcpProbe {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }

    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }
}

impl LivenessProbe for TcpProbe {
    fn probe(&self) -> Pin<Box<dyn Future<Output = ProbeResult> + Send + '_>> {
        Box::pin(async move {
            let connect = TcpStream::connect((self.host.as_str(), self.port));
            match timeout(self.attempt_timeout, connect).await {
                Ok(Ok(_stream)) => ProbeResult::Ready,
                Ok(Err(e)) => {
                    trace!(host = %self.host, port = self.port, error = %e, "probe connect failed");
                    ProbeResult::NotReady
                }
                Err(_) => {
                    trace!(host = %self.host, port = self.port, "probe connect timed out");
                    ProbeResult::NotReady
                }
            }
        })
    }

    fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
