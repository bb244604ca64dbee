// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::types::EscalationPolicy;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// tunnel_timeout = 10
/// on_tunnel_failure = "phase"
///
/// [tunnel.db]
/// ssh_host = "db1.example.com"
/// local_port = 3307
/// remote_port = 3306
///
/// [[phase]]
/// name = "mysql"
/// tunnels = ["db"]
/// cmd = ["sh", "-c", "mysqldump -P 3307 --all-databases > all.sql"]
/// ```
///
/// This is the unvalidated form; see [`ConfigFile`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    /// Global behaviour config from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Shared SSH client settings from `[ssh]`.
    #[serde(default)]
    pub ssh: SshSection,

    /// Tunnels from `[tunnel.<name>]`, keyed by logical name.
    #[serde(default)]
    pub tunnel: BTreeMap<String, TunnelConfig>,

    /// Backgrounded remote commands from `[remote.<name>]`.
    #[serde(default)]
    pub remote: BTreeMap<String, RemoteConfig>,

    /// Backup phases from `[[phase]]`, in run order.
    #[serde(default)]
    pub phase: Vec<PhaseConfig>,
}

/// Validated configuration. Only obtainable through
/// `ConfigFile::try_from(RawConfigFile)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub ssh: SshSection,
    pub tunnel: BTreeMap<String, TunnelConfig>,
    pub remote: BTreeMap<String, RemoteConfig>,
    pub phase: Vec<PhaseConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            config: raw.config,
            ssh: raw.ssh,
            tunnel: raw.tunnel,
            remote: raw.remote,
            phase: raw.phase,
        }
    }

    pub fn find_phase(&self, name: &str) -> Option<&PhaseConfig> {
        self.phase.iter().find(|p| p.name == name)
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Seconds a tunnel gets to become reachable before it is killed.
    #[serde(default = "default_tunnel_timeout")]
    pub tunnel_timeout: u64,

    /// `"exit"` (default) or `"phase"`.
    #[serde(default)]
    pub on_tunnel_failure: EscalationPolicy,

    /// Trace executed command lines to the diagnostic channel.
    #[serde(default = "default_print_cmds")]
    pub print_cmds: bool,

    /// Lock directory created for the duration of the run.
    #[serde(default)]
    pub lockfile: Option<PathBuf>,

    /// Command that receives alert messages on stdin, e.g.
    /// `["mail", "-s", "backhaul alert", "root"]`.
    #[serde(default)]
    pub alert_cmd: Option<Vec<String>>,

    /// File that receives the diagnostic channel.
    #[serde(default)]
    pub diag_log: Option<PathBuf>,
}

fn default_tunnel_timeout() -> u64 {
    10
}

fn default_print_cmds() -> bool {
    true
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            tunnel_timeout: default_tunnel_timeout(),
            on_tunnel_failure: EscalationPolicy::default(),
            print_cmds: default_print_cmds(),
            lockfile: None,
            alert_cmd: None,
            diag_log: None,
        }
    }
}

/// `[ssh]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SshSection {
    /// SSH client binary.
    #[serde(default = "default_ssh_cmd")]
    pub cmd: String,

    /// Extra options passed before any generated ones.
    #[serde(default)]
    pub options: Vec<String>,
}

fn default_ssh_cmd() -> String {
    "ssh".to_string()
}

impl Default for SshSection {
    fn default() -> Self {
        Self {
            cmd: default_ssh_cmd(),
            options: Vec::new(),
        }
    }
}

/// `[tunnel.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TunnelConfig {
    /// Free text used in log and alert messages.
    #[serde(default)]
    pub description: Option<String>,

    pub ssh_host: String,

    #[serde(default)]
    pub ssh_user: Option<String>,

    #[serde(default)]
    pub ssh_port: Option<u16>,

    /// Local bind address; also what the liveness probe connects to.
    #[serde(default = "default_local_host")]
    pub local_host: String,

    pub local_port: u16,

    /// Target address as seen from the SSH server.
    #[serde(default = "default_remote_host")]
    pub remote_host: String,

    pub remote_port: u16,
}

fn default_local_host() -> String {
    "127.0.0.1".to_string()
}

fn default_remote_host() -> String {
    "localhost".to_string()
}

impl TunnelConfig {
    /// Description for messages, falling back to a generated one.
    pub fn effective_description(&self, name: &str) -> String {
        match &self.description {
            Some(d) if !d.trim().is_empty() => d.clone(),
            _ => format!(
                "{name} ({}:{} -> {}:{} via {})",
                self.local_host, self.local_port, self.remote_host, self.remote_port, self.ssh_host
            ),
        }
    }
}

/// `[remote.<name>]` section: a command kept running on a remote host for
/// the duration of a phase.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    pub ssh_host: String,

    #[serde(default)]
    pub ssh_user: Option<String>,

    #[serde(default)]
    pub ssh_port: Option<u16>,

    pub command: String,
}

/// `[[phase]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct PhaseConfig {
    pub name: String,

    /// Tunnels opened, in order, before the phase command runs.
    #[serde(default)]
    pub tunnels: Vec<String>,

    /// Remote commands launched after the tunnels are up.
    #[serde(default)]
    pub remote: Vec<String>,

    /// Foreground command (argv) run once everything is up.
    #[serde(default)]
    pub cmd: Option<Vec<String>>,
}
