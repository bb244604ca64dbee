#![allow(dead_code)]

use std::path::Path;

use backhaul::config::{
    ConfigFile, PhaseConfig, RawConfigFile, RemoteConfig, TunnelConfig,
};
use backhaul::types::EscalationPolicy;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_tunnel(mut self, name: &str, tunnel: TunnelConfig) -> Self {
        self.config.tunnel.insert(name.to_string(), tunnel);
        self
    }

    pub fn with_remote(mut self, name: &str, host: &str, command: &str) -> Self {
        self.config.remote.insert(
            name.to_string(),
            RemoteConfig {
                ssh_host: host.to_string(),
                ssh_user: None,
                ssh_port: None,
                command: command.to_string(),
            },
        );
        self
    }

    pub fn with_phase(mut self, phase: PhaseConfig) -> Self {
        self.config.phase.push(phase);
        self
    }

    pub fn with_policy(mut self, policy: EscalationPolicy) -> Self {
        self.config.config.on_tunnel_failure = policy;
        self
    }

    pub fn with_tunnel_timeout(mut self, secs: u64) -> Self {
        self.config.config.tunnel_timeout = secs;
        self
    }

    pub fn with_lockfile(mut self, path: &Path) -> Self {
        self.config.config.lockfile = Some(path.to_path_buf());
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Tunnel forwarding `127.0.0.1:local_port` to `localhost:remote_port`
/// through `host`.
pub fn tunnel(host: &str, local_port: u16, remote_port: u16) -> TunnelConfig {
    TunnelConfig {
        description: None,
        ssh_host: host.to_string(),
        ssh_user: None,
        ssh_port: None,
        local_host: "127.0.0.1".to_string(),
        local_port,
        remote_host: "localhost".to_string(),
        remote_port,
    }
}

/// Builder for `PhaseConfig`.
pub struct PhaseBuilder {
    phase: PhaseConfig,
}

impl PhaseBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            phase: PhaseConfig {
                name: name.to_string(),
                tunnels: vec![],
                remote: vec![],
                cmd: None,
            },
        }
    }

    pub fn tunnel(mut self, name: &str) -> Self {
        self.phase.tunnels.push(name.to_string());
        self
    }

    pub fn remote(mut self, name: &str) -> Self {
        self.phase.remote.push(name.to_string());
        self
    }

    pub fn cmd(mut self, argv: &[&str]) -> Self {
        self.phase.cmd = Some(argv.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn build(self) -> PhaseConfig {
        self.phase
    }
}
