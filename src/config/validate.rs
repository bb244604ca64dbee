// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{BackhaulError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::BackhaulError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_phases(cfg)?;
    validate_global_config(cfg)?;
    validate_tunnels(cfg)?;
    validate_remotes(cfg)?;
    validate_name_overlap(cfg)?;
    validate_phases(cfg)?;
    Ok(())
}

fn config_error(msg: impl Into<String>) -> BackhaulError {
    BackhaulError::ConfigError(msg.into())
}

fn ensure_has_phases(cfg: &RawConfigFile) -> Result<()> {
    if cfg.phase.is_empty() {
        return Err(config_error(
            "config must contain at least one [[phase]] section",
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    // on_tunnel_failure is strongly typed and validated during
    // deserialization.

    if cfg.config.tunnel_timeout == 0 {
        return Err(config_error(
            "[config].tunnel_timeout must be >= 1 (got 0)",
        ));
    }

    if cfg.ssh.cmd.trim().is_empty() {
        return Err(config_error("[ssh].cmd must not be blank"));
    }

    if let Some(alert_cmd) = &cfg.config.alert_cmd {
        match alert_cmd.first() {
            Some(program) if !program.trim().is_empty() => {}
            _ => return Err(config_error("[config].alert_cmd must name a program")),
        }
    }

    Ok(())
}

fn validate_tunnels(cfg: &RawConfigFile) -> Result<()> {
    for (name, tunnel) in cfg.tunnel.iter() {
        check_name("tunnel", name)?;
        check_not_blank(&format!("tunnel '{name}'"), "ssh_host", &tunnel.ssh_host)?;
        check_not_blank(&format!("tunnel '{name}'"), "local_host", &tunnel.local_host)?;
        check_not_blank(&format!("tunnel '{name}'"), "remote_host", &tunnel.remote_host)?;
        check_port(&format!("tunnel '{name}'"), "local_port", Some(tunnel.local_port))?;
        check_port(&format!("tunnel '{name}'"), "remote_port", Some(tunnel.remote_port))?;
        check_port(&format!("tunnel '{name}'"), "ssh_port", tunnel.ssh_port)?;
    }
    Ok(())
}

fn validate_remotes(cfg: &RawConfigFile) -> Result<()> {
    for (name, remote) in cfg.remote.iter() {
        check_name("remote", name)?;
        check_not_blank(&format!("remote '{name}'"), "ssh_host", &remote.ssh_host)?;
        check_not_blank(&format!("remote '{name}'"), "command", &remote.command)?;
        check_port(&format!("remote '{name}'"), "ssh_port", remote.ssh_port)?;
    }
    Ok(())
}

/// Tunnels and remote commands share one handle namespace at runtime.
fn validate_name_overlap(cfg: &RawConfigFile) -> Result<()> {
    if let Some(name) = cfg.tunnel.keys().find(|name| cfg.remote.contains_key(*name)) {
        return Err(config_error(format!(
            "name '{name}' is used by both a tunnel and a remote command"
        )));
    }
    Ok(())
}

fn validate_phases(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = HashSet::new();

    for phase in cfg.phase.iter() {
        check_name("phase", &phase.name)?;

        if !seen.insert(phase.name.as_str()) {
            return Err(config_error(format!(
                "phase '{}' is defined more than once",
                phase.name
            )));
        }

        for tunnel in phase.tunnels.iter() {
            if !cfg.tunnel.contains_key(tunnel) {
                return Err(config_error(format!(
                    "phase '{}' references unknown tunnel '{}'",
                    phase.name, tunnel
                )));
            }
        }

        for remote in phase.remote.iter() {
            if !cfg.remote.contains_key(remote) {
                return Err(config_error(format!(
                    "phase '{}' references unknown remote command '{}'",
                    phase.name, remote
                )));
            }
        }

        if let Some(cmd) = &phase.cmd {
            match cmd.first() {
                Some(program) if !program.trim().is_empty() => {}
                _ => {
                    return Err(config_error(format!(
                        "phase '{}' has an empty cmd",
                        phase.name
                    )));
                }
            }
        }
    }

    Ok(())
}

fn check_name(kind: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(config_error(format!("{kind} name must not be blank")));
    }
    Ok(())
}

fn check_not_blank(owner: &str, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(config_error(format!("{owner}: {field} must not be blank")));
    }
    Ok(())
}

fn check_port(owner: &str, field: &str, port: Option<u16>) -> Result<()> {
    if port == Some(0) {
        return Err(config_error(format!(
            "{owner}: {field} must be between 1 and 65535 (got 0)"
        )));
    }
    Ok(())
}
