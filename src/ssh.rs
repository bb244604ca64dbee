// src/ssh.rs

//! SSH command lines for tunnels and backgrounded remote commands.

use crate::config::{RemoteConfig, SshSection, TunnelConfig};
use crate::exec::CommandSpec;
use crate::process::TcpProbe;
use crate::supervisor::TunnelRequest;

/// `ssh [options] -N -o ExitOnForwardFailure=yes -L lhost:lport:rhost:rport [-p port] [user@]host`
///
/// `ExitOnForwardFailure` makes ssh quit when the local port cannot be
/// bound, which the supervisor then sees as an unexpected exit instead of
/// waiting out the timeout.
pub fn tunnel_command(ssh: &SshSection, tunnel: &TunnelConfig) -> CommandSpec {
    let forward = format!(
        "{}:{}:{}:{}",
        tunnel.local_host, tunnel.local_port, tunnel.remote_host, tunnel.remote_port
    );

    let spec = CommandSpec::new(ssh.cmd.clone())
        .args(ssh.options.iter().cloned())
        .args(["-N", "-o", "ExitOnForwardFailure=yes", "-L"])
        .arg(forward);

    with_destination(spec, tunnel.ssh_port, tunnel.ssh_user.as_deref(), &tunnel.ssh_host)
}

/// `ssh [options] [-p port] [user@]host -- command`
pub fn remote_command(ssh: &SshSection, remote: &RemoteConfig) -> CommandSpec {
    let spec = CommandSpec::new(ssh.cmd.clone()).args(ssh.options.iter().cloned());
    with_destination(spec, remote.ssh_port, remote.ssh_user.as_deref(), &remote.ssh_host)
        .arg("--")
        .arg(remote.command.clone())
}

/// Tunnel request for `[tunnel.<name>]`, probing the local end of the
/// forward.
pub fn tunnel_request(ssh: &SshSection, name: &str, tunnel: &TunnelConfig) -> TunnelRequest {
    TunnelRequest::new(
        tunnel.effective_description(name),
        tunnel_command(ssh, tunnel),
        TcpProbe::new(tunnel.local_host.clone(), tunnel.local_port),
    )
}

fn with_destination(spec: CommandSpec, port: Option<u16>, user: Option<&str>, host: &str) -> CommandSpec {
    let spec = match port {
        Some(port) => spec.arg("-p").arg(port.to_string()),
        None => spec,
    };
    match user {
        Some(user) => spec.arg(format!("{user}@{host}")),
        None => spec.arg(host),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tunnel() -> TunnelConfig {
        TunnelConfig {
            description: None,
            ssh_host: "db1.example.com".to_string(),
            ssh_user: Some("backup".to_string()),
            ssh_port: Some(2222),
            local_host: "127.0.0.1".to_string(),
            local_port: 3307,
            remote_host: "localhost".to_string(),
            remote_port: 3306,
        }
    }

    #[test]
    fn tunnel_command_line() {
        let ssh = SshSection {
            cmd: "ssh".to_string(),
            options: vec!["-o".to_string(), "BatchMode=yes".to_string()],
        };
        assert_eq!(
            tunnel_command(&ssh, &tunnel()).to_string(),
            "ssh -o BatchMode=yes -N -o ExitOnForwardFailure=yes \
             -L 127.0.0.1:3307:localhost:3306 -p 2222 backup@db1.example.com"
        );
    }

    #[test]
    fn remote_command_line() {
        let remote = RemoteConfig {
            ssh_host: "files".to_string(),
            ssh_user: None,
            ssh_port: None,
            command: "hold-snapshot --for 3600".to_string(),
        };
        assert_eq!(
            remote_command(&SshSection::default(), &remote).to_string(),
            "ssh files -- 'hold-snapshot --for 3600'"
        );
    }

    #[test]
    fn request_probes_local_end() {
        let req = tunnel_request(&SshSection::default(), "db", &tunnel());
        assert_eq!(req.probe.target(), "127.0.0.1:3307");
        assert!(req.description.starts_with("db ("));
    }
}
