//! OpenSSH-backed session
//!
//! `connect` starts a control master (`ssh -M -N -f`) on a private socket;
//! commands and `scp` pushes then ride that one authenticated connection.
//! Key auth runs with `BatchMode=yes`. A configured password goes through
//! `sshpass -e` so it never appears on a command line.
//!
//! The master is torn down on `close` and on drop. When the device reboots
//! the master dies with the link and close becomes a no-op.

use super::{CommandOutput, Connector, RemoteError, RemoteShell};
use crate::config::SshConfig;
use crate::device::DeviceFamily;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, info, warn};

/// sshpass exit status for a rejected password
const SSHPASS_BAD_PASSWORD: i32 = 5;

static SESSION_SEQ: AtomicU32 = AtomicU32::new(0);

/// Who to log in as, and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub user: String,
    pub port: u16,
}

impl SshTarget {
    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// `user@host:path`, bracketing IPv6 literals for scp
    fn scp_destination(&self, remote: &str) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("{}@[{}]:{}", self.user, self.host, remote)
        } else {
            format!("{}@{}:{}", self.user, self.host, remote)
        }
    }
}

/// Live control-master session
pub struct SshSession {
    target: SshTarget,
    config: SshConfig,
    control_path: PathBuf,
    closed: bool,
}

impl SshSession {
    /// Authenticate and start the control master
    pub fn connect(target: SshTarget, config: &SshConfig) -> Result<Self, RemoteError> {
        let control_path = control_socket_path(config);
        if let Some(parent) = control_path.parent() {
            fs::create_dir_all(parent).map_err(|e| RemoteError::Connect {
                host: target.host.clone(),
                detail: format!("cannot create control socket dir: {}", e),
            })?;
        }

        // Stays closed until the master is up, so a failed start skips teardown
        let mut session = Self {
            target,
            config: config.clone(),
            control_path,
            closed: true,
        };

        let mut cmd = session.program(&session.config.ssh_program);
        session.common_options(&mut cmd, false);
        cmd.args(["-M", "-N", "-f"])
            .arg("-o")
            .arg("ControlPersist=yes")
            .arg(session.target.destination());

        debug!(host = %session.target.host, user = %session.target.user, "starting ssh control master");
        let output = run(cmd).map_err(|e| RemoteError::Connect {
            host: session.target.host.clone(),
            detail: e,
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let code = output.status.code().unwrap_or(-1);
            return Err(classify_connect_failure(&session.target, code, &stderr));
        }

        session.closed = false;
        info!(host = %session.target.host, user = %session.target.user, "ssh session established");
        Ok(session)
    }

    pub fn target(&self) -> &SshTarget {
        &self.target
    }

    /// Base command, wrapped in sshpass when a password is configured
    fn program(&self, program: &str) -> Command {
        match &self.config.password {
            Some(password) => {
                let mut cmd = Command::new(&self.config.sshpass_program);
                cmd.arg("-e").arg(program).env("SSHPASS", password);
                cmd
            }
            None => Command::new(program),
        }
    }

    fn common_options(&self, cmd: &mut Command, scp_style: bool) {
        cmd.arg(if scp_style { "-P" } else { "-p" })
            .arg(self.target.port.to_string());
        cmd.arg("-o")
            .arg(format!("ControlPath={}", self.control_path.display()));
        cmd.arg("-o")
            .arg(format!("ConnectTimeout={}", self.config.connect_timeout_secs));
        cmd.arg("-o").arg(format!(
            "ServerAliveInterval={}",
            self.config.server_alive_interval_secs
        ));
        if self.config.password.is_none() {
            cmd.arg("-o").arg("BatchMode=yes");
        } else {
            cmd.arg("-o").arg("PubkeyAuthentication=no");
        }
        if let Some(identity) = &self.config.identity_file {
            cmd.arg("-i").arg(identity);
        }
        if let Some(known_hosts) = &self.config.known_hosts_file {
            cmd.arg("-o")
                .arg(format!("UserKnownHostsFile={}", known_hosts.display()));
        }
        if !self.config.strict_host_key_checking {
            cmd.arg("-o").arg("StrictHostKeyChecking=no");
            if self.config.known_hosts_file.is_none() {
                cmd.arg("-o").arg("UserKnownHostsFile=/dev/null");
            }
        }
        cmd.arg("-o").arg("LogLevel=ERROR");
    }
}

impl RemoteShell for SshSession {
    fn run_command(&mut self, command: &str) -> Result<CommandOutput, RemoteError> {
        if self.closed {
            return Err(RemoteError::Closed);
        }
        let mut cmd = self.program(&self.config.ssh_program);
        self.common_options(&mut cmd, false);
        cmd.arg("--").arg(self.target.destination()).arg(command);

        debug!(host = %self.target.host, command, "remote exec");
        let output = run(cmd).map_err(|detail| RemoteError::Command {
            command: command.to_string(),
            detail,
        })?;

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        };
        debug!(host = %self.target.host, exit_code = result.exit_code, "remote exec finished");
        Ok(result)
    }

    fn put_file(&mut self, local: &Path, remote: &str) -> Result<(), RemoteError> {
        if self.closed {
            return Err(RemoteError::Closed);
        }
        let mut cmd = self.program(&self.config.scp_program);
        self.common_options(&mut cmd, true);
        cmd.arg("-q")
            .arg(local)
            .arg(self.target.scp_destination(remote));

        info!(host = %self.target.host, local = %local.display(), remote, "copying file");
        let transfer_err = |detail: String| RemoteError::Transfer {
            local: local.display().to_string(),
            remote: remote.to_string(),
            detail,
        };
        let output = run(cmd).map_err(transfer_err)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(transfer_err(format!(
                "scp exit {}: {}",
                output.status.code().unwrap_or(-1),
                stderr
            )));
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let mut cmd = Command::new(&self.config.ssh_program);
        cmd.arg("-o")
            .arg(format!("ControlPath={}", self.control_path.display()))
            .args(["-O", "exit"])
            .arg(self.target.destination());
        match run(cmd) {
            Ok(out) if out.status.success() => {
                debug!(host = %self.target.host, "ssh control master stopped")
            }
            // Master already gone, typically after a reboot
            Ok(_) => debug!(host = %self.target.host, "ssh control master was not running"),
            Err(e) => warn!(host = %self.target.host, error = %e, "failed to stop ssh control master"),
        }
        let _ = fs::remove_file(&self.control_path);
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Opens `SshSession`s with credentials from config and family defaults
pub struct SshConnector {
    config: SshConfig,
}

impl SshConnector {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }
}

impl Connector for SshConnector {
    fn connect(
        &self,
        address: &str,
        family: DeviceFamily,
    ) -> Result<Box<dyn RemoteShell>, RemoteError> {
        let user = self
            .config
            .username
            .clone()
            .unwrap_or_else(|| family.default_username().to_string());
        let target = SshTarget {
            host: address.to_string(),
            user,
            port: self.config.port,
        };
        Ok(Box::new(SshSession::connect(target, &self.config)?))
    }
}

fn control_socket_path(config: &SshConfig) -> PathBuf {
    let dir = config
        .control_dir
        .clone()
        .unwrap_or_else(std::env::temp_dir);
    let seq = SESSION_SEQ.fetch_add(1, Ordering::Relaxed);
    // Unix socket paths are short; keep the name compact
    dir.join(format!("swim-{}-{}.ctl", std::process::id(), seq))
}

fn run(mut cmd: Command) -> Result<Output, String> {
    cmd.stdin(Stdio::null())
        .output()
        .map_err(|e| format!("failed to spawn {:?}: {}", cmd.get_program(), e))
}

/// Map a failed master start to `Auth` or `Connect`
pub fn classify_connect_failure(target: &SshTarget, exit_code: i32, stderr: &str) -> RemoteError {
    const AUTH_MARKERS: [&str; 4] = [
        "Permission denied",
        "Authentication failed",
        "Too many authentication failures",
        "incorrect password",
    ];
    let auth = (exit_code == SSHPASS_BAD_PASSWORD && !stderr.contains("Connection"))
        || AUTH_MARKERS.iter().any(|m| stderr.contains(m));

    let detail = if stderr.is_empty() {
        format!("exit {}", exit_code)
    } else {
        stderr.to_string()
    };
    if auth {
        RemoteError::Auth {
            user: target.user.clone(),
            host: target.host.clone(),
            detail,
        }
    } else {
        RemoteError::Connect {
            host: target.host.clone(),
            detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> SshTarget {
        SshTarget {
            host: "10.0.0.5".to_string(),
            user: "admin".to_string(),
            port: 22,
        }
    }

    #[test]
    fn test_classify_permission_denied_as_auth() {
        let err = classify_connect_failure(
            &target(),
            255,
            "admin@10.0.0.5: Permission denied (publickey,password).",
        );
        assert!(err.is_auth());
    }

    #[test]
    fn test_classify_sshpass_bad_password_as_auth() {
        assert!(classify_connect_failure(&target(), 5, "").is_auth());
    }

    #[test]
    fn test_classify_unreachable_as_connect() {
        let err = classify_connect_failure(
            &target(),
            255,
            "ssh: connect to host 10.0.0.5 port 22: Connection timed out",
        );
        assert!(matches!(err, RemoteError::Connect { .. }));
        assert!(err.to_string().contains("Connection timed out"));
    }

    #[test]
    fn test_scp_destination_brackets_ipv6() {
        let mut t = target();
        assert_eq!(t.scp_destination("/shared/a.iso"), "admin@10.0.0.5:/shared/a.iso");
        t.host = "fd00::5".to_string();
        assert_eq!(t.scp_destination("/shared/a.iso"), "admin@[fd00::5]:/shared/a.iso");
    }

    #[test]
    fn test_control_socket_paths_are_unique() {
        let config = SshConfig::default();
        assert_ne!(control_socket_path(&config), control_socket_path(&config));
    }

    #[test]
    fn test_connect_failure_when_ssh_missing() {
        let config = SshConfig {
            ssh_program: "/nonexistent/ssh-binary".to_string(),
            ..SshConfig::default()
        };
        let err = SshSession::connect(target(), &config).err().unwrap();
        assert!(matches!(err, RemoteError::Connect { .. }));
    }
}
