//! Remote Execution Adapter
//!
//! Everything a phase does on the device goes through `RemoteShell`:
//! run a command and collect (stdout, stderr, exit code), or push a file.
//! `SshSession` is the OpenSSH-backed implementation; `ScriptedShell` is an
//! in-memory double that records every call.

pub mod scripted;
pub mod ssh;

pub use scripted::{ScriptedConnector, ScriptedShell, ShellEvent, ShellJournal};
pub use ssh::{SshConnector, SshSession, SshTarget};

use crate::device::{CommandSet, DeviceFamily};
use std::path::Path;

/// Exit status ssh uses for its own (transport) failures
pub const SSH_TRANSPORT_FAILURE: i32 = 255;

/// ssh diagnostics for a link that was up and then went away
const LINK_DROP_MARKERS: [&str; 6] = [
    "closed by remote host",
    "Connection closed by",
    "Connection reset",
    "Broken pipe",
    "not responding",
    "Shared connection to",
];

/// ssh diagnostics for a connection that never carried the command
const UNREACHED_MARKERS: [&str; 5] = [
    "connect to host",
    "kex_exchange_identification",
    "Could not resolve hostname",
    "Permission denied",
    "Host key verification failed",
];

/// Captured result of one remote command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    /// Exit 0 with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    /// Non-zero exit with the given stderr
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// First non-empty stdout line, trimmed
    pub fn first_line(&self) -> Option<&str> {
        self.stdout.lines().map(str::trim).find(|l| !l.is_empty())
    }

    /// Transport failure after the command reached the device
    ///
    /// Sessions run with `LogLevel=ERROR`, which hides ssh's informational
    /// "closed by remote host" line, so a bare 255 also counts. Failures to
    /// reach the host are printed at error level and never match.
    pub fn link_dropped(&self) -> bool {
        if self.exit_code != SSH_TRANSPORT_FAILURE {
            return false;
        }
        let err = self.stderr.trim();
        if UNREACHED_MARKERS.iter().any(|m| err.contains(m)) {
            return false;
        }
        err.is_empty() || LINK_DROP_MARKERS.iter().any(|m| err.contains(m))
    }

    /// Trimmed stderr, or stdout when stderr is empty
    pub fn diagnostic(&self) -> &str {
        let err = self.stderr.trim();
        if err.is_empty() {
            self.stdout.trim()
        } else {
            err
        }
    }
}

/// Remote adapter errors
///
/// `Auth` and `Connect` stay distinct: the orchestrator reports them with
/// different connectivity statuses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("authentication failed for {user}@{host}: {detail}")]
    Auth {
        user: String,
        host: String,
        detail: String,
    },

    #[error("cannot connect to {host}: {detail}")]
    Connect { host: String, detail: String },

    #[error("remote command `{command}` could not run: {detail}")]
    Command { command: String, detail: String },

    #[error("transfer of {local} to {remote} failed: {detail}")]
    Transfer {
        local: String,
        remote: String,
        detail: String,
    },

    #[error("remote session is closed")]
    Closed,
}

impl RemoteError {
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}

/// An authenticated shell on one device
pub trait RemoteShell {
    /// Run a command and block until its exit status is known
    fn run_command(&mut self, command: &str) -> Result<CommandOutput, RemoteError>;

    /// Copy a local file to a remote path
    fn put_file(&mut self, local: &Path, remote: &str) -> Result<(), RemoteError>;

    /// Release the session; must be safe to call more than once
    fn close(&mut self);
}

/// Opens sessions; lets the orchestrator stay independent of the transport
pub trait Connector {
    fn connect(
        &self,
        address: &str,
        family: DeviceFamily,
    ) -> Result<Box<dyn RemoteShell>, RemoteError>;
}

/// Run a command and fail on a non-zero exit
pub fn run_checked(shell: &mut dyn RemoteShell, command: &str) -> Result<CommandOutput, RemoteError> {
    let output = shell.run_command(command)?;
    if output.success() {
        Ok(output)
    } else {
        Err(RemoteError::Command {
            command: command.to_string(),
            detail: format!("exit {}: {}", output.exit_code, output.diagnostic()),
        })
    }
}

/// Whether a remote path exists; exit 1 means absent, other failures are errors
pub fn path_exists(
    shell: &mut dyn RemoteShell,
    commands: &CommandSet,
    path: &str,
) -> Result<bool, RemoteError> {
    probe(shell, &commands.path_exists(path))
}

/// Whether a remote directory exists
pub fn dir_exists(
    shell: &mut dyn RemoteShell,
    commands: &CommandSet,
    path: &str,
) -> Result<bool, RemoteError> {
    probe(shell, &commands.dir_exists(path))
}

fn probe(shell: &mut dyn RemoteShell, command: &str) -> Result<bool, RemoteError> {
    let output = shell.run_command(command)?;
    match output.exit_code {
        0 => Ok(true),
        1 => Ok(false),
        code => Err(RemoteError::Command {
            command: command.to_string(),
            detail: format!("exit {}: {}", code, output.diagnostic()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_output_diagnostic_prefers_stderr() {
        let out = CommandOutput {
            stdout: "partial\n".to_string(),
            stderr: " boom \n".to_string(),
            exit_code: 2,
        };
        assert_eq!(out.diagnostic(), "boom");
        assert_eq!(CommandOutput::failed(1, "").diagnostic(), "");
        assert!(!out.success());
        assert_eq!(out.first_line(), Some("partial"));
        assert_eq!(CommandOutput::ok("\n\n").first_line(), None);
    }

    #[test]
    fn test_link_dropped_only_for_established_links() {
        assert!(CommandOutput::failed(255, "").link_dropped());
        assert!(CommandOutput::failed(255, "Connection to 10.0.0.5 closed by remote host.").link_dropped());
        assert!(CommandOutput::failed(255, "client_loop: send disconnect: Broken pipe").link_dropped());
        assert!(!CommandOutput::failed(
            255,
            "ssh: connect to host 10.0.0.5 port 22: Connection refused"
        )
        .link_dropped());
        assert!(!CommandOutput::failed(
            255,
            "ssh: connect to host 10.0.0.5 port 22: Connection timed out"
        )
        .link_dropped());
        assert!(!CommandOutput::failed(
            255,
            "kex_exchange_identification: Connection closed by remote host"
        )
        .link_dropped());
        assert!(!CommandOutput::failed(255, "Bad owner or permissions on config").link_dropped());
        assert!(!CommandOutput::failed(1, "").link_dropped());
    }

    #[test]
    fn test_path_exists_maps_exit_codes() {
        let cmds = CommandSet::default();
        let mut shell = ScriptedShell::new()
            .on("test -e /present", CommandOutput::ok(""))
            .on("test -e /absent", CommandOutput::failed(1, ""))
            .on("test -e /broken", CommandOutput::failed(255, "Connection reset"));

        assert!(path_exists(&mut shell, &cmds, "/present").unwrap());
        assert!(!path_exists(&mut shell, &cmds, "/absent").unwrap());
        let err = path_exists(&mut shell, &cmds, "/broken").unwrap_err();
        assert!(matches!(err, RemoteError::Command { .. }));
    }

    #[test]
    fn test_run_checked_rejects_non_zero() {
        let mut shell = ScriptedShell::new().on("false", CommandOutput::failed(1, "nope"));
        let err = run_checked(&mut shell, "false").unwrap_err();
        assert!(err.to_string().contains("exit 1: nope"));
    }

    #[test]
    fn test_auth_error_is_distinguishable() {
        let auth = RemoteError::Auth {
            user: "admin".to_string(),
            host: "10.0.0.5".to_string(),
            detail: "Permission denied".to_string(),
        };
        let conn = RemoteError::Connect {
            host: "10.0.0.5".to_string(),
            detail: "No route to host".to_string(),
        };
        assert!(auth.is_auth());
        assert!(!conn.is_auth());
    }
}
