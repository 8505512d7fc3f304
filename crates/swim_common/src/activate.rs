//! Activation: reboot into the staged slot
//!
//! The device drops the SSH connection as it goes down, so an ssh transport
//! failure after the command was sent counts as a successful reboot. A
//! transport failure that never reached the device does not.
//! Boot completion is not awaited.

use crate::device::CommandSet;
use crate::remote::{RemoteError, RemoteShell, SSH_TRANSPORT_FAILURE};
use crate::stage::StagingError;
use tracing::info;

/// Activation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActivationError {
    #[error("device rejected reboot to {slot} (exit {exit_code}): {stderr}")]
    Rejected {
        slot: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("unable to determine target slot: {0}")]
    Slot(#[from] StagingError),

    #[error("unable to send reboot command: {0}")]
    Remote(#[from] RemoteError),
}

/// Reboot the device into `slot`
pub fn activate(
    shell: &mut dyn RemoteShell,
    commands: &CommandSet,
    slot: &str,
) -> Result<(), ActivationError> {
    info!(slot, "rebooting into staged slot");
    let command = commands.reboot(slot);
    let output = shell.run_command(&command)?;

    match output.exit_code {
        0 => info!(slot, "reboot accepted"),
        _ if output.link_dropped() => info!(slot, "connection dropped, device is rebooting"),
        SSH_TRANSPORT_FAILURE => {
            return Err(ActivationError::Remote(RemoteError::Command {
                command,
                detail: format!("ssh exit {}: {}", output.exit_code, output.diagnostic()),
            }))
        }
        exit_code => {
            return Err(ActivationError::Rejected {
                slot: slot.to_string(),
                exit_code,
                stderr: output.diagnostic().to_string(),
            })
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{CommandOutput, ScriptedShell};

    #[test]
    fn test_reboot_accepted() {
        let mut shell = ScriptedShell::new().on("tmsh reboot", CommandOutput::ok(""));
        let journal = shell.journal();
        activate(&mut shell, &CommandSet::default(), "HD1.2").unwrap();
        assert_eq!(journal.commands(), vec!["tmsh reboot volume HD1.2"]);
    }

    #[test]
    fn test_dropped_connection_is_reboot() {
        let mut shell = ScriptedShell::new().on(
            "tmsh reboot",
            CommandOutput::failed(255, "Connection to 10.0.0.5 closed by remote host."),
        );
        assert!(activate(&mut shell, &CommandSet::default(), "HD1.2").is_ok());
    }

    #[test]
    fn test_silent_transport_exit_is_reboot() {
        let mut shell = ScriptedShell::new().on("tmsh reboot", CommandOutput::failed(255, ""));
        assert!(activate(&mut shell, &CommandSet::default(), "HD1.2").is_ok());
    }

    #[test]
    fn test_unreachable_device_is_not_a_reboot() {
        let mut shell = ScriptedShell::new().on(
            "tmsh reboot",
            CommandOutput::failed(255, "ssh: connect to host 10.0.0.5 port 22: Connection refused"),
        );
        let err = activate(&mut shell, &CommandSet::default(), "HD1.2").unwrap_err();
        match err {
            ActivationError::Remote(RemoteError::Command { command, detail }) => {
                assert_eq!(command, "tmsh reboot volume HD1.2");
                assert!(detail.contains("Connection refused"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_cli_rejection() {
        let mut shell = ScriptedShell::new().on(
            "tmsh reboot",
            CommandOutput::failed(1, "01070734:3: Configuration error: volume HD1.2 not found"),
        );
        let err = activate(&mut shell, &CommandSet::default(), "HD1.2").unwrap_err();
        assert!(matches!(err, ActivationError::Rejected { exit_code: 1, .. }));
    }

    #[test]
    fn test_closed_session_cannot_send() {
        let mut shell = ScriptedShell::new();
        shell.close();
        let err = activate(&mut shell, &CommandSet::default(), "HD1.2").unwrap_err();
        assert_eq!(err, ActivationError::Remote(RemoteError::Closed));
    }
}
