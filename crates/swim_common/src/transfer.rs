//! Artifact transfer
//!
//! Each artifact is copied only when the remote copy is absent or does not
//! match the expected checksum, and every copy is verified afterwards.
//! The first failure stops the run; later artifacts are not touched.

use crate::device::{parse_checksum_output, CommandSet};
use crate::model::Artifact;
use crate::remote::{path_exists, RemoteError, RemoteShell};
use serde::Serialize;
use tracing::{info, warn};

/// Transfer errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransferError {
    #[error("checksum mismatch after copy of {remote_path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        remote_path: String,
        expected: String,
        actual: String,
    },

    #[error("unable to compute checksum of {remote_path}: {detail}")]
    Checksum { remote_path: String, detail: String },

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// What happened to one artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferAction {
    /// Already present with the right checksum
    Skipped,
    Transferred,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferEntry {
    pub filename: String,
    pub remote_path: String,
    pub action: TransferAction,
}

/// Per-artifact outcome, in input order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    pub entries: Vec<TransferEntry>,
}

impl TransferReport {
    pub fn transferred(&self) -> usize {
        self.count(TransferAction::Transferred)
    }

    pub fn skipped(&self) -> usize {
        self.count(TransferAction::Skipped)
    }

    fn count(&self, action: TransferAction) -> usize {
        self.entries.iter().filter(|e| e.action == action).count()
    }
}

/// Copy missing or stale artifacts and verify each copy
pub fn transfer(
    shell: &mut dyn RemoteShell,
    commands: &CommandSet,
    artifacts: &[Artifact],
) -> Result<TransferReport, TransferError> {
    let mut report = TransferReport::default();

    for artifact in artifacts {
        let action = transfer_one(shell, commands, artifact)?;
        report.entries.push(TransferEntry {
            filename: artifact.filename.clone(),
            remote_path: artifact.remote_path.clone(),
            action,
        });
    }

    info!(
        transferred = report.transferred(),
        skipped = report.skipped(),
        "artifact transfer complete"
    );
    Ok(report)
}

fn transfer_one(
    shell: &mut dyn RemoteShell,
    commands: &CommandSet,
    artifact: &Artifact,
) -> Result<TransferAction, TransferError> {
    let remote = artifact.remote_path.as_str();

    if path_exists(shell, commands, remote)? {
        let actual = remote_checksum(shell, commands, artifact)?;
        if artifact.checksum.matches(&actual) {
            info!(file = %artifact.filename, remote, "already present with matching checksum, skipping");
            return Ok(TransferAction::Skipped);
        }
        warn!(
            file = %artifact.filename,
            remote,
            expected = %artifact.checksum,
            actual = %actual,
            "remote copy has wrong checksum, copying again"
        );
    }

    info!(file = %artifact.filename, local = %artifact.local_path.display(), remote, "copying artifact");
    shell.put_file(&artifact.local_path, remote)?;

    let actual = remote_checksum(shell, commands, artifact)?;
    if !artifact.checksum.matches(&actual) {
        return Err(TransferError::ChecksumMismatch {
            remote_path: remote.to_string(),
            expected: artifact.checksum.to_string(),
            actual,
        });
    }
    info!(file = %artifact.filename, checksum = %actual, "copy verified");
    Ok(TransferAction::Transferred)
}

/// Digest of the remote file using the artifact's algorithm
fn remote_checksum(
    shell: &mut dyn RemoteShell,
    commands: &CommandSet,
    artifact: &Artifact,
) -> Result<String, TransferError> {
    let remote = artifact.remote_path.as_str();
    let output = shell.run_command(&commands.checksum(artifact.checksum.algorithm(), remote))?;

    let digest = if output.success() {
        parse_checksum_output(&output.stdout)
    } else {
        None
    };
    digest.ok_or_else(|| TransferError::Checksum {
        remote_path: remote.to_string(),
        detail: match output.diagnostic() {
            "" => format!("exit {}, no output", output.exit_code),
            diag => format!("exit {}: {}", output.exit_code, diag),
        },
    })
}
