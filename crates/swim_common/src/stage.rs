//! Staging: install artifacts into the inactive boot slot
//!
//! A device already on the target version is left alone after a single
//! version query.

use crate::device::{parse_version, CommandSet, SlotTable};
use crate::model::Artifact;
use crate::remote::{run_checked, RemoteError, RemoteShell};
use serde::Serialize;
use tracing::{error, info};

/// Staging errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StagingError {
    #[error("unable to determine the running software version")]
    VersionUnknown,

    #[error("no inactive boot slot found")]
    NoInactiveSlot,

    #[error("install of {artifact} failed with exit {exit_code}: {stderr}")]
    InstallFailed {
        artifact: String,
        exit_code: i32,
        stderr: String,
    },

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// What staging did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StageOutcome {
    /// Running version already equals the target; nothing installed
    AlreadyCurrent { version: String },

    Installed {
        from_version: String,
        slot: String,
        artifacts: Vec<String>,
    },
}

/// Running software version
pub fn current_version(
    shell: &mut dyn RemoteShell,
    commands: &CommandSet,
) -> Result<String, StagingError> {
    let output = shell.run_command(&commands.current_version)?;
    if !output.success() {
        return Err(StagingError::VersionUnknown);
    }
    parse_version(&output.stdout).ok_or(StagingError::VersionUnknown)
}

/// All boot slots with their active marking
pub fn read_slots(
    shell: &mut dyn RemoteShell,
    commands: &CommandSet,
) -> Result<SlotTable, StagingError> {
    let output = run_checked(shell, &commands.list_slots)?;
    Ok(SlotTable::parse(&output.stdout, &commands.slot_prefix))
}

/// First slot not marked active
pub fn inactive_slot(
    shell: &mut dyn RemoteShell,
    commands: &CommandSet,
) -> Result<String, StagingError> {
    read_slots(shell, commands)?
        .inactive()
        .map(str::to_string)
        .ok_or(StagingError::NoInactiveSlot)
}

/// Install every artifact, in order, into the inactive slot
pub fn stage(
    shell: &mut dyn RemoteShell,
    commands: &CommandSet,
    artifacts: &[Artifact],
    target_version: &str,
) -> Result<StageOutcome, StagingError> {
    let version = current_version(shell, commands)?;
    if version == target_version {
        info!(version = %version, "already running target version, nothing to stage");
        return Ok(StageOutcome::AlreadyCurrent { version });
    }

    let slot = inactive_slot(shell, commands)?;
    info!(from = %version, to = target_version, slot = %slot, "staging software");

    let mut installed = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        info!(file = %artifact.filename, slot = %slot, "installing");
        let output = shell.run_command(&commands.install(&artifact.remote_path, &slot))?;
        if !output.success() {
            error!(file = %artifact.filename, exit_code = output.exit_code, "install failed");
            return Err(StagingError::InstallFailed {
                artifact: artifact.filename.clone(),
                exit_code: output.exit_code,
                stderr: output.diagnostic().to_string(),
            });
        }
        installed.push(artifact.filename.clone());
    }

    Ok(StageOutcome::Installed {
        from_version: version,
        slot,
        artifacts: installed,
    })
}
