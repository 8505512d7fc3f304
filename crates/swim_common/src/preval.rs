//! Remote storage pre-validation
//!
//! Before anything is copied the image folder must exist and its mount
//! point must have at least the configured free space.

use crate::device::{parse_free_gb, CommandSet};
use crate::remote::{dir_exists, RemoteError, RemoteShell};
use serde::Serialize;
use tracing::{debug, info};

/// Pre-validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PrevalError {
    #[error("remote folder does not exist: {folder}")]
    RemoteFolderMissing { folder: String },

    #[error("unable to determine disk space for {mount}")]
    SpaceUnknown { mount: String },

    #[error("insufficient disk space on {mount}: {available_gb}GB available, {required_gb}GB required")]
    DiskSpace {
        mount: String,
        available_gb: f64,
        required_gb: f64,
    },

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Result of a passing storage check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageReport {
    pub folder: String,
    pub mount: String,
    pub available_gb: f64,
    pub required_gb: f64,
}

/// Mount point of a remote folder: its first path component
///
/// `/shared/images` lives on `/shared`; a bare `/` stays `/`.
pub fn mount_point(folder: &str) -> String {
    let first = folder
        .trim_start_matches('/')
        .split('/')
        .next()
        .unwrap_or_default();
    format!("/{}", first)
}

/// Check the folder exists and has `min_free_gb` available at its mount
pub fn check_remote_storage(
    shell: &mut dyn RemoteShell,
    commands: &CommandSet,
    folder: &str,
    min_free_gb: f64,
) -> Result<StorageReport, PrevalError> {
    let folder = folder.trim_end_matches('/');
    let folder = if folder.is_empty() { "/" } else { folder };

    if !dir_exists(shell, commands, folder)? {
        return Err(PrevalError::RemoteFolderMissing {
            folder: folder.to_string(),
        });
    }

    let mount = mount_point(folder);
    let output = shell.run_command(&commands.free_space(&mount))?;
    debug!(mount = %mount, exit_code = output.exit_code, "free space query");

    let available_gb = if output.success() {
        parse_free_gb(&output.stdout)
    } else {
        None
    }
    .ok_or_else(|| PrevalError::SpaceUnknown {
        mount: mount.clone(),
    })?;

    if available_gb < min_free_gb {
        return Err(PrevalError::DiskSpace {
            mount,
            available_gb,
            required_gb: min_free_gb,
        });
    }

    info!(folder, mount = %mount, available_gb, required_gb = min_free_gb, "remote storage ok");
    Ok(StorageReport {
        folder: folder.to_string(),
        mount,
        available_gb,
        required_gb: min_free_gb,
    })
}
