//! Error types for SWIM.
//!
//! Each phase has its own error enum; `SwimError` gathers them so the
//! workflow can classify any phase failure for the tracker.

use crate::activate::ActivationError;
use crate::catalog::CatalogError;
use crate::preval::PrevalError;
use crate::remote::RemoteError;
use crate::stage::StagingError;
use crate::tracker::ConnectivityStatus;
use crate::transfer::TransferError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SwimError {
    #[error("Software lookup failed: {0}")]
    Catalog(#[from] CatalogError),

    #[error("SSH connection failed: {0}")]
    Connect(#[from] RemoteError),

    #[error("Remote storage validation failed: {0}")]
    Storage(#[from] PrevalError),

    #[error("Image copy failed: {0}")]
    Transfer(#[from] TransferError),

    #[error("Image staging failed: {0}")]
    Staging(#[from] StagingError),

    #[error("Image upgrade failed: {0}")]
    Activation(#[from] ActivationError),
}

impl SwimError {
    /// Terminal classification reported to the tracker
    pub fn class(&self) -> FailureClass {
        match self {
            SwimError::Catalog(_) => FailureClass::ImageMissing,
            SwimError::Connect(e) if e.is_auth() => FailureClass::FailAuth,
            SwimError::Connect(_) => FailureClass::Fail,
            SwimError::Storage(_) => FailureClass::DiskFull,
            SwimError::Transfer(_) | SwimError::Staging(_) | SwimError::Activation(_) => {
                FailureClass::Fail
            }
        }
    }
}

/// Failure classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    Fail,
    FailAuth,
    ImageMissing,
    DiskFull,
}

impl FailureClass {
    pub fn connectivity(&self) -> ConnectivityStatus {
        match self {
            FailureClass::Fail => ConnectivityStatus::Fail,
            FailureClass::FailAuth => ConnectivityStatus::FailAuth,
            FailureClass::ImageMissing => ConnectivityStatus::ImageMissing,
            FailureClass::DiskFull => ConnectivityStatus::DiskFull,
        }
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.connectivity().as_str())
    }
}
