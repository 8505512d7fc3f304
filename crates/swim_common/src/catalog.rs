//! Software catalog
//!
//! Maps a device model to its target software: version, folders and the
//! installer artifacts. `FileCatalog` reads a software matrix from TOML or
//! JSON (chosen by file extension) and checks every artifact is present on
//! local disk before handing it out.
//!
//! Matrix layout (TOML):
//!
//! ```toml
//! ["BIG-IP Virtual Edition"]
//! target_version = "21.0.0"
//! local_folder = "/project-volume/images/21.0.0/"
//! remote_folder = "/shared/images/"
//!
//! [["BIG-IP Virtual Edition".artifacts]]
//! filename = "BIGIP-21.0.0.iso"
//! local_path = "/project-volume/images/21.0.0/BIGIP-21.0.0.iso"
//! remote_path = "/shared/images/BIGIP-21.0.0.iso"
//! md5 = "f6e7d8c9b0a1234567890123456789ab"
//! ```

use crate::model::{Artifact, ChecksumAlgorithm, SoftwareImage};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Catalog errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("no software defined for model '{0}'")]
    ModelNotFound(String),

    #[error("artifact {filename} missing locally at {path}")]
    ArtifactMissing { filename: String, path: PathBuf },

    #[error("local checksum mismatch for {path}: expected {expected}, got {actual}")]
    LocalChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("cannot read software matrix {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("invalid software matrix {path}: {detail}")]
    Parse { path: PathBuf, detail: String },

    #[error("software matrix unavailable: {0}")]
    Unavailable(String),
}

/// Resolves target software for a device model
pub trait SoftwareCatalog {
    fn lookup(&self, model: &str) -> Result<SoftwareImage, CatalogError>;
}

/// Software matrix loaded from disk
#[derive(Debug, Clone, Default)]
pub struct FileCatalog {
    entries: BTreeMap<String, SoftwareImage>,
    verify_local_checksums: bool,
}

impl FileCatalog {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parse_err = |detail: String| CatalogError::Parse {
            path: path.to_path_buf(),
            detail,
        };

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let entries: BTreeMap<String, SoftwareImage> = if is_json {
            serde_json::from_str(&content).map_err(|e| parse_err(e.to_string()))?
        } else {
            toml::from_str(&content).map_err(|e| parse_err(e.to_string()))?
        };

        info!(path = %path.display(), models = entries.len(), "software matrix loaded");
        Ok(Self::from_entries(entries))
    }

    pub fn from_entries(entries: BTreeMap<String, SoftwareImage>) -> Self {
        Self {
            entries,
            verify_local_checksums: false,
        }
    }

    /// Also hash SHA-256 artifacts on lookup
    pub fn verify_local_checksums(mut self, enabled: bool) -> Self {
        self.verify_local_checksums = enabled;
        self
    }

    /// Known models, sorted
    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entry for a model without checking local files
    pub fn get(&self, model: &str) -> Option<&SoftwareImage> {
        self.entries.get(model)
    }

    fn check_artifact(&self, artifact: &Artifact) -> Result<(), CatalogError> {
        if !artifact.local_path.is_file() {
            return Err(CatalogError::ArtifactMissing {
                filename: artifact.filename.clone(),
                path: artifact.local_path.clone(),
            });
        }

        // No md5 implementation in the dependency set; md5 artifacts are
        // verified on the device after transfer
        if self.verify_local_checksums && artifact.checksum.algorithm() == ChecksumAlgorithm::Sha256
        {
            let actual = sha256_file(&artifact.local_path).map_err(|source| CatalogError::Read {
                path: artifact.local_path.clone(),
                source,
            })?;
            if !artifact.checksum.matches(&actual) {
                return Err(CatalogError::LocalChecksumMismatch {
                    path: artifact.local_path.clone(),
                    expected: artifact.checksum.to_string(),
                    actual,
                });
            }
            debug!(file = %artifact.filename, "local sha256 verified");
        }
        Ok(())
    }
}

impl SoftwareCatalog for FileCatalog {
    fn lookup(&self, model: &str) -> Result<SoftwareImage, CatalogError> {
        let image = self
            .entries
            .get(model)
            .ok_or_else(|| CatalogError::ModelNotFound(model.to_string()))?;

        for artifact in &image.artifacts {
            self.check_artifact(artifact)?;
        }

        info!(
            model,
            target_version = %image.target_version,
            artifacts = image.artifacts.len(),
            "software resolved"
        );
        Ok(image.clone())
    }
}

/// Software matrix as opened for a run
///
/// A matrix that failed to load still answers lookups, with the load error,
/// so the failure is reported like any other unresolved model.
#[derive(Debug)]
pub enum MatrixCatalog {
    Loaded(FileCatalog),
    Failed { reason: String },
}

impl MatrixCatalog {
    pub fn open(path: &Path, verify_local_checksums: bool) -> Self {
        match FileCatalog::load(path) {
            Ok(catalog) => Self::Loaded(catalog.verify_local_checksums(verify_local_checksums)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "software matrix not loaded");
                Self::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

impl SoftwareCatalog for MatrixCatalog {
    fn lookup(&self, model: &str) -> Result<SoftwareImage, CatalogError> {
        match self {
            Self::Loaded(catalog) => catalog.lookup(model),
            Self::Failed { reason } => Err(CatalogError::Unavailable(reason.clone())),
        }
    }
}

/// Lowercase hex SHA-256 of a file, streamed
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
