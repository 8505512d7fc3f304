//! Device, artifact and execution-depth model
//!
//! A `DeviceContext` is built once per run from the external device record,
//! enriched in place by pre-validation, then read by every later phase.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

/// Digest algorithm, derived from the digest length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    Md5,
    Sha256,
}

impl ChecksumAlgorithm {
    /// Number of hex characters in a digest of this algorithm
    pub fn hex_len(&self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha256 => 64,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha256 => "sha256",
        }
    }

    fn from_hex_len(len: usize) -> Option<Self> {
        match len {
            32 => Some(Self::Md5),
            64 => Some(Self::Sha256),
            _ => None,
        }
    }
}

/// Errors from parsing a checksum
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChecksumError {
    #[error("checksum must be 32 (md5) or 64 (sha256) hex chars, got {0} chars")]
    BadLength(usize),

    #[error("checksum contains non-hex characters: {0}")]
    NotHex(String),
}

/// Strong checksum: lowercase hex digest of a known algorithm
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Checksum {
    algorithm: ChecksumAlgorithm,
    hex: String,
}

impl Checksum {
    /// Parse a hex digest; the algorithm follows from its length
    pub fn parse(digest: &str) -> Result<Self, ChecksumError> {
        let hex = digest.trim().to_ascii_lowercase();
        let algorithm =
            ChecksumAlgorithm::from_hex_len(hex.len()).ok_or(ChecksumError::BadLength(hex.len()))?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ChecksumError::NotHex(hex));
        }
        Ok(Self { algorithm, hex })
    }

    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    pub fn as_hex(&self) -> &str {
        &self.hex
    }

    /// Compare against a digest as printed by a remote tool
    pub fn matches(&self, other: &str) -> bool {
        self.hex.eq_ignore_ascii_case(other.trim())
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hex)
    }
}

impl Serialize for Checksum {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.hex)
    }
}

impl<'de> Deserialize<'de> for Checksum {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Checksum::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Installer artifact descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub filename: String,
    pub local_path: PathBuf,
    pub remote_path: String,
    /// Expected digest; accepted under `checksum`, `md5` or `sha256`
    #[serde(alias = "md5", alias = "sha256")]
    pub checksum: Checksum,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

/// Requested extent of the workflow
///
/// Ordered: each depth runs every phase of the shallower ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ExecutionDepth {
    #[default]
    DryRun,
    Copy,
    Stage,
    Upgrade,
}

/// Action phases gated by depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionPhase {
    Transfer,
    Staging,
    Activation,
}

impl ExecutionDepth {
    /// Parse a depth name; unknown values fall back to `DryRun`
    pub fn parse_lenient(raw: &str) -> Self {
        match Self::parse_strict(raw) {
            Some(depth) => depth,
            None => {
                tracing::warn!(
                    execution_type = raw,
                    "unknown execution type, treating as dry_run"
                );
                Self::DryRun
            }
        }
    }

    pub fn parse_strict(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dry_run" | "dryrun" | "dry-run" => Some(Self::DryRun),
            "copy" | "image_copy" => Some(Self::Copy),
            "stage" | "image_stage" => Some(Self::Stage),
            "upgrade" | "image_upgrade" => Some(Self::Upgrade),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DryRun => "dry_run",
            Self::Copy => "copy",
            Self::Stage => "stage",
            Self::Upgrade => "upgrade",
        }
    }

    /// Stage name used in tracker history records
    pub fn history_stage(&self) -> &'static str {
        match self {
            Self::DryRun => "dry_run",
            Self::Copy => "image_copy",
            Self::Stage => "image_stage",
            Self::Upgrade => "image_upgrade",
        }
    }

    /// Whether this depth runs the given phase
    pub fn includes(&self, phase: ActionPhase) -> bool {
        match phase {
            ActionPhase::Transfer => *self >= Self::Copy,
            ActionPhase::Staging => *self >= Self::Stage,
            ActionPhase::Activation => *self >= Self::Upgrade,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        *self == Self::DryRun
    }
}

impl fmt::Display for ExecutionDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ExecutionDepth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ExecutionDepth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw
            .as_deref()
            .map(Self::parse_lenient)
            .unwrap_or_default())
    }
}

/// Target software for one device model, as resolved by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftwareImage {
    pub target_version: String,
    pub local_folder: String,
    pub remote_folder: String,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}

/// Per-run device record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceContext {
    #[serde(default)]
    pub device_name: Option<String>,
    pub device_address: String,
    #[serde(default)]
    pub device_type_model: String,
    #[serde(default)]
    pub execution_type: ExecutionDepth,
    #[serde(default)]
    pub target_version: Option<String>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub local_folder: Option<String>,
    #[serde(default)]
    pub remote_folder: Option<String>,
    /// Tracker request identifier, used for history records
    #[serde(default)]
    pub execution_id: Option<String>,
    /// Tracker execution log identifier, used for status and log lines
    #[serde(default)]
    pub execution_log_id: Option<String>,
    /// Change request reference for the copy step
    #[serde(default)]
    pub cr_image_copy: Option<String>,
    /// Change request reference for the stage step
    #[serde(default)]
    pub cr_image_stage: Option<String>,
}

impl DeviceContext {
    /// Parse a device record from JSON
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Merge the resolved catalog entry into this context
    pub fn apply_software(&mut self, image: SoftwareImage) {
        self.target_version = Some(image.target_version);
        self.local_folder = Some(image.local_folder);
        self.remote_folder = Some(image.remote_folder);
        self.artifacts = image.artifacts;
    }

    /// Name used in logs: device name when known, else the address
    pub fn label(&self) -> &str {
        self.device_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.device_address)
    }

    pub fn family(&self) -> crate::device::DeviceFamily {
        crate::device::DeviceFamily::from_model(&self.device_type_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MD5: &str = "a1b2c3d4e5f678901234567890123456";

    #[test]
    fn test_checksum_algorithm_from_length() {
        assert_eq!(
            Checksum::parse(MD5).unwrap().algorithm(),
            ChecksumAlgorithm::Md5
        );
        let sha = "ab".repeat(32);
        assert_eq!(
            Checksum::parse(&sha).unwrap().algorithm(),
            ChecksumAlgorithm::Sha256
        );
    }

    #[test]
    fn test_checksum_rejects_bad_input() {
        assert_eq!(Checksum::parse("abc123"), Err(ChecksumError::BadLength(6)));
        let not_hex = "z".repeat(32);
        assert!(matches!(
            Checksum::parse(&not_hex),
            Err(ChecksumError::NotHex(_))
        ));
    }

    #[test]
    fn test_checksums_key_a_set() {
        use std::collections::HashSet;
        let digests = vec![MD5.to_string(), MD5.to_uppercase(), "ab".repeat(32)];
        let set: HashSet<Checksum> = digests
            .iter()
            .map(|d| Checksum::parse(d).unwrap())
            .collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_checksum_is_case_insensitive() {
        let sum = Checksum::parse(&MD5.to_uppercase()).unwrap();
        assert_eq!(sum.as_hex(), MD5);
        assert!(sum.matches(&format!("{}\n", MD5.to_uppercase())));
    }

    #[test]
    fn test_depth_ordering_is_superset() {
        use ActionPhase::*;
        let dry = ExecutionDepth::DryRun;
        assert!(!dry.includes(Transfer));

        let copy = ExecutionDepth::Copy;
        assert!(copy.includes(Transfer));
        assert!(!copy.includes(Staging));

        let stage = ExecutionDepth::Stage;
        assert!(stage.includes(Transfer) && stage.includes(Staging));
        assert!(!stage.includes(Activation));

        let upgrade = ExecutionDepth::Upgrade;
        assert!(upgrade.includes(Transfer) && upgrade.includes(Staging));
        assert!(upgrade.includes(Activation));
    }

    #[test]
    fn test_depth_parsing_aliases_and_fallback() {
        assert_eq!(ExecutionDepth::parse_lenient("image_stage"), ExecutionDepth::Stage);
        assert_eq!(ExecutionDepth::parse_lenient("UPGRADE"), ExecutionDepth::Upgrade);
        assert_eq!(ExecutionDepth::parse_lenient("reboot_now"), ExecutionDepth::DryRun);
        assert_eq!(ExecutionDepth::parse_lenient(""), ExecutionDepth::DryRun);
        assert_eq!(ExecutionDepth::Stage.history_stage(), "image_stage");
        assert_eq!(ExecutionDepth::Stage.to_string(), "stage");
    }

    #[test]
    fn test_device_context_from_json() {
        let raw = r#"{
            "device_name": "lb-edge-01",
            "device_address": "10.0.0.5",
            "device_type_model": "BIG-IP Virtual Edition",
            "execution_type": "image_copy",
            "execution_log_id": "log-456"
        }"#;
        let ctx = DeviceContext::from_json(raw).unwrap();
        assert_eq!(ctx.execution_type, ExecutionDepth::Copy);
        assert_eq!(ctx.label(), "lb-edge-01");
        assert!(ctx.artifacts.is_empty());
        assert!(ctx.target_version.is_none());
    }

    #[test]
    fn test_device_context_missing_depth_is_dry_run() {
        let ctx = DeviceContext::from_json(r#"{"device_address": "10.0.0.5"}"#).unwrap();
        assert_eq!(ctx.execution_type, ExecutionDepth::DryRun);
        assert_eq!(ctx.label(), "10.0.0.5");
    }

    #[test]
    fn test_artifact_accepts_md5_alias() {
        let raw = format!(
            r#"{{"filename": "a.iso", "local_path": "/img/a.iso",
                "remote_path": "/shared/images/a.iso", "md5": "{}"}}"#,
            MD5
        );
        let artifact: Artifact = serde_json::from_str(&raw).unwrap();
        assert_eq!(artifact.checksum.algorithm(), ChecksumAlgorithm::Md5);
        assert!(artifact.download_url.is_none());
    }

    #[test]
    fn test_apply_software_enriches_context() {
        let mut ctx = DeviceContext {
            device_address: "10.0.0.5".to_string(),
            ..Default::default()
        };
        ctx.apply_software(SoftwareImage {
            target_version: "21.0.0".to_string(),
            local_folder: "/images/21.0.0/".to_string(),
            remote_folder: "/shared/images/".to_string(),
            artifacts: vec![],
        });
        assert_eq!(ctx.target_version.as_deref(), Some("21.0.0"));
        assert_eq!(ctx.remote_folder.as_deref(), Some("/shared/images/"));
    }
}
