//! SWIM Configuration
//!
//! Configuration lives in /etc/swim/config.toml (override with `SWIM_CONFIG`
//! or `--config`). Every field has a default, so an empty or missing file is
//! a valid configuration.
//!
//! Secrets are taken from the environment and win over the file:
//! - `SWIMLIB_SSH_USERNAME`, `SWIMLIB_SSH_PASSWORD`
//! - `ASDB_BASE_URL`, `ASDB_TOKEN`, `ASDB_MODE`

use crate::device::{CommandSet, DeviceFamily};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// System configuration directory
pub const SYSTEM_CONFIG_DIR: &str = "/etc/swim";
const CONFIG_FILE: &str = "config.toml";

/// Default software matrix location
pub const DEFAULT_CATALOG_FILE: &str = "/etc/swim/software_matrix.toml";

/// Config errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// SSH settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    /// Login user; the device family default when unset
    pub username: Option<String>,

    /// Password for `sshpass`; never written back to disk
    #[serde(skip_serializing)]
    pub password: Option<String>,

    pub identity_file: Option<PathBuf>,
    pub port: u16,
    pub connect_timeout_secs: u64,
    pub server_alive_interval_secs: u64,
    pub strict_host_key_checking: bool,
    pub known_hosts_file: Option<PathBuf>,

    /// Directory for control-master sockets (system temp dir when unset)
    pub control_dir: Option<PathBuf>,

    pub ssh_program: String,
    pub scp_program: String,
    pub sshpass_program: String,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            identity_file: None,
            port: 22,
            connect_timeout_secs: 30,
            server_alive_interval_secs: 30,
            strict_host_key_checking: false,
            known_hosts_file: None,
            control_dir: None,
            ssh_program: "ssh".to_string(),
            scp_program: "scp".to_string(),
            sshpass_program: "sshpass".to_string(),
        }
    }
}

/// Where tracker calls go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrackerMode {
    /// Real HTTP calls
    #[default]
    Remote,
    /// Log the calls only
    Local,
}

impl TrackerMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "remote" => Some(Self::Remote),
            "local" => Some(Self::Local),
            _ => None,
        }
    }
}

/// Tracking API settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub mode: TrackerMode,
    pub base_url: Option<String>,

    #[serde(skip_serializing)]
    pub token: Option<String>,

    pub timeout_secs: u64,

    /// Skip TLS certificate verification
    pub insecure_tls: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            mode: TrackerMode::Remote,
            base_url: None,
            token: None,
            timeout_secs: 30,
            insecure_tls: false,
        }
    }
}

/// Remote storage requirements
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Minimum free GB at the image folder's mount point (family default when unset)
    pub min_free_gb: Option<f64>,
}

impl StorageConfig {
    pub fn min_free_gb_for(&self, family: DeviceFamily) -> f64 {
        self.min_free_gb
            .unwrap_or_else(|| family.default_min_free_gb())
    }
}

/// Software catalog settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub path: PathBuf,

    /// Hash local SHA-256 artifacts during lookup
    pub verify_local_checksums: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_CATALOG_FILE),
            verify_local_checksums: false,
        }
    }
}

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwimConfig {
    pub ssh: SshConfig,
    pub tracker: TrackerConfig,
    pub storage: StorageConfig,
    pub catalog: CatalogConfig,
    pub commands: CommandSet,
}

impl SwimConfig {
    /// Load from an explicit path; a missing or bad file is an error
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from `path`, else `SWIM_CONFIG`, else the system file
    ///
    /// Only the system file may be absent; it then yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load_from(path);
        }
        if let Ok(env_path) = std::env::var("SWIM_CONFIG") {
            return Self::load_from(Path::new(&env_path));
        }
        let system_path = config_path();
        if system_path.exists() {
            Self::load_from(&system_path)
        } else {
            tracing::debug!(path = %system_path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Overlay secrets and endpoints from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Overlay from an arbitrary lookup; empty values are ignored
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(user) = get("SWIMLIB_SSH_USERNAME") {
            self.ssh.username = Some(user);
        }
        if let Some(password) = get("SWIMLIB_SSH_PASSWORD") {
            self.ssh.password = Some(password);
        }
        if let Some(url) = get("ASDB_BASE_URL") {
            self.tracker.base_url = Some(url);
        }
        if let Some(token) = get("ASDB_TOKEN") {
            self.tracker.token = Some(token);
        }
        if let Some(mode) = get("ASDB_MODE") {
            match TrackerMode::parse(&mode) {
                Some(mode) => self.tracker.mode = mode,
                None => tracing::warn!(mode = %mode, "ignoring unknown ASDB_MODE"),
            }
        }
    }
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    PathBuf::from(SYSTEM_CONFIG_DIR).join(CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = SwimConfig::default();
        assert_eq!(config.ssh.port, 22);
        assert!(config.ssh.username.is_none());
        assert_eq!(config.tracker.mode, TrackerMode::Remote);
        assert!(!config.tracker.insecure_tls);
        assert_eq!(config.catalog.path, PathBuf::from(DEFAULT_CATALOG_FILE));
        assert_eq!(config.commands, CommandSet::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[ssh]
port = 2222
identity_file = "/etc/swim/id_ed25519"

[storage]
min_free_gb = 8.5

[commands]
reboot = "tmsh reboot volume {slot} && exit"
"#,
        )
        .unwrap();

        let config = SwimConfig::load_from(&path).unwrap();
        assert_eq!(config.ssh.port, 2222);
        assert_eq!(config.ssh.connect_timeout_secs, 30);
        assert_eq!(config.storage.min_free_gb_for(DeviceFamily::BigIp), 8.5);
        assert_eq!(config.commands.reboot("HD1.2"), "tmsh reboot volume HD1.2 && exit");
        assert_eq!(config.commands.md5sum, "md5sum {path}");
    }

    #[test]
    fn test_bad_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[ssh\nport = ").unwrap();
        assert!(matches!(
            SwimConfig::load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            SwimConfig::load_from(&dir.path().join("missing.toml")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_env_overlay() {
        let env: HashMap<&str, &str> = [
            ("SWIMLIB_SSH_USERNAME", "ops"),
            ("SWIMLIB_SSH_PASSWORD", "s3cret"),
            ("ASDB_BASE_URL", "https://asdb.example.com/api"),
            ("ASDB_TOKEN", "tok"),
            ("ASDB_MODE", "LOCAL"),
        ]
        .into_iter()
        .collect();

        let mut config = SwimConfig::default();
        config.apply_env_from(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.ssh.username.as_deref(), Some("ops"));
        assert_eq!(config.ssh.password.as_deref(), Some("s3cret"));
        assert_eq!(config.tracker.mode, TrackerMode::Local);
        assert_eq!(config.tracker.token.as_deref(), Some("tok"));
    }

    #[test]
    fn test_secrets_not_serialized() {
        let mut config = SwimConfig::default();
        config.ssh.password = Some("s3cret".to_string());
        config.tracker.token = Some("tok".to_string());
        let out = toml::to_string_pretty(&config).unwrap();
        assert!(!out.contains("s3cret"));
        assert!(!out.contains("tok\""));
        assert!(out.contains("[ssh]"));
    }

    #[test]
    fn test_family_storage_defaults() {
        let storage = StorageConfig::default();
        assert_eq!(storage.min_free_gb_for(DeviceFamily::BigIp), 5.0);
        assert_eq!(storage.min_free_gb_for(DeviceFamily::NetScaler), 3.0);
    }
}
