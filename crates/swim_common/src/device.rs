//! Device command surface
//!
//! Command templates per device family, plus parsers for their output.
//! Templates use `{path}`, `{file}`, `{slot}` and `{mount}` placeholders.
//! Defaults target BIG-IP (tmsh); every template can be overridden from
//! the `[commands]` config section.

use crate::model::ChecksumAlgorithm;
use serde::{Deserialize, Serialize};

/// Appliance family, inferred from the model string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceFamily {
    BigIp,
    NetScaler,
}

impl DeviceFamily {
    pub fn from_model(model: &str) -> Self {
        let lower = model.to_ascii_lowercase();
        if lower.contains("netscaler") || lower.contains("citrix adc") {
            Self::NetScaler
        } else {
            Self::BigIp
        }
    }

    pub fn default_username(&self) -> &'static str {
        match self {
            Self::BigIp => "admin",
            Self::NetScaler => "nsroot",
        }
    }

    pub fn default_remote_folder(&self) -> &'static str {
        match self {
            Self::BigIp => "/shared/images",
            Self::NetScaler => "/var/nsinstall",
        }
    }

    /// Minimum free space (GB) required at the remote image folder
    pub fn default_min_free_gb(&self) -> f64 {
        match self {
            Self::BigIp => 5.0,
            Self::NetScaler => 3.0,
        }
    }
}

/// Remote command templates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandSet {
    /// Exit 0 when the path exists
    pub path_exists: String,
    /// Exit 0 when the path is a directory
    pub dir_exists: String,
    pub md5sum: String,
    pub sha256sum: String,
    /// Free space report at a mount point, `df -BG` layout
    pub free_space: String,
    /// Running software version
    pub current_version: String,
    /// Boot slots with their active marking
    pub list_slots: String,
    /// Prefix identifying slot rows in `list_slots` output
    pub slot_prefix: String,
    pub install: String,
    pub reboot: String,
}

impl Default for CommandSet {
    fn default() -> Self {
        Self {
            path_exists: "test -e {path}".to_string(),
            dir_exists: "test -d {path}".to_string(),
            md5sum: "md5sum {path}".to_string(),
            sha256sum: "sha256sum {path}".to_string(),
            free_space: "df -BG {mount}".to_string(),
            current_version: "tmsh show sys version".to_string(),
            list_slots: "tmsh show sys software status".to_string(),
            slot_prefix: "HD".to_string(),
            install: "tmsh install sys software image {path} volume {slot}".to_string(),
            reboot: "tmsh reboot volume {slot}".to_string(),
        }
    }
}

impl CommandSet {
    pub fn path_exists(&self, path: &str) -> String {
        render(&self.path_exists, &[("path", path)])
    }

    pub fn dir_exists(&self, path: &str) -> String {
        render(&self.dir_exists, &[("path", path)])
    }

    pub fn checksum(&self, algorithm: ChecksumAlgorithm, path: &str) -> String {
        let template = match algorithm {
            ChecksumAlgorithm::Md5 => &self.md5sum,
            ChecksumAlgorithm::Sha256 => &self.sha256sum,
        };
        render(template, &[("path", path)])
    }

    pub fn free_space(&self, mount: &str) -> String {
        render(&self.free_space, &[("mount", mount)])
    }

    pub fn install(&self, remote_path: &str, slot: &str) -> String {
        let file = remote_path.rsplit('/').next().unwrap_or(remote_path);
        render(
            &self.install,
            &[("path", remote_path), ("file", file), ("slot", slot)],
        )
    }

    pub fn reboot(&self, slot: &str) -> String {
        render(&self.reboot, &[("slot", slot)])
    }
}

fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{}}}", key), &shell_quote(value))
    })
}

/// Quote a value for a POSIX shell unless it is plainly safe
pub fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+:=@,".contains(c));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

/// First whitespace-delimited token of `md5sum`/`sha256sum` output
pub fn parse_checksum_output(stdout: &str) -> Option<String> {
    stdout
        .split_whitespace()
        .next()
        .filter(|t| t.chars().all(|c| c.is_ascii_hexdigit()))
        .map(|t| t.to_ascii_lowercase())
}

/// Running version from `tmsh show sys version` style output
///
/// Takes the value of a `Version` row; output that is a single bare token
/// is taken as the version itself.
pub fn parse_version(stdout: &str) -> Option<String> {
    let all: Vec<&str> = stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    for line in &all {
        let mut parts = line.split_whitespace();
        if parts.next() == Some("Version") {
            if let Some(value) = parts.next() {
                return Some(value.to_string());
            }
        }
    }

    match all.as_slice() {
        [single] if single.split_whitespace().count() == 1 => Some(single.to_string()),
        _ => None,
    }
}

/// Free space in GB from `df -BG` output
///
/// Uses the last row; a wrapped row (long filesystem name on its own line)
/// has one column fewer.
pub fn parse_free_gb(stdout: &str) -> Option<f64> {
    let row = stdout.lines().rev().find(|l| !l.trim().is_empty())?;
    let cols: Vec<&str> = row.split_whitespace().collect();
    let avail = match cols.len() {
        n if n >= 6 => cols[3],
        5 => cols[2],
        1 => cols[0],
        _ => return None,
    };
    avail.trim_end_matches(['G', 'g']).parse::<f64>().ok()
}

/// One row of the slot listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub name: String,
    pub active: bool,
}

/// Boot slots reported by the device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SlotTable {
    pub slots: Vec<Slot>,
}

impl SlotTable {
    /// Parse rows starting with `prefix`; a row is active when any column reads `yes`
    pub fn parse(stdout: &str, prefix: &str) -> Self {
        let slots = stdout
            .lines()
            .filter_map(|line| {
                let cols: Vec<&str> = line.split_whitespace().collect();
                let name = cols.first()?;
                if !name.starts_with(prefix) {
                    return None;
                }
                let active = cols[1..].iter().any(|c| c.eq_ignore_ascii_case("yes"));
                Some(Slot {
                    name: name.to_string(),
                    active,
                })
            })
            .collect();
        Self { slots }
    }

    pub fn active(&self) -> Option<&str> {
        self.slots
            .iter()
            .find(|s| s.active)
            .map(|s| s.name.as_str())
    }

    /// First slot not marked active
    pub fn inactive(&self) -> Option<&str> {
        self.slots
            .iter()
            .find(|s| !s.active)
            .map(|s| s.name.as_str())
    }
}
