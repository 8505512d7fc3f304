//! Tracking reporter
//!
//! The workflow reports progress to an external tracking service: execution
//! status, log lines, device connectivity and a history record per run.
//! `HttpTracker` talks to the service, `LocalTracker` only logs what it
//! would have sent, `RecordingTracker` keeps every call in memory.

pub mod http;
pub mod local;
pub mod recording;

pub use http::HttpTracker;
pub use local::LocalTracker;
pub use recording::{RecordingTracker, TrackerCall};

use crate::config::{TrackerConfig, TrackerMode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tracker errors; the workflow logs them and carries on
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    #[error("tracker not configured: {0}")]
    NotConfigured(String),

    #[error("tracker request failed: {0}")]
    Http(String),

    #[error("tracker returned {status} for {method} {url}: {body}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: String,
    },
}

/// Execution log status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    InProgress,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "inprogress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// Device connectivity classification shown by the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityStatus {
    Pass,
    Fail,
    FailAuth,
    ImageMissing,
    DiskFull,
}

impl ConnectivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::FailAuth => "fail_auth",
            Self::ImageMissing => "image_missing",
            Self::DiskFull => "disk_full",
        }
    }
}

impl fmt::Display for ConnectivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata block of a device history record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMetadata {
    pub image_name: String,
    pub version: String,
    /// Slot the run targeted, when one was determined
    pub volume: Option<String>,
    pub upload_status: String,
    pub cr_image_copy: Option<String>,
    pub source_location: Option<String>,
    pub destination_location: Option<String>,
    pub cr_image_stage: Option<String>,
    pub current_version: Option<String>,
    pub current_volume: Option<String>,
    pub target_version: String,
    pub target_volume: Option<String>,
    /// Every transferred or skipped artifact matched its checksum
    pub checksum_status: bool,
}

/// One device history record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    #[serde(rename = "request_id_input")]
    pub request_id: Option<String>,
    #[serde(rename = "device_input")]
    pub device: Option<String>,
    pub stage: String,
    pub metadata: HistoryMetadata,
}

/// Tracking service calls made by the workflow
pub trait TrackingReporter {
    fn report_status(
        &self,
        execution_log_id: &str,
        status: ExecutionStatus,
    ) -> Result<(), TrackerError>;

    fn append_log(
        &self,
        execution_log_id: &str,
        message: &str,
        level: LogLevel,
    ) -> Result<(), TrackerError>;

    fn report_device_connectivity(
        &self,
        device_name: &str,
        status: ConnectivityStatus,
    ) -> Result<(), TrackerError>;

    fn report_history(&self, record: &HistoryRecord) -> Result<(), TrackerError>;
}

/// Build the reporter selected by `mode`
pub fn from_config(config: &TrackerConfig) -> Result<Box<dyn TrackingReporter>, TrackerError> {
    match config.mode {
        TrackerMode::Local => Ok(Box::new(LocalTracker::new())),
        TrackerMode::Remote => Ok(Box::new(HttpTracker::new(config)?)),
    }
}

/// Timestamp format of tracker log lines
pub(crate) fn log_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        assert_eq!(
            serde_json::to_value(ConnectivityStatus::FailAuth).unwrap(),
            "fail_auth"
        );
        assert_eq!(
            serde_json::to_value(ConnectivityStatus::DiskFull).unwrap(),
            "disk_full"
        );
        assert_eq!(
            serde_json::to_value(ExecutionStatus::InProgress).unwrap(),
            "inprogress"
        );
        assert_eq!(ExecutionStatus::InProgress.to_string(), "inprogress");
        assert_eq!(LogLevel::Warning.as_str(), "warning");
    }

    #[test]
    fn test_history_record_payload_fields() {
        let record = HistoryRecord {
            request_id: Some("exec-789".to_string()),
            device: Some("lb-edge-01".to_string()),
            stage: "image_stage".to_string(),
            metadata: HistoryMetadata {
                image_name: "BIGIP-21.0.0.iso".to_string(),
                version: "21.0.0".to_string(),
                upload_status: "completed".to_string(),
                target_version: "21.0.0".to_string(),
                checksum_status: true,
                ..Default::default()
            },
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["request_id_input"], "exec-789");
        assert_eq!(json["device_input"], "lb-edge-01");
        assert_eq!(json["stage"], "image_stage");
        assert_eq!(json["metadata"]["checksum_status"], true);
        assert!(json["metadata"]["current_volume"].is_null());
    }

    #[test]
    fn test_from_config_local_needs_nothing() {
        let config = TrackerConfig {
            mode: TrackerMode::Local,
            ..TrackerConfig::default()
        };
        assert!(from_config(&config).is_ok());
    }

    #[test]
    fn test_from_config_remote_needs_url() {
        assert!(matches!(
            from_config(&TrackerConfig::default()),
            Err(TrackerError::NotConfigured(_))
        ));
    }
}
