//! In-memory tracker that records every call

use super::{
    ConnectivityStatus, ExecutionStatus, HistoryRecord, LogLevel, TrackerError, TrackingReporter,
};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerCall {
    Status {
        execution_log_id: String,
        status: ExecutionStatus,
    },
    Log {
        execution_log_id: String,
        message: String,
        level: LogLevel,
    },
    Connectivity {
        device: String,
        status: ConnectivityStatus,
    },
    History(HistoryRecord),
}

/// Records calls; optionally fails each one after recording it
#[derive(Debug, Default)]
pub struct RecordingTracker {
    calls: Mutex<Vec<TrackerCall>>,
    fail_with: Option<TrackerError>,
}

impl RecordingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call is recorded, then fails with `error`
    pub fn failing(error: TrackerError) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_with: Some(error),
        }
    }

    pub fn calls(&self) -> Vec<TrackerCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn statuses(&self) -> Vec<ExecutionStatus> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                TrackerCall::Status { status, .. } => Some(status),
                _ => None,
            })
            .collect()
    }

    pub fn connectivity(&self) -> Vec<ConnectivityStatus> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                TrackerCall::Connectivity { status, .. } => Some(status),
                _ => None,
            })
            .collect()
    }

    pub fn histories(&self) -> Vec<HistoryRecord> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                TrackerCall::History(record) => Some(record),
                _ => None,
            })
            .collect()
    }

    pub fn logs(&self) -> Vec<(LogLevel, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                TrackerCall::Log { level, message, .. } => Some((level, message)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: TrackerCall) -> Result<(), TrackerError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        match &self.fail_with {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl TrackingReporter for RecordingTracker {
    fn report_status(
        &self,
        execution_log_id: &str,
        status: ExecutionStatus,
    ) -> Result<(), TrackerError> {
        self.record(TrackerCall::Status {
            execution_log_id: execution_log_id.to_string(),
            status,
        })
    }

    fn append_log(
        &self,
        execution_log_id: &str,
        message: &str,
        level: LogLevel,
    ) -> Result<(), TrackerError> {
        self.record(TrackerCall::Log {
            execution_log_id: execution_log_id.to_string(),
            message: message.to_string(),
            level,
        })
    }

    fn report_device_connectivity(
        &self,
        device_name: &str,
        status: ConnectivityStatus,
    ) -> Result<(), TrackerError> {
        self.record(TrackerCall::Connectivity {
            device: device_name.to_string(),
            status,
        })
    }

    fn report_history(&self, record: &HistoryRecord) -> Result<(), TrackerError> {
        self.record(TrackerCall::History(record.clone()))
    }
}
