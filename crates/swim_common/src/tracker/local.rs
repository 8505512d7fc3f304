//! Log-only tracker for local runs

use super::{
    log_timestamp, ConnectivityStatus, ExecutionStatus, HistoryRecord, LogLevel, TrackerError,
    TrackingReporter,
};
use tracing::info;

#[derive(Debug, Default)]
pub struct LocalTracker;

impl LocalTracker {
    pub fn new() -> Self {
        Self
    }
}

impl TrackingReporter for LocalTracker {
    fn report_status(
        &self,
        execution_log_id: &str,
        status: ExecutionStatus,
    ) -> Result<(), TrackerError> {
        info!(execution_log_id, status = %status, "[tracker local] execution status");
        Ok(())
    }

    fn append_log(
        &self,
        execution_log_id: &str,
        message: &str,
        level: LogLevel,
    ) -> Result<(), TrackerError> {
        info!(
            execution_log_id,
            time = %log_timestamp(),
            level = level.as_str(),
            message,
            "[tracker local] append log"
        );
        Ok(())
    }

    fn report_device_connectivity(
        &self,
        device_name: &str,
        status: ConnectivityStatus,
    ) -> Result<(), TrackerError> {
        info!(device = device_name, conn_status = %status, "[tracker local] device connectivity");
        Ok(())
    }

    fn report_history(&self, record: &HistoryRecord) -> Result<(), TrackerError> {
        let payload = serde_json::to_string(record).unwrap_or_default();
        info!(payload = %payload, "[tracker local] device history");
        Ok(())
    }
}
