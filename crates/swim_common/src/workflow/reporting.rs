//! Tracker calls made by the workflow
//!
//! Missing identifiers skip the call; tracker errors are logged at warn and
//! dropped.

use crate::model::DeviceContext;
use crate::tracker::{
    ConnectivityStatus, ExecutionStatus, HistoryRecord, LogLevel, TrackerError, TrackingReporter,
};
use tracing::{debug, warn};

pub(crate) struct Reporter<'a> {
    tracker: &'a dyn TrackingReporter,
    execution_log_id: Option<String>,
    device_name: Option<String>,
}

impl<'a> Reporter<'a> {
    pub fn new(tracker: &'a dyn TrackingReporter, ctx: &DeviceContext) -> Self {
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());
        Self {
            tracker,
            execution_log_id: non_empty(&ctx.execution_log_id),
            device_name: non_empty(&ctx.device_name),
        }
    }

    pub fn status(&self, status: ExecutionStatus) {
        match &self.execution_log_id {
            Some(id) => swallow("report_status", self.tracker.report_status(id, status)),
            None => debug!(status = %status, "no execution_log_id, status not reported"),
        }
    }

    pub fn log(&self, message: &str, level: LogLevel) {
        match &self.execution_log_id {
            Some(id) => swallow("append_log", self.tracker.append_log(id, message, level)),
            None => debug!(message, "no execution_log_id, log not sent"),
        }
    }

    pub fn connectivity(&self, status: ConnectivityStatus) {
        match &self.device_name {
            Some(name) => swallow(
                "report_device_connectivity",
                self.tracker.report_device_connectivity(name, status),
            ),
            None => debug!(conn_status = %status, "no device_name, connectivity not reported"),
        }
    }

    pub fn history(&self, record: &HistoryRecord) {
        swallow("report_history", self.tracker.report_history(record));
    }
}

fn swallow(call: &str, result: Result<(), TrackerError>) {
    if let Err(e) = result {
        warn!(call, error = %e, "tracker call failed, continuing");
    }
}
