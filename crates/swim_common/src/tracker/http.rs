//! HTTP tracker client (blocking)

use super::{
    log_timestamp, ConnectivityStatus, ExecutionStatus, HistoryRecord, LogLevel, TrackerError,
    TrackingReporter,
};
use crate::config::TrackerConfig;
use reqwest::blocking::Client;
use reqwest::Method;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

pub struct HttpTracker {
    base_url: String,
    token: String,
    client: Client,
}

impl HttpTracker {
    /// Requires a base URL; a missing token is sent empty and left to the server to reject
    pub fn new(config: &TrackerConfig) -> Result<Self, TrackerError> {
        let base_url = config
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| TrackerError::NotConfigured("ASDB_BASE_URL is not set".to_string()))?
            .trim_end_matches('/')
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.insecure_tls)
            .build()
            .map_err(|e| TrackerError::Http(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            token: config.token.clone().unwrap_or_default(),
            client,
        })
    }

    pub fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    fn send<T: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        payload: &T,
    ) -> Result<(), TrackerError> {
        let url = self.url(endpoint);
        debug!(method = %method, url = %url, "tracker request");

        let response = self
            .client
            .request(method.clone(), &url)
            .header("Authorization", format!("Token {}", self.token))
            .header("Accept", "application/json")
            .json(payload)
            .send()
            .map_err(|e| TrackerError::Http(format!("{} {}: {}", method, url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(TrackerError::Status {
                method: method.to_string(),
                url,
                status: status.as_u16(),
                body: body.chars().take(512).collect(),
            });
        }
        Ok(())
    }
}

impl TrackingReporter for HttpTracker {
    fn report_status(
        &self,
        execution_log_id: &str,
        status: ExecutionStatus,
    ) -> Result<(), TrackerError> {
        self.send(
            Method::PATCH,
            &format!("swimv2/execution_log/{}/", execution_log_id),
            &json!({ "execution_status": status }),
        )
    }

    fn append_log(
        &self,
        execution_log_id: &str,
        message: &str,
        level: LogLevel,
    ) -> Result<(), TrackerError> {
        self.send(
            Method::POST,
            &format!("swimv2/execution_log/{}/append_log/", execution_log_id),
            &json!([{
                "time": log_timestamp(),
                "message": message,
                "log_level": level,
            }]),
        )
    }

    fn report_device_connectivity(
        &self,
        device_name: &str,
        status: ConnectivityStatus,
    ) -> Result<(), TrackerError> {
        self.send(
            Method::PATCH,
            &format!("swimv2/devices/{}/", device_name),
            &json!({ "conn_status": status }),
        )
    }

    fn report_history(&self, record: &HistoryRecord) -> Result<(), TrackerError> {
        self.send(Method::POST, "swimv2/device_history/", record)
    }
}
