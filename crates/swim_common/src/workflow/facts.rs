//! Facts discovered while running the phases

use crate::model::DeviceContext;
use crate::preval::StorageReport;
use crate::stage::StageOutcome;
use crate::tracker::{HistoryMetadata, HistoryRecord};
use crate::transfer::TransferReport;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunFacts {
    pub storage: Option<StorageReport>,
    pub transfer: Option<TransferReport>,
    pub stage: Option<StageOutcome>,
    pub current_version: Option<String>,
    pub current_slot: Option<String>,
    pub target_slot: Option<String>,
    pub activated: bool,
}

impl RunFacts {
    pub(crate) fn record_stage(&mut self, outcome: &StageOutcome) {
        match outcome {
            StageOutcome::AlreadyCurrent { version } => {
                self.current_version = Some(version.clone());
            }
            StageOutcome::Installed {
                from_version, slot, ..
            } => {
                self.current_version = Some(from_version.clone());
                self.target_slot = Some(slot.clone());
            }
        }
        self.stage = Some(outcome.clone());
    }

    /// History record for this run; `status` is the upload status string
    pub fn history(&self, ctx: &DeviceContext, status: &str) -> HistoryRecord {
        let target_version = ctx.target_version.clone().unwrap_or_default();
        let image_name = ctx
            .artifacts
            .iter()
            .map(|a| a.filename.as_str())
            .collect::<Vec<_>>()
            .join(",");

        HistoryRecord {
            request_id: ctx.execution_id.clone(),
            device: ctx.device_name.clone(),
            stage: ctx.execution_type.history_stage().to_string(),
            metadata: HistoryMetadata {
                image_name,
                version: target_version.clone(),
                volume: self.target_slot.clone(),
                upload_status: status.to_string(),
                cr_image_copy: ctx.cr_image_copy.clone(),
                source_location: ctx.local_folder.clone(),
                destination_location: ctx.remote_folder.clone(),
                cr_image_stage: ctx.cr_image_stage.clone(),
                current_version: self.current_version.clone(),
                current_volume: self.current_slot.clone(),
                target_version,
                target_volume: self.target_slot.clone(),
                checksum_status: self.transfer.is_some(),
            },
        }
    }
}
