//! Workflow orchestrator

use super::reporting::Reporter;
use super::{Phase, RunFacts, WorkflowOutcome, WorkflowReport, WorkflowState};
use crate::activate::{activate, ActivationError};
use crate::catalog::SoftwareCatalog;
use crate::config::{StorageConfig, SwimConfig};
use crate::device::CommandSet;
use crate::error::SwimError;
use crate::model::{ActionPhase, DeviceContext};
use crate::preval::check_remote_storage;
use crate::remote::{Connector, RemoteShell};
use crate::stage::{read_slots, stage, StageOutcome, StagingError};
use crate::tracker::{ConnectivityStatus, ExecutionStatus, LogLevel, TrackingReporter};
use crate::transfer::transfer;
use tracing::{error, info, warn};

/// Device-side settings for a run
#[derive(Debug, Clone, Default)]
pub struct WorkflowSettings {
    pub commands: CommandSet,
    pub storage: StorageConfig,
}

impl From<&SwimConfig> for WorkflowSettings {
    fn from(config: &SwimConfig) -> Self {
        Self {
            commands: config.commands.clone(),
            storage: config.storage.clone(),
        }
    }
}

/// Drives one device through the upgrade phases
pub struct Orchestrator<'a> {
    catalog: &'a dyn SoftwareCatalog,
    connector: &'a dyn Connector,
    tracker: &'a dyn TrackingReporter,
    settings: WorkflowSettings,
}

/// Session lent to one phase at a time; closed when the run ends
struct Session(Box<dyn RemoteShell>);

impl Session {
    fn shell(&mut self) -> &mut dyn RemoteShell {
        self.0.as_mut()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.0.close();
    }
}

struct PhaseFailure {
    phase: Phase,
    error: SwimError,
}

fn failed_in<E: Into<SwimError>>(phase: Phase) -> impl FnOnce(E) -> PhaseFailure {
    move |e| PhaseFailure {
        phase,
        error: e.into(),
    }
}

/// Per-run bookkeeping
struct Run {
    trace: Vec<WorkflowState>,
    facts: RunFacts,
}

impl Run {
    fn enter(&mut self, state: WorkflowState) {
        info!(state = %state, "workflow transition");
        self.trace.push(state);
    }
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        catalog: &'a dyn SoftwareCatalog,
        connector: &'a dyn Connector,
        tracker: &'a dyn TrackingReporter,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            catalog,
            connector,
            tracker,
            settings,
        }
    }

    /// Run the workflow for one device up to its requested depth
    pub fn run(&self, ctx: &mut DeviceContext) -> WorkflowReport {
        let depth = ctx.execution_type;
        let mut run = Run {
            trace: vec![WorkflowState::Init],
            facts: RunFacts::default(),
        };

        info!(
            device = ctx.label(),
            address = %ctx.device_address,
            model = %ctx.device_type_model,
            depth = %depth,
            "workflow started"
        );
        let reporter = Reporter::new(self.tracker, ctx);
        reporter.status(ExecutionStatus::InProgress);

        let result = self.execute(ctx, &reporter, &mut run);

        let outcome = match result {
            Ok(()) => {
                run.enter(WorkflowState::Done);
                let summary = self.summary(ctx, &run.facts);
                info!(device = ctx.label(), "{}", summary);
                reporter.log(&summary, LogLevel::Info);
                reporter.status(ExecutionStatus::Completed);
                if !depth.is_dry_run() {
                    reporter.history(&run.facts.history(ctx, ExecutionStatus::Completed.as_str()));
                }
                WorkflowOutcome::Done
            }
            Err(PhaseFailure { phase, error }) => {
                let class = error.class();
                let reason = format!("error: {}", error);
                run.enter(WorkflowState::Failed {
                    phase,
                    class,
                    reason: reason.clone(),
                });
                error!(device = ctx.label(), phase = %phase, class = %class, "{}", reason);

                reporter.connectivity(class.connectivity());
                reporter.log(&reason, LogLevel::Error);
                if depth.is_dry_run() {
                    reporter.status(ExecutionStatus::Completed);
                } else {
                    reporter.status(ExecutionStatus::Failed);
                    reporter.history(&run.facts.history(ctx, ExecutionStatus::Failed.as_str()));
                }
                WorkflowOutcome::Failed {
                    phase,
                    class,
                    reason,
                }
            }
        };

        WorkflowReport {
            depth,
            outcome,
            trace: run.trace,
            facts: run.facts,
        }
    }

    fn execute(
        &self,
        ctx: &mut DeviceContext,
        reporter: &Reporter<'_>,
        run: &mut Run,
    ) -> Result<(), PhaseFailure> {
        let commands = &self.settings.commands;
        let depth = ctx.execution_type;
        let family = ctx.family();

        // Init -> PreValidated
        let image = self
            .catalog
            .lookup(&ctx.device_type_model)
            .map_err(failed_in(Phase::PreValidation))?;
        ctx.apply_software(image);

        let mut session = Session(
            self.connector
                .connect(&ctx.device_address, family)
                .map_err(failed_in(Phase::PreValidation))?,
        );

        let folder = ctx
            .remote_folder
            .clone()
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| family.default_remote_folder().to_string());
        let storage = check_remote_storage(
            session.shell(),
            commands,
            &folder,
            self.settings.storage.min_free_gb_for(family),
        )
        .map_err(failed_in(Phase::PreValidation))?;
        run.facts.storage = Some(storage);

        reporter.connectivity(ConnectivityStatus::Pass);
        run.enter(WorkflowState::PreValidated);

        if !depth.includes(ActionPhase::Transfer) {
            info!(device = ctx.label(), "dry run, stopping after validation");
            return Ok(());
        }

        // PreValidated -> Copied
        let report =
            transfer(session.shell(), commands, &ctx.artifacts).map_err(failed_in(Phase::Transfer))?;
        run.facts.transfer = Some(report);
        run.enter(WorkflowState::Copied);

        if !depth.includes(ActionPhase::Staging) {
            return Ok(());
        }

        // Copied -> Staged
        let target_version = ctx.target_version.clone().unwrap_or_default();
        let outcome = stage(session.shell(), commands, &ctx.artifacts, &target_version)
            .map_err(failed_in(Phase::Staging))?;
        run.facts.record_stage(&outcome);
        run.enter(WorkflowState::Staged);

        if !depth.includes(ActionPhase::Activation) {
            return Ok(());
        }

        // Staged -> Upgraded
        if let StageOutcome::AlreadyCurrent { version } = &outcome {
            warn!(
                device = ctx.label(),
                version = %version,
                "already on target version, not rebooting"
            );
            return Ok(());
        }

        let slots = read_slots(session.shell(), commands)
            .map_err(ActivationError::from)
            .map_err(failed_in(Phase::Activation))?;
        run.facts.current_slot = slots.active().map(str::to_string);
        let slot = slots
            .inactive()
            .map(str::to_string)
            .ok_or(ActivationError::Slot(StagingError::NoInactiveSlot))
            .map_err(failed_in(Phase::Activation))?;
        run.facts.target_slot = Some(slot.clone());

        activate(session.shell(), commands, &slot).map_err(failed_in(Phase::Activation))?;
        run.facts.activated = true;
        run.enter(WorkflowState::Upgraded);
        Ok(())
    }

    fn summary(&self, ctx: &DeviceContext, facts: &RunFacts) -> String {
        let target = ctx.target_version.as_deref().unwrap_or("unknown");
        let mut parts = vec![format!(
            "{}: {} completed, target version {}",
            ctx.label(),
            ctx.execution_type,
            target
        )];
        if let Some(storage) = &facts.storage {
            parts.push(format!("{}GB free on {}", storage.available_gb, storage.mount));
        }
        if let Some(report) = &facts.transfer {
            parts.push(format!(
                "{} transferred, {} already present",
                report.transferred(),
                report.skipped()
            ));
        }
        match &facts.stage {
            Some(StageOutcome::AlreadyCurrent { version }) => {
                parts.push(format!("already running {}", version))
            }
            Some(StageOutcome::Installed { slot, .. }) => parts.push(format!("staged to {}", slot)),
            None => {}
        }
        if facts.activated {
            if let Some(slot) = &facts.target_slot {
                parts.push(format!("rebooting into {}", slot));
            }
        }
        parts.join("; ")
    }
}
