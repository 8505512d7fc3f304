//! Upgrade workflow
//!
//! `Orchestrator::run` walks one device through
//! `Init → PreValidated → Copied → Staged → Upgraded → Done`, stopping at the
//! requested depth or at the first failure. The states visited, the facts
//! discovered on the way and the final outcome come back as a
//! `WorkflowReport`; nothing here exits the process.

mod facts;
mod orchestrator;
mod reporting;

pub use facts::RunFacts;
pub use orchestrator::{Orchestrator, WorkflowSettings};

use crate::error::FailureClass;
use crate::model::ExecutionDepth;
use serde::Serialize;
use std::fmt;

/// Phase a failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    PreValidation,
    Transfer,
    Staging,
    Activation,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PreValidation => "pre_validation",
            Self::Transfer => "transfer",
            Self::Staging => "staging",
            Self::Activation => "activation",
        };
        write!(f, "{}", s)
    }
}

/// Workflow states
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowState {
    Init,
    PreValidated,
    Copied,
    Staged,
    Upgraded,
    Done,
    Failed {
        phase: Phase,
        class: FailureClass,
        reason: String,
    },
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed { .. })
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::PreValidated => write!(f, "pre_validated"),
            Self::Copied => write!(f, "copied"),
            Self::Staged => write!(f, "staged"),
            Self::Upgraded => write!(f, "upgraded"),
            Self::Done => write!(f, "done"),
            Self::Failed { phase, class, .. } => write!(f, "failed({}, {})", phase, class),
        }
    }
}

/// Terminal outcome of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum WorkflowOutcome {
    Done,
    Failed {
        phase: Phase,
        class: FailureClass,
        reason: String,
    },
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowReport {
    pub depth: ExecutionDepth,
    pub outcome: WorkflowOutcome,
    /// States visited, in order, ending with `Done` or `Failed`
    pub trace: Vec<WorkflowState>,
    pub facts: RunFacts,
}

impl WorkflowReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, WorkflowOutcome::Done)
    }

    /// 0 on success and on failed dry runs, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        match self.outcome {
            WorkflowOutcome::Done => 0,
            WorkflowOutcome::Failed { .. } if self.depth.is_dry_run() => 0,
            WorkflowOutcome::Failed { .. } => 1,
        }
    }

    pub fn failure_class(&self) -> Option<FailureClass> {
        match &self.outcome {
            WorkflowOutcome::Failed { class, .. } => Some(*class),
            WorkflowOutcome::Done => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(depth: ExecutionDepth, outcome: WorkflowOutcome) -> WorkflowReport {
        WorkflowReport {
            depth,
            outcome,
            trace: vec![WorkflowState::Init],
            facts: RunFacts::default(),
        }
    }

    fn failed() -> WorkflowOutcome {
        WorkflowOutcome::Failed {
            phase: Phase::PreValidation,
            class: FailureClass::DiskFull,
            reason: "insufficient disk space".to_string(),
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(report(ExecutionDepth::Stage, WorkflowOutcome::Done).exit_code(), 0);
        assert_eq!(report(ExecutionDepth::Stage, failed()).exit_code(), 1);
        assert_eq!(report(ExecutionDepth::DryRun, failed()).exit_code(), 0);
        assert!(!report(ExecutionDepth::DryRun, failed()).succeeded());
    }

    #[test]
    fn test_state_display() {
        let state = WorkflowState::Failed {
            phase: Phase::Staging,
            class: FailureClass::Fail,
            reason: "boom".to_string(),
        };
        assert_eq!(state.to_string(), "failed(staging, fail)");
        assert!(state.is_terminal());
        assert!(!WorkflowState::Copied.is_terminal());
    }
}
