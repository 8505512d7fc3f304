//! SWIM Common - software image management for network appliances
//!
//! Copies installer images to a device over SSH, stages them into the
//! inactive boot slot and reboots into it, reporting every step to an
//! external tracking service. The run stops at the requested execution
//! depth (`dry_run < copy < stage < upgrade`) or at the first failure.

pub mod activate;
pub mod catalog;
pub mod config;
pub mod device;
pub mod error;
pub mod model;
pub mod preval;
pub mod remote;
pub mod stage;
pub mod tracker;
pub mod transfer;
pub mod workflow;

pub use catalog::{CatalogError, FileCatalog, MatrixCatalog, SoftwareCatalog};
pub use config::SwimConfig;
pub use device::{CommandSet, DeviceFamily};
pub use error::{FailureClass, SwimError};
pub use model::{Artifact, Checksum, DeviceContext, ExecutionDepth, SoftwareImage};
pub use remote::{CommandOutput, Connector, RemoteError, RemoteShell};
pub use tracker::{ConnectivityStatus, ExecutionStatus, TrackingReporter};
pub use workflow::{
    Orchestrator, Phase, RunFacts, WorkflowOutcome, WorkflowReport, WorkflowSettings,
    WorkflowState,
};
