//! Subcommand handlers
//!
//! Each handler returns the process exit code; setup problems (bad config,
//! unreadable device record) come back as errors.

use crate::device_input::{load_device, override_depth, DEVICE_JSON_ENV};
use crate::output;
use anyhow::{Context, Result};
use std::path::Path;
use swim_common::remote::SshConnector;
use swim_common::tracker::{self, TrackingReporter};
use swim_common::{
    DeviceContext, FileCatalog, MatrixCatalog, Orchestrator, SoftwareCatalog, SwimConfig,
    WorkflowSettings,
};
use tracing::info;

/// Where the device record comes from, and how to treat it
#[derive(Debug, Clone, Default)]
pub struct DeviceArgs<'a> {
    pub device: Option<&'a Path>,
    pub depth: Option<&'a str>,
}

fn device_from(args: &DeviceArgs<'_>) -> Result<DeviceContext> {
    let mut ctx = load_device(args.device, std::env::var(DEVICE_JSON_ENV).ok())?;
    override_depth(&mut ctx, args.depth)?;
    Ok(ctx)
}

fn open_catalog(config: &SwimConfig) -> Result<FileCatalog> {
    let catalog = FileCatalog::load(&config.catalog.path)
        .context("cannot load software catalog")?;
    Ok(catalog.verify_local_checksums(config.catalog.verify_local_checksums))
}

/// Run the upgrade workflow against one device
pub fn run(config: &SwimConfig, args: &DeviceArgs<'_>, json: bool) -> Result<i32> {
    let tracker = tracker::from_config(&config.tracker).context("cannot set up tracker")?;
    run_with_tracker(config, args, json, &*tracker)
}

/// `run` with a given tracker
///
/// An unreadable software matrix is not a setup error: the run reports it
/// as missing software through the tracker.
pub fn run_with_tracker(
    config: &SwimConfig,
    args: &DeviceArgs<'_>,
    json: bool,
    tracker: &dyn TrackingReporter,
) -> Result<i32> {
    let mut ctx = device_from(args)?;
    let catalog = MatrixCatalog::open(&config.catalog.path, config.catalog.verify_local_checksums);
    let connector = SshConnector::new(config.ssh.clone());

    let orchestrator = Orchestrator::new(
        &catalog,
        &connector,
        tracker,
        WorkflowSettings::from(config),
    );
    let report = orchestrator.run(&mut ctx);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", output::render_report(&ctx, &report));
    }
    info!(exit_code = report.exit_code(), "run finished");
    Ok(report.exit_code())
}

/// Resolve software and print the plan without connecting
pub fn check(config: &SwimConfig, args: &DeviceArgs<'_>) -> Result<i32> {
    let mut ctx = device_from(args)?;
    let catalog = open_catalog(config)?;
    let family = ctx.family();

    let image = catalog
        .lookup(&ctx.device_type_model)
        .with_context(|| format!("no usable software for {}", ctx.label()))?;
    ctx.apply_software(image);

    let folder = ctx
        .remote_folder
        .clone()
        .filter(|f| !f.trim().is_empty())
        .unwrap_or_else(|| family.default_remote_folder().to_string());
    print!(
        "{}",
        output::render_plan(&ctx, &folder, config.storage.min_free_gb_for(family))
    );
    Ok(0)
}

/// List catalog models, or show one
pub fn catalog(config: &SwimConfig, model: Option<&str>) -> Result<i32> {
    let catalog = open_catalog(config)?;
    match model {
        Some(model) => match catalog.get(model) {
            Some(image) => {
                print!("{}", output::render_image(model, image));
                Ok(0)
            }
            None => {
                eprintln!("no software defined for model '{}'", model);
                Ok(1)
            }
        },
        None => {
            for model in catalog.models() {
                println!("{}", model);
            }
            Ok(0)
        }
    }
}
