//! Terminal output - plain ASCII, colored status tags

use owo_colors::OwoColorize;
use std::fmt::Write;
use swim_common::model::ActionPhase;
use swim_common::stage::StageOutcome;
use swim_common::{DeviceContext, SoftwareImage, WorkflowOutcome, WorkflowReport};

/// Summary of a finished run
pub fn render_report(ctx: &DeviceContext, report: &WorkflowReport) -> String {
    let mut out = String::new();
    let who = format!("{} ({})", ctx.label(), ctx.device_address);

    match &report.outcome {
        WorkflowOutcome::Done => {
            let _ = writeln!(
                out,
                "{} {} {} completed",
                "[OK]".bright_green(),
                who,
                report.depth
            );
        }
        WorkflowOutcome::Failed {
            phase,
            class,
            reason,
        } => {
            let tag = if report.depth.is_dry_run() {
                "[FAILED]".yellow().to_string()
            } else {
                "[FAILED]".bright_red().to_string()
            };
            let _ = writeln!(out, "{} {} {} failed in {} ({})", tag, who, report.depth, phase, class);
            let _ = writeln!(out, "  reason:  {}", reason);
        }
    }

    let trace: Vec<String> = report.trace.iter().map(|s| s.to_string()).collect();
    let _ = writeln!(out, "  trace:   {}", trace.join(" -> "));

    let facts = &report.facts;
    if let Some(target) = &ctx.target_version {
        match &facts.current_version {
            Some(current) => {
                let _ = writeln!(out, "  target:  {} (running {})", target, current);
            }
            None => {
                let _ = writeln!(out, "  target:  {}", target);
            }
        }
    }
    if let Some(storage) = &facts.storage {
        let _ = writeln!(
            out,
            "  storage: {}GB free on {} (need {}GB)",
            storage.available_gb, storage.mount, storage.required_gb
        );
    }
    if let Some(transfer) = &facts.transfer {
        let _ = writeln!(
            out,
            "  copy:    {} transferred, {} already present",
            transfer.transferred(),
            transfer.skipped()
        );
    }
    match &facts.stage {
        Some(StageOutcome::AlreadyCurrent { version }) => {
            let _ = writeln!(out, "  stage:   already running {}", version);
        }
        Some(StageOutcome::Installed { slot, artifacts, .. }) => {
            let _ = writeln!(out, "  stage:   {} installed to {}", artifacts.len(), slot);
        }
        None => {}
    }
    if facts.activated {
        if let Some(slot) = &facts.target_slot {
            let _ = writeln!(out, "  reboot:  into {}", slot);
        }
    }
    out
}

/// What a run would do, without touching the device
pub fn render_plan(ctx: &DeviceContext, remote_folder: &str, min_free_gb: f64) -> String {
    let mut out = String::new();
    let depth = ctx.execution_type;
    let _ = writeln!(
        out,
        "{} {} ({}) model '{}'",
        "[PLAN]".cyan(),
        ctx.label(),
        ctx.device_address,
        ctx.device_type_model
    );
    let _ = writeln!(
        out,
        "  target:  {}",
        ctx.target_version.as_deref().unwrap_or("unknown")
    );
    let _ = writeln!(out, "  depth:   {}", depth);

    let mut steps = vec![format!(
        "validate {} ({}GB free required)",
        remote_folder, min_free_gb
    )];
    if depth.includes(ActionPhase::Transfer) {
        steps.push(format!("copy {} artifact(s)", ctx.artifacts.len()));
    }
    if depth.includes(ActionPhase::Staging) {
        steps.push("stage to inactive slot".to_string());
    }
    if depth.includes(ActionPhase::Activation) {
        steps.push("reboot into staged slot".to_string());
    }
    for (i, step) in steps.iter().enumerate() {
        let _ = writeln!(out, "  {}. {}", i + 1, step);
    }

    if !ctx.artifacts.is_empty() {
        let _ = writeln!(out, "  artifacts:");
        for artifact in &ctx.artifacts {
            let _ = writeln!(
                out,
                "    * {} -> {} [{} {}]",
                artifact.local_path.display(),
                artifact.remote_path,
                artifact.checksum.algorithm().as_str(),
                artifact.checksum
            );
        }
    }
    out
}

/// One catalog entry
pub fn render_image(model: &str, image: &SoftwareImage) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", model.bold());
    let _ = writeln!(out, "  target:  {}", image.target_version);
    let _ = writeln!(out, "  local:   {}", image.local_folder);
    let _ = writeln!(out, "  remote:  {}", image.remote_folder);
    for artifact in &image.artifacts {
        let _ = writeln!(out, "    * {} [{}]", artifact.filename, artifact.checksum);
        if let Some(url) = &artifact.download_url {
            let _ = writeln!(out, "      {}", url.dimmed());
        }
    }
    out
}
