//! Device record input
//!
//! The device record comes from `--device <file>` or, when no file is
//! given, from the `SWIMLIB_DEVICE_JSON` environment variable.

use anyhow::{bail, Context, Result};
use std::path::Path;
use swim_common::{DeviceContext, ExecutionDepth};

pub const DEVICE_JSON_ENV: &str = "SWIMLIB_DEVICE_JSON";

/// Load the device record from a file, else from `env_json`
pub fn load_device(path: Option<&Path>, env_json: Option<String>) -> Result<DeviceContext> {
    let (raw, source) = match (path, env_json) {
        (Some(path), _) => (
            std::fs::read_to_string(path)
                .with_context(|| format!("cannot read device file {}", path.display()))?,
            path.display().to_string(),
        ),
        (None, Some(json)) if !json.trim().is_empty() => (json, DEVICE_JSON_ENV.to_string()),
        _ => bail!("no device record: pass --device <file> or set {}", DEVICE_JSON_ENV),
    };

    let ctx = DeviceContext::from_json(&raw)
        .with_context(|| format!("invalid device record in {}", source))?;
    if ctx.device_address.trim().is_empty() {
        bail!("device record in {} has an empty device_address", source);
    }
    Ok(ctx)
}

/// Apply a `--depth` override from the command line
pub fn override_depth(ctx: &mut DeviceContext, depth: Option<&str>) -> Result<()> {
    if let Some(raw) = depth {
        let Some(depth) = ExecutionDepth::parse_strict(raw) else {
            bail!(
                "unknown depth '{}': expected dry_run, copy, stage or upgrade",
                raw
            );
        };
        ctx.execution_type = depth;
    }
    Ok(())
}
