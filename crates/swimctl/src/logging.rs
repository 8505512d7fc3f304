//! Logging setup
//!
//! Level precedence: `SWIM_LOG_LEVEL`, then `RUST_LOG`, then `-v` count.

use tracing_subscriber::EnvFilter;

pub const LOG_LEVEL_ENV: &str = "SWIM_LOG_LEVEL";

/// Filter directive for the given verbosity and environment values
pub fn filter_directive(verbose: u8, swim_level: Option<&str>, rust_log: Option<&str>) -> String {
    let from_env = [swim_level, rust_log]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty());
    if let Some(directive) = from_env {
        return directive.to_string();
    }
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
    .to_string()
}

/// Install the global subscriber; logs go to stderr
pub fn init(verbose: u8) {
    let swim_level = std::env::var(LOG_LEVEL_ENV).ok();
    let rust_log = std::env::var("RUST_LOG").ok();
    let directive = filter_directive(verbose, swim_level.as_deref(), rust_log.as_deref());

    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
