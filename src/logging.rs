//! `tracing` subscriber setup for hosts that drive the pipeline.

use std::env;

use tracing_subscriber::EnvFilter;

/// Primary filter variable; `RUST_LOG` is consulted when it is unset.
pub const LOG_ENV: &str = "TASKPILOT_LOG";
const DEFAULT_FILTER: &str = "warn";

/// Filter directive in effect for [`init_logging`].
#[must_use]
pub fn log_filter() -> String {
    [LOG_ENV, "RUST_LOG"]
        .iter()
        .filter_map(|key| env::var(key).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Installs a stderr fmt subscriber. Returns `false` when one is already set.
pub fn init_logging() -> bool {
    let filter = EnvFilter::try_new(log_filter()).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok()
}
