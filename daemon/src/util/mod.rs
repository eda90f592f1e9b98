use std::time::Duration;

pub mod metrics;
pub mod patch;

pub(crate) mod colors;

mod error;

pub use error::*;

/// Requeue delay used while an install Job is still running.
pub(crate) const JOB_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Requeue delay for a Validation or PluginRegistration that has nothing
/// left to do but periodically re-check external state.
pub(crate) const PROBE_INTERVAL: Duration = Duration::from_secs(30);

/// Field manager name used on every server-side-apply / status patch.
pub(crate) const MANAGER_NAME: &str = "krangd";
