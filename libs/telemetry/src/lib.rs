//! Logging setup shared by messenger widget hosts.
//!
//! Widget diagnostics are plain `tracing` events; this crate only decides how
//! they are filtered and rendered.

use anyhow::Result;

mod config;
mod tracing_init;

pub use config::{Deployment, TelemetryConfig};
pub use tracing_init::init_tracing;

/// Installs the subscriber configured from the environment. Idempotent.
pub fn install(service_name: &str) -> Result<()> {
    init_tracing(&TelemetryConfig::from_env(service_name))
}
