//! Logging setup
//!
//! The library only emits `tracing` events. Binaries embedding it call
//! [`init_logging`] once at startup to print them.

use crate::{Error, Result};
use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber filtered by `RUST_LOG`, defaulting to `info`
pub fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .map_err(|e| Error::Internal(format!("logging already initialized: {}", e)))
}
