//! Shared `tracing` initialization for the hub and shard-server binaries.
//!
//! Both binaries depend on this crate already (for the wire codec), so it
//! is the natural place to put the one bit of process bootstrap they share,
//! following `network-proxy::logging::init_tracing`.

use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber reading its filter directives
/// from `RUST_LOG`, defaulting to `info` when unset.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
