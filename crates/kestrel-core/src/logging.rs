//! Opt-in `tracing` bootstrap.
//!
//! The library itself only emits events; binaries and tests that want to see
//! them call [`init`] once. Filtering follows `RUST_LOG`, defaulting to
//! `kestrel=info`.

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber with env-filter support.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kestrel=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
