//! Test tracing setup

use tracing_subscriber::EnvFilter;

/// Install a test-friendly subscriber once; later calls are no-ops.
///
/// Honors `RUST_LOG`, defaulting to `debug` for the topo crates.
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("topo_device_store=debug,topo_testkit=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
