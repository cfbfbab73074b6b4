//! Tracing setup for binaries and tests.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "umbra_core=info,umbra_prover=info";

/// Install a fmt subscriber filtered by `RUST_LOG`
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .try_init();
}
