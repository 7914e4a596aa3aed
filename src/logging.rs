//! Process-wide logging setup.

use tracing_subscriber::EnvFilter;

/// Install the stderr subscriber. Level comes from `RUST_LOG`, falling back
/// to `warn`, or `debug` when `verbose` is set.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
