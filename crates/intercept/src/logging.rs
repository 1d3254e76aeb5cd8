//! Log output for embedders that do not install their own subscriber.

use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber. `RUST_LOG` takes precedence over `default_filter`.
///
/// Safe to call more than once; only the first call has an effect.
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
