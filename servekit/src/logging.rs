//! Structured logging set-up for binaries.

use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

/// Install a JSON `tracing` subscriber filtered by `RUST_LOG`.
///
/// A subscriber that is already installed is left in place.
pub fn init() {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }
}
