//! Structured logging setup for hosts that do not install their own
//! subscriber.
//!
//! Everything in this crate logs through `tracing`; without a subscriber the
//! events are discarded.

use tracing_subscriber::EnvFilter;

/// Install a global JSON subscriber.
///
/// `filter` uses `EnvFilter` syntax (`"framesync_runtime=debug,warn"`) and is
/// overridden by `RUST_LOG` when that is set.
pub fn init_json_logging(filter: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(filter))?;
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .try_init()
}
