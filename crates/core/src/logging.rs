//! Logging initialization.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Default filter used when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "info,toy2d_rhi=info,toy2d_renderer=debug";

/// Installs the global tracing subscriber.
///
/// Filtering follows `RUST_LOG` when present. Calling this twice is harmless;
/// the second call leaves the first subscriber in place.
///
/// # Example
/// ```
/// toy2d_core::init_logging();
/// tracing::info!("Engine starting");
/// ```
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init();
}
