//! Logging setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter directives.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "tile_gateway=debug,tower_http=debug"
    } else {
        "tile_gateway=info,tower_http=info"
    }
}

/// Initialize the tracing/logging subsystem.
///
/// `RUST_LOG` overrides the default filter when set. Calling this more than
/// once is harmless; later calls leave the first subscriber in place.
pub fn init_logging(verbose: bool) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(verbose).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
