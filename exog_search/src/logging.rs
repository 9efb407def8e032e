//! Tracing subscriber setup for binaries and examples

use crate::error::{Result, SearchError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a global fmt subscriber filtered by `RUST_LOG` (default `info`).
///
/// Fails if a global subscriber is already set.
pub fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_thread_names(true))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_thread_names(true))
            .try_init()
    };
    installed.map_err(|e| SearchError::Logging(e.to_string()))
}
