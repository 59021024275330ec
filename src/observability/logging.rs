//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Configure log level from config, with `RUST_LOG` taking precedence

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter for a configured level.
pub fn default_filter(level: &str) -> String {
    format!("unblock_proxy={level},tower_http={level}", level = level.to_ascii_lowercase())
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_logging(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level).into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
