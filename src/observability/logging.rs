//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once per process
//! - Pick the default level from the debug switch
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `RUST_LOG` overrides the configured default
//! - Per-request trace spans come from `tower_http::trace`, enabled in debug mode

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::AppConfig;

/// Filter used when `RUST_LOG` is unset.
pub fn default_filter(config: &AppConfig) -> &'static str {
    if config.app.debug {
        "switchyard=debug,tower_http=debug"
    } else {
        "switchyard=info"
    }
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(config).into());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_follows_debug() {
        let mut config = AppConfig::default();
        assert_eq!(default_filter(&config), "switchyard=info");

        config.app.debug = true;
        assert!(default_filter(&config).starts_with("switchyard=debug"));
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let config = AppConfig::default();
        init_logging(&config);
        init_logging(&config);
    }
}
