//! Logging initialization

use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

/// Filter from `RUST_LOG` when set, otherwise the configured level
pub fn env_filter(config: &AppConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
}

/// Initialize tracing for the binaries; safe to call more than once
pub fn init_logging(config: &AppConfig) {
    let initialized = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_target(false)
        .try_init()
        .is_ok();

    if initialized {
        debug!("Logging initialized at level {}", config.log_level);
    }
}
