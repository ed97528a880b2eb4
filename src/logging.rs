//! Structured logging setup using `tracing`.
//!
//! The library only emits events; binaries embedding it call
//! [`init_logging`] once at startup.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{ProjectError, ProjectResult};

/// Environment variable that overrides the configured filter.
pub const LOG_ENV: &str = "STAGETREE_LOG";

/// Filter from `STAGETREE_LOG` when set, otherwise from `config.level`.
pub fn build_env_filter(config: &LoggingConfig) -> ProjectResult<EnvFilter> {
    match std::env::var(LOG_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(&directives)
            .map_err(|e| ProjectError::Config(format!("invalid {}: {}", LOG_ENV, e))),
        _ => EnvFilter::try_new(&config.level)
            .map_err(|e| ProjectError::Config(format!("invalid log level {:?}: {}", config.level, e))),
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LoggingConfig) -> ProjectResult<()> {
    let filter = build_env_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format {
        LogFormat::Text => registry.with(fmt::layer().with_target(true)).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
    };

    result.map_err(|e| ProjectError::Config(format!("failed to initialize logging: {}", e)))
}
