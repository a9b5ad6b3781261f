//! Structured logging setup.
//!
//! Builds a `tracing-subscriber` registry from [`LoggingConfig`]: an
//! `EnvFilter` (overridable through `RUST_LOG`) plus either a human-readable
//! or a JSON formatting layer.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{ProtocolError, Result};

/// Filter directive used when `RUST_LOG` is not set.
pub fn filter_directive(config: &LoggingConfig) -> String {
    let level = config.log_level.to_string().to_lowercase();
    format!("{level},{}={level}", env!("CARGO_CRATE_NAME"))
}

/// Create an `EnvFilter` with the crate's default directive (`info`).
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(filter_directive(&LoggingConfig::default()))
}

/// Installs the global subscriber.
///
/// # Errors
/// Fails when a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(config)));

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if config.json_format {
        registry
            .with(
                fmt::layer()
                    .with_target(config.with_target)
                    .with_ansi(false)
                    .json(),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(config.with_target)
                    .with_thread_names(true)
                    .with_level(true),
            )
            .try_init()
    };

    installed.map_err(|e| ProtocolError::ConfigError(format!("Failed to install logger: {e}")))?;
    tracing::info!(app = %config.app_name, "logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_default_filter() {
        let filter = format!("{}", default_env_filter());
        assert!(filter.contains("info"));
        assert!(filter.contains("realmgate=info"));
    }

    #[test]
    fn test_filter_follows_configured_level() {
        let config = LoggingConfig {
            log_level: Level::DEBUG,
            ..LoggingConfig::default()
        };
        assert_eq!(filter_directive(&config), "debug,realmgate=debug");
    }

    #[test]
    fn test_second_install_fails() {
        let config = LoggingConfig::default();
        assert!(init_logging(&config).is_ok());
        let err = init_logging(&config).unwrap_err();
        assert!(err.to_string().contains("Failed to install logger"));
    }
}
