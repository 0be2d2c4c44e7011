//! Structured logging setup.
//!
//! Frame traffic is logged at `trace` (`> ` outbound, `< ` inbound), stream
//! lifecycle at `debug`, handshake outcome at `info`. `RUST_LOG` overrides the
//! configured level.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{AdbError, Result};

/// Install a global subscriber built from `config`.
///
/// # Errors
/// Returns `AdbError::ConfigError` if a global subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string().to_lowercase()));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json_format {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
    };

    installed.map_err(|e| AdbError::ConfigError(format!("Failed to install logger: {e}")))?;
    tracing::info!(app = %config.app_name, level = %config.log_level, "Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_second_init_is_rejected() {
        let config = LoggingConfig {
            log_level: Level::DEBUG,
            json_format: true,
            ..LoggingConfig::default()
        };
        // Only this test installs a global subscriber in the unit-test binary.
        assert!(init_logging(&config).is_ok());
        assert!(matches!(
            init_logging(&LoggingConfig::default()),
            Err(AdbError::ConfigError(_))
        ));
    }
}
