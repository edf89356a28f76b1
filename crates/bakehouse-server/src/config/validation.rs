//! Configuration validation.

use super::types::ServerConfig;
use bakehouse_common_log::LogLevel;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid port: {0}")]
    InvalidPort(u16),

    #[error("Invalid rate limit: max_requests must be at least 1")]
    InvalidRateLimit,

    #[error("Invalid rate limit window: window_ms must be at least 1")]
    InvalidRateWindow,

    #[error("Invalid collector: max_batch_events must be at least 1")]
    InvalidBatchLimit,

    #[error("Invalid collector: retained_events must be at least 1")]
    InvalidRetention,

    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),
}

/// Validate server configuration.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.server.port == 0 {
        errors.push(ConfigError::InvalidPort(0));
    }

    if config.rate_limit.max_requests == 0 {
        errors.push(ConfigError::InvalidRateLimit);
    }

    if config.rate_limit.window_ms == 0 {
        errors.push(ConfigError::InvalidRateWindow);
    }

    if config.collector.max_batch_events == 0 {
        errors.push(ConfigError::InvalidBatchLimit);
    }

    if config.collector.retained_events == 0 {
        errors.push(ConfigError::InvalidRetention);
    }

    // Same vocabulary the binary hands to the log initializer.
    if LogLevel::parse(&config.logging.level).is_none() {
        errors.push(ConfigError::InvalidLogLevel(config.logging.level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test_case(|c: &mut ServerConfig| c.server.port = 0 ; "zero port")]
    #[test_case(|c: &mut ServerConfig| c.rate_limit.max_requests = 0 ; "zero max requests")]
    #[test_case(|c: &mut ServerConfig| c.rate_limit.window_ms = 0 ; "zero window")]
    #[test_case(|c: &mut ServerConfig| c.collector.max_batch_events = 0 ; "zero batch limit")]
    #[test_case(|c: &mut ServerConfig| c.collector.retained_events = 0 ; "zero retention")]
    #[test_case(|c: &mut ServerConfig| c.logging.level = "loud".into() ; "unknown log level")]
    fn test_invalid_config(mutate: fn(&mut ServerConfig)) {
        let mut config = ServerConfig::default();
        mutate(&mut config);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test_case("warning" ; "warning alias")]
    #[test_case("WARN" ; "upper case")]
    #[test_case("trace" ; "trace")]
    fn test_accepted_log_levels(level: &str) {
        let mut config = ServerConfig::default();
        config.logging.level = level.into();

        assert!(validate_config(&config).is_ok());
        assert!(LogLevel::parse(level).is_some());
    }

    #[test]
    fn test_rate_limit_checked_even_when_disabled() {
        let mut config = ServerConfig::default();
        config.rate_limit.enabled = false;
        config.rate_limit.max_requests = 0;

        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ConfigError::InvalidRateLimit));
    }
}
