//! Server configuration types.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Main server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server binding configuration.
    #[serde(default)]
    pub server: ServerBindConfig,
    /// Admission control for the collection endpoint.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Collection endpoint limits.
    #[serde(default)]
    pub collector: CollectorConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server binding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerBindConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerBindConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerBindConfig {
    /// Resolve the configured host and port.
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse()
            .map_err(|e| anyhow::anyhow!("invalid socket address {addr}: {e}"))
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Window size in milliseconds.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// Accepted requests per key per window.
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
}

fn default_true() -> bool {
    true
}

fn default_window_ms() -> u64 {
    60_000
}

fn default_max_requests() -> u32 {
    120
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_ms: default_window_ms(),
            max_requests: default_max_requests(),
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Collection endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Largest batch accepted in one request.
    #[serde(default = "default_max_batch_events")]
    pub max_batch_events: usize,
    /// Events kept in memory for the recent-activity view.
    #[serde(default = "default_retained_events")]
    pub retained_events: usize,
}

fn default_max_batch_events() -> usize {
    500
}

fn default_retained_events() -> usize {
    1000
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_batch_events: default_max_batch_events(),
            retained_events: default_retained_events(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty, compact or json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
