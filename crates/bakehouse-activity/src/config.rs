//! Batcher configuration.

use crate::error::ActivityError;
use std::time::Duration;
use url::Url;

/// Default number of queued events that triggers a flush.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Default period of the unconditional flush timer.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(5000);

/// HTTP client configuration for the collector transport.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Request timeout.
    pub request_timeout: Duration,
    /// User agent string, also reported in page-view details.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            user_agent: format!("bakehouse-activity/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Configuration for [`ActivityBatcher`](crate::ActivityBatcher).
#[derive(Debug, Clone)]
pub struct BatcherConfig {
    /// Collection endpoint URL.
    pub endpoint: String,
    /// Queue length that triggers a flush.
    pub batch_size: usize,
    /// Period of the unconditional flush timer.
    pub flush_interval: Duration,
    /// Whether tracking starts enabled.
    pub enabled: bool,
    /// Transport settings.
    pub http: HttpConfig,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/api/v1/activity".to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            enabled: true,
            http: HttpConfig::default(),
        }
    }
}

impl BatcherConfig {
    /// Create config for the given endpoint with default tuning.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Set the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the flush interval.
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Start disabled.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Create config from environment variables.
    ///
    /// Unset variables keep their defaults; set but unparseable values are
    /// rejected rather than ignored.
    pub fn from_env() -> Result<Self, ActivityError> {
        let mut config = Self::default();

        if let Ok(endpoint) = std::env::var("BAKEHOUSE_ACTIVITY_ENDPOINT") {
            config.endpoint = endpoint;
        }

        if let Ok(size) = std::env::var("BAKEHOUSE_ACTIVITY_BATCH_SIZE") {
            config.batch_size = size.trim().parse().map_err(|_| {
                ActivityError::invalid(format!("BAKEHOUSE_ACTIVITY_BATCH_SIZE is not a number: {size}"))
            })?;
        }

        if let Ok(interval) = std::env::var("BAKEHOUSE_ACTIVITY_FLUSH_INTERVAL_MS") {
            let millis: u64 = interval.trim().parse().map_err(|_| {
                ActivityError::invalid(format!(
                    "BAKEHOUSE_ACTIVITY_FLUSH_INTERVAL_MS is not a number: {interval}"
                ))
            })?;
            config.flush_interval = Duration::from_millis(millis);
        }

        if let Ok(enabled) = std::env::var("BAKEHOUSE_ACTIVITY_ENABLED") {
            config.enabled = !matches!(enabled.to_lowercase().as_str(), "false" | "0" | "off" | "no");
        }

        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ActivityError> {
        if self.batch_size == 0 {
            return Err(ActivityError::invalid("batch_size must be greater than 0"));
        }

        if self.flush_interval.is_zero() {
            return Err(ActivityError::invalid("flush_interval must be greater than 0"));
        }

        self.endpoint_url()?;
        Ok(())
    }

    /// Parse the endpoint.
    pub fn endpoint_url(&self) -> Result<Url, ActivityError> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| ActivityError::invalid(format!("invalid endpoint {:?}: {e}", self.endpoint)))?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ActivityError::invalid(format!(
                "endpoint scheme must be http or https, got {other}"
            ))),
        }
    }
}
