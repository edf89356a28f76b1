//! Rate limiting types.

use crate::config::RateLimitConfig;
use std::time::Duration;

/// Policy applied by the rate limit layer.
#[derive(Debug, Clone)]
pub struct RateLimitPolicy {
    /// Maximum accepted requests per key.
    pub max_requests: u32,
    /// Time window for the limit.
    pub window: Duration,
    /// Key extraction strategy.
    pub key_strategy: KeyStrategy,
}

impl RateLimitPolicy {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            key_strategy: KeyStrategy::Ip,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, config.window())
    }

    pub fn by_ip(mut self) -> Self {
        self.key_strategy = KeyStrategy::Ip;
        self
    }

    /// Key by client IP plus a fixed action name, e.g. `10.0.0.1:login`.
    pub fn with_discriminator(mut self, name: impl Into<String>) -> Self {
        self.key_strategy = KeyStrategy::IpWithDiscriminator(name.into());
        self
    }

    pub fn by_ip_and_path(mut self) -> Self {
        self.key_strategy = KeyStrategy::IpAndPath;
        self
    }
}

/// Strategy for extracting rate limit key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyStrategy {
    /// Rate limit by client IP address.
    Ip,
    /// Client IP joined with a fixed name.
    IpWithDiscriminator(String),
    /// Client IP joined with the request path.
    IpAndPath,
}
