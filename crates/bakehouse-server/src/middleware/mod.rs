//! HTTP middleware.

pub mod rate_limit;

pub use rate_limit::{KeyStrategy, RateLimitLayer, RateLimitPolicy, RateWindow};
