//! Rate limiting middleware.

pub mod layer;
pub mod types;
pub mod window;

pub use layer::{RateLimitLayer, RateLimitMiddleware};
pub use types::{KeyStrategy, RateLimitPolicy};
pub use window::{RateDecision, RateWindow, DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW};
