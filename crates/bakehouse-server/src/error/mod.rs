//! Error handling for the Bakehouse server.

pub mod response;
pub mod types;

pub use types::{ApiError, ApiResult};
