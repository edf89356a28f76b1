//! Activity pipeline errors.

use std::time::Duration;

/// Errors raised while building or wiring a batcher.
///
/// Nothing on the tracking path returns these; delivery problems are
/// recovered by re-queueing.
#[derive(Debug, thiserror::Error)]
pub enum ActivityError {
    #[error("invalid activity configuration: {message}")]
    InvalidConfig { message: String },

    #[error("no async runtime available")]
    NoRuntime,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ActivityError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Errors from a single delivery attempt.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("request timed out")]
    Timeout,

    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("collector rejected batch: {status}")]
    Status { status: u16, body: String },

    #[error("failed to encode batch: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("no async runtime to run the delivery on")]
    NoRuntime,
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Request(e)
        }
    }
}
