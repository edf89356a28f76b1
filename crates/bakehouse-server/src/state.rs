//! Shared application state.

use crate::{collector::ActivityLog, config::ServerConfig, middleware::RateWindow};
use std::sync::Arc;

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub rate_window: Arc<RateWindow>,
    pub activity_log: Arc<ActivityLog>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let activity_log = Arc::new(ActivityLog::new(config.collector.retained_events));
        Self {
            config: Arc::new(config),
            rate_window: Arc::new(RateWindow::new()),
            activity_log,
        }
    }
}
