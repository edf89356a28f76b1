//! Activity telemetry pipeline for Bakehouse.
//!
//! Events are captured without blocking the caller, batched, and delivered
//! to the collection endpoint. It includes:
//!
//! - Non-blocking event capture with sensitive-field redaction
//! - Size- and action-triggered flushes plus a periodic flush timer
//! - Re-queueing of failed batches in their original order
//! - Fire-and-forget delivery on teardown
//! - Automatic page-view tracking for history navigation

mod batcher;
mod config;
mod context;
mod error;
mod navigation;
mod transport;

pub use batcher::{ActivityBatcher, FlushOutcome};
pub use config::{BatcherConfig, HttpConfig, DEFAULT_BATCH_SIZE, DEFAULT_FLUSH_INTERVAL};
pub use context::PageContext;
pub use error::{ActivityError, TransportError};
pub use navigation::NavigationTracker;
pub use transport::{build_client, ActivityTransport, HttpTransport};

// Re-export types for convenience
pub use bakehouse_activity_types::{ActivityAction, ActivityBatch, ActivityEvent, Details};

#[doc(hidden)]
pub use bakehouse_activity_types::sanitize_value as __sanitize_value;

#[doc(hidden)]
pub use serde_json as __serde_json;

/// Convenient tracking macro.
///
/// ```ignore
/// track!(batcher, ActivityAction::Click, "save-recipe");
/// track!(batcher, ActivityAction::Update, "recipe", id = recipe_id);
/// track!(batcher, ActivityAction::Submit, "order-form", "items" => 3, "rush" => true);
/// track!(batcher, ActivityAction::Click, "recipe-search", details = query);
/// ```
///
/// The `details =` form accepts any serializable value. Objects keep their
/// fields; anything else is recorded as `{"value": ...}`.
#[macro_export]
macro_rules! track {
    ($batcher:expr, $action:expr, $resource:expr) => {
        $batcher.track($action, $resource, None, None)
    };
    ($batcher:expr, $action:expr, $resource:expr, id = $id:expr) => {
        $batcher.track($action, $resource, Some(::std::string::ToString::to_string(&$id)), None)
    };
    ($batcher:expr, $action:expr, $resource:expr, details = $details:expr) => {
        $batcher.track(
            $action,
            $resource,
            None,
            Some($crate::__sanitize_value($crate::__serde_json::json!($details))),
        )
    };
    ($batcher:expr, $action:expr, $resource:expr, $($key:literal => $value:expr),+ $(,)?) => {{
        let mut details = $crate::Details::new();
        $(
            details.insert($key.to_string(), $crate::__serde_json::json!($value));
        )+
        $batcher.track($action, $resource, None, Some(details));
    }};
}
