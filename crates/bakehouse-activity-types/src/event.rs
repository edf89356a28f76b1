//! Core activity event type.

use crate::ActivityAction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Free-form structured payload attached to an event.
pub type Details = serde_json::Map<String, serde_json::Value>;

/// A single user or system action captured for telemetry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    /// Category tag.
    pub action: ActivityAction,
    /// Logical entity, page or control acted upon.
    pub resource: String,
    /// Identifier of the specific instance, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    /// Sanitized structured payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Details>,
    /// Capture time.
    pub timestamp: DateTime<Utc>,
}

impl ActivityEvent {
    /// Create an event stamped with the current time.
    pub fn new(action: impl Into<ActivityAction>, resource: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            resource: resource.into(),
            resource_id: None,
            details: None,
            timestamp: Utc::now(),
        }
    }

    /// Set the resource instance identifier.
    pub fn with_resource_id(mut self, id: impl Into<String>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    /// Attach details. The caller is responsible for sanitizing them.
    pub fn with_details(mut self, details: Details) -> Self {
        self.details = Some(details);
        self
    }
}

/// Owned collection payload, as received by the collection endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityBatch {
    pub events: Vec<ActivityEvent>,
}

/// Borrowed collection payload, as sent by the batcher.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ActivityBatchRef<'a> {
    pub events: &'a [ActivityEvent],
}

impl<'a> From<&'a [ActivityEvent]> for ActivityBatchRef<'a> {
    fn from(events: &'a [ActivityEvent]) -> Self {
        Self { events }
    }
}
