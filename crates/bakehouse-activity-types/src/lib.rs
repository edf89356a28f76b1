//! Activity event types for Bakehouse.
//!
//! Shared by the client-side batcher and the server-side collection
//! endpoint so both ends agree on the wire format.

mod action;
mod event;
pub mod sanitize;

pub use action::ActivityAction;
pub use event::{ActivityBatch, ActivityBatchRef, ActivityEvent, Details};
pub use sanitize::{is_sensitive, sanitize_details, sanitize_value, REDACTION_MARKER, SENSITIVE_FIELDS};
