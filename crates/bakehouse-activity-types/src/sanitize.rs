//! Sensitive data redaction for event payloads.
//!
//! Only top-level keys are inspected. A nested object such as
//! `{"account": {"password": "..."}}` passes through untouched; callers that
//! attach nested structures must redact them themselves.

use crate::Details;
use serde_json::Value;

/// Replacement written over sensitive values.
pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Key fragments that mark a field as sensitive (case-insensitive substring).
pub const SENSITIVE_FIELDS: &[&str] = &[
    "password",
    "token",
    "secret",
    "key",
    "authorization",
    "ssn",
    "creditcard",
];

/// Whether a field name matches the sensitive vocabulary.
pub fn is_sensitive(field: &str) -> bool {
    let field = field.to_lowercase();
    SENSITIVE_FIELDS.iter().any(|f| field.contains(f))
}

/// Redact sensitive top-level fields.
pub fn sanitize_details(mut details: Details) -> Details {
    for (key, value) in details.iter_mut() {
        if is_sensitive(key) {
            *value = Value::String(REDACTION_MARKER.to_string());
        }
    }
    details
}

/// Sanitize an arbitrary JSON value used as details.
///
/// Objects are sanitized; any other value is wrapped as `{"value": ...}` so
/// that details stay an object on the wire.
pub fn sanitize_value(value: Value) -> Details {
    match value {
        Value::Object(map) => sanitize_details(map),
        Value::Null => Details::new(),
        other => {
            let mut details = Details::new();
            details.insert("value".to_string(), other);
            details
        }
    }
}
