//! Activity event actions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category tag of an activity event.
///
/// Serialized as the upper-case tag (`"VIEW"`, `"DELETE"`, ...). Tags outside
/// the known vocabulary round-trip unchanged through [`ActivityAction::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityAction {
    View,
    Click,
    Submit,
    Create,
    Update,
    Delete,
    Read,
    Error,
    Login,
    Logout,

    // Custom action
    Custom(String),
}

impl ActivityAction {
    /// Actions that bypass batching and are flushed immediately.
    pub const CRITICAL: [ActivityAction; 5] = [
        Self::Create,
        Self::Delete,
        Self::Error,
        Self::Login,
        Self::Logout,
    ];

    /// Wire tag for this action.
    pub fn as_str(&self) -> &str {
        match self {
            Self::View => "VIEW",
            Self::Click => "CLICK",
            Self::Submit => "SUBMIT",
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Read => "READ",
            Self::Error => "ERROR",
            Self::Login => "LOGIN",
            Self::Logout => "LOGOUT",
            Self::Custom(tag) => tag,
        }
    }

    /// Whether events with this action must be delivered without waiting
    /// for a full batch.
    pub fn is_critical(&self) -> bool {
        Self::CRITICAL.contains(self)
    }

    fn known(tag: &str) -> Option<Self> {
        let action = match tag.to_ascii_uppercase().as_str() {
            "VIEW" => Self::View,
            "CLICK" => Self::Click,
            "SUBMIT" => Self::Submit,
            "CREATE" => Self::Create,
            "UPDATE" => Self::Update,
            "DELETE" => Self::Delete,
            "READ" => Self::Read,
            "ERROR" => Self::Error,
            "LOGIN" => Self::Login,
            "LOGOUT" => Self::Logout,
            _ => return None,
        };
        Some(action)
    }
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityAction {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::known(s).unwrap_or_else(|| Self::Custom(s.to_string())))
    }
}

impl From<&str> for ActivityAction {
    fn from(tag: &str) -> Self {
        Self::known(tag).unwrap_or_else(|| Self::Custom(tag.to_string()))
    }
}

impl From<String> for ActivityAction {
    fn from(tag: String) -> Self {
        Self::known(&tag).unwrap_or(Self::Custom(tag))
    }
}

impl From<ActivityAction> for String {
    fn from(action: ActivityAction) -> Self {
        match action {
            ActivityAction::Custom(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(ActivityAction::Create, true; "create")]
    #[test_case(ActivityAction::Delete, true; "delete")]
    #[test_case(ActivityAction::Error, true; "error")]
    #[test_case(ActivityAction::Login, true; "login")]
    #[test_case(ActivityAction::Logout, true; "logout")]
    #[test_case(ActivityAction::View, false; "view")]
    #[test_case(ActivityAction::Click, false; "click")]
    #[test_case(ActivityAction::Update, false; "update")]
    #[test_case(ActivityAction::Custom("EXPORT".into()), false; "custom")]
    fn test_is_critical(action: ActivityAction, expected: bool) {
        assert_eq!(action.is_critical(), expected);
    }

    #[test]
    fn test_parse_is_case_insensitive_for_known_tags() {
        assert_eq!(ActivityAction::from("delete"), ActivityAction::Delete);
        assert_eq!(ActivityAction::from("View"), ActivityAction::View);
        assert_eq!("LOGIN".parse::<ActivityAction>().unwrap(), ActivityAction::Login);
    }

    #[test]
    fn test_unknown_tag_is_kept_verbatim() {
        let action = ActivityAction::from("PrintLabel");
        assert_eq!(action, ActivityAction::Custom("PrintLabel".to_string()));
        assert_eq!(action.to_string(), "PrintLabel");
    }

    #[test]
    fn test_serializes_as_tag() {
        let json = serde_json::to_string(&ActivityAction::Submit).unwrap();
        assert_eq!(json, "\"SUBMIT\"");

        let parsed: ActivityAction = serde_json::from_str("\"logout\"").unwrap();
        assert_eq!(parsed, ActivityAction::Logout);

        let custom: ActivityAction = serde_json::from_str("\"BAKE\"").unwrap();
        assert_eq!(serde_json::to_string(&custom).unwrap(), "\"BAKE\"");
    }
}
