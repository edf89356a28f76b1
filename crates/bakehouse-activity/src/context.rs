//! Page context reported alongside page views and errors.

use bakehouse_activity_types::Details;
use serde_json::Value;

/// Where the user currently is and how they got there.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageContext {
    pub url: Option<String>,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
}

impl PageContext {
    /// Context for a page URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Set the referrer.
    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    /// Set the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Render as page-view details. Unknown fields are omitted.
    pub fn to_details(&self) -> Details {
        let mut details = Details::new();
        let fields = [
            ("url", &self.url),
            ("referrer", &self.referrer),
            ("userAgent", &self.user_agent),
        ];
        for (name, value) in fields {
            if let Some(value) = value {
                details.insert(name.to_string(), Value::String(value.clone()));
            }
        }
        details
    }
}
