//! Engine configuration

use serde::{Deserialize, Serialize};

/// Default number of items requested per page
pub const DEFAULT_PAGE_LIMIT: u32 = 40;

/// Capability that switches notification filtering to include-lists
pub const POSITIVE_FILTER_FEATURE: &str = "notification_types_positive_filter";

/// Preference key holding the notification category mapping
pub const NOTIFICATIONS_PREFERENCE_KEY: &str = "notifications";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
    #[serde(default = "default_positive_filter_feature")]
    pub positive_filter_feature: String,
    #[serde(default = "default_notifications_key")]
    pub notifications_preference_key: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_limit: default_page_limit(),
            positive_filter_feature: default_positive_filter_feature(),
            notifications_preference_key: default_notifications_key(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let page_limit: u32 = std::env::var("TIMELINE_PAGE_LIMIT")
            .unwrap_or_else(|_| DEFAULT_PAGE_LIMIT.to_string())
            .parse()?;
        if page_limit == 0 {
            return Err("TIMELINE_PAGE_LIMIT must be positive".into());
        }

        Ok(EngineConfig {
            page_limit,
            positive_filter_feature: std::env::var("TIMELINE_POSITIVE_FILTER_FEATURE")
                .unwrap_or_else(|_| default_positive_filter_feature()),
            notifications_preference_key: std::env::var("TIMELINE_NOTIFICATIONS_PREF_KEY")
                .unwrap_or_else(|_| default_notifications_key()),
        })
    }

    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = limit.max(1);
        self
    }
}

fn default_page_limit() -> u32 {
    DEFAULT_PAGE_LIMIT
}

fn default_positive_filter_feature() -> String {
    POSITIVE_FILTER_FEATURE.to_string()
}

fn default_notifications_key() -> String {
    NOTIFICATIONS_PREFERENCE_KEY.to_string()
}
