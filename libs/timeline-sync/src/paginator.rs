//! Request building and cursor interpretation
//!
//! The paginator turns `(FeedKey, cursor)` into one or two transport calls
//! and a single [`Page`]. It never touches the cache.

use crate::config::EngineConfig;
use crate::error::TimelineResult;
use crate::feed_key::FeedKey;
use crate::model::Page;
use crate::normalizer::{decode_items, filter_following, merge_pinned};
use crate::notification_filter::{preferences_from_value, NotificationFilter};
use crate::ports::{ApiRequest, Capabilities, Cursor, PreferenceStore, Transport};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Which end of the feed a fetch extends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchDirection {
    /// Pull-to-refresh: cursor-less, replaces the newest page
    Newest,
    /// Follow the last page's `next_cursor`
    Next,
}

impl FetchDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchDirection::Newest => "newest",
            FetchDirection::Next => "next",
        }
    }
}

impl fmt::Display for FetchDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct Paginator {
    transport: Arc<dyn Transport>,
    capabilities: Arc<dyn Capabilities>,
    preferences: Arc<dyn PreferenceStore>,
    config: EngineConfig,
}

impl Paginator {
    pub fn new(
        transport: Arc<dyn Transport>,
        capabilities: Arc<dyn Capabilities>,
        preferences: Arc<dyn PreferenceStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            transport,
            capabilities,
            preferences,
            config,
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current notification filter from stored preferences and capability
    pub fn notification_filter(&self) -> NotificationFilter {
        let preferences = self
            .preferences
            .get(&self.config.notifications_preference_key)
            .and_then(|v| preferences_from_value(&v));
        let positive = self
            .capabilities
            .supports(&self.config.positive_filter_feature);
        NotificationFilter::compute(preferences.as_ref(), positive)
    }

    /// Build the primary request for `key` at `cursor`
    pub fn build_request(&self, key: &FeedKey, cursor: Option<&Cursor>) -> TimelineResult<ApiRequest> {
        key.validate()?;

        let base = |path: String| {
            let mut request = ApiRequest::get(path).param("limit", self.config.page_limit.to_string());
            if let Some(cursor) = cursor {
                for (name, value) in cursor.params() {
                    request = request.set_param(name.as_str(), value.as_str());
                }
            }
            request
        };

        let request = match key {
            FeedKey::Following { .. } => base("timelines/home".to_string()),
            FeedKey::Local => base("timelines/public".to_string()).param("local", "true"),
            FeedKey::LocalPublic => base("timelines/public".to_string()),
            FeedKey::Trending => base("trends/statuses".to_string()),
            FeedKey::Notifications => self
                .notification_filter()
                .apply(base("notifications".to_string())),
            FeedKey::Account {
                id,
                exclude_reblogs,
                only_media,
            } => {
                let path = format!("accounts/{}/statuses", id.as_deref().unwrap_or_default());
                if *exclude_reblogs {
                    base(path).param("exclude_replies", "true")
                } else {
                    base(path)
                        .param("exclude_replies", exclude_reblogs.to_string())
                        .param("only_media", only_media.to_string())
                }
            }
            FeedKey::Hashtag { hashtag } => base(format!("timelines/tag/{}", hashtag)),
            FeedKey::List { list } => base(format!("timelines/list/{}", list)),
            FeedKey::Conversations => base("conversations".to_string()),
            FeedKey::Bookmarks => base("bookmarks".to_string()),
            FeedKey::Favourites => base("favourites".to_string()),
        };

        Ok(request)
    }

    /// Request for the account's pinned sub-feed (unparameterized, unpaginated)
    fn pinned_request(&self, key: &FeedKey) -> Option<ApiRequest> {
        match key {
            FeedKey::Account {
                id: Some(id),
                exclude_reblogs: true,
                ..
            } => Some(ApiRequest::get(format!("accounts/{}/statuses", id)).param("pinned", "true")),
            _ => None,
        }
    }

    /// Fetch one page of `key` starting at `cursor` (`None` = newest)
    pub async fn fetch(&self, key: &FeedKey, cursor: Option<Cursor>) -> TimelineResult<Page> {
        let request = self.build_request(key, cursor.as_ref())?;
        let kind = key.kind();

        let pinned = match (&cursor, self.pinned_request(key)) {
            (None, Some(pinned_request)) => {
                let response = self.transport.request(pinned_request).await?;
                Some(decode_items(kind, &response.body)?)
            }
            _ => None,
        };

        let response = self.transport.request(request).await?;
        let raw = decode_items(kind, &response.body)?;

        // Cursor comes from the unfiltered response; an empty raw page ends the feed
        let next_cursor = if raw.is_empty() {
            None
        } else {
            response.links.next.filter(|c| !c.is_empty())
        };

        let items = match key {
            FeedKey::Following {
                show_boosts,
                show_replies,
            } => filter_following(raw, *show_boosts, *show_replies),
            _ => raw,
        };

        let items = match pinned {
            Some(pinned) => merge_pinned(pinned, items),
            None => items,
        };

        debug!(
            feed = %key,
            items = items.len(),
            has_next = next_cursor.is_some(),
            "Fetched timeline page"
        );

        Ok(Page::new(items, next_cursor))
    }
}
