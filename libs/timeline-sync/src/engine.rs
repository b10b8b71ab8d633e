//! Engine facade
//!
//! Wires paginator, cache and mutation coordinator behind one handle per
//! application session.

use crate::cache::{FetchOutcome, TimelineCache};
use crate::config::EngineConfig;
use crate::error::TimelineResult;
use crate::feed_key::{FeedKey, FeedKeyPrefix};
use crate::model::Item;
use crate::mutation::{MutationCoordinator, MutationIntent, MutationOutcome};
use crate::notification_filter::{preferences_from_value, with_defaults, NotificationPreferences};
use crate::paginator::Paginator;
use crate::ports::{Capabilities, PreferenceStore, StatusLookup, Transport};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

pub struct TimelineEngine {
    cache: TimelineCache,
    coordinator: MutationCoordinator,
    preferences: Arc<dyn PreferenceStore>,
    config: EngineConfig,
}

impl TimelineEngine {
    pub fn new(
        transport: Arc<dyn Transport>,
        capabilities: Arc<dyn Capabilities>,
        preferences: Arc<dyn PreferenceStore>,
        lookup: Arc<dyn StatusLookup>,
        config: EngineConfig,
    ) -> Self {
        let paginator = Paginator::new(transport, capabilities, preferences.clone(), config.clone());
        let cache = TimelineCache::new(paginator);
        let coordinator = MutationCoordinator::new(cache.clone(), lookup);

        info!(page_limit = config.page_limit, "Timeline engine initialized");

        Self {
            cache,
            coordinator,
            preferences,
            config,
        }
    }

    pub fn cache(&self) -> &TimelineCache {
        &self.cache
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn feed(&self, key: FeedKey) -> FeedHandle {
        FeedHandle {
            key,
            cache: self.cache.clone(),
        }
    }

    pub async fn mutate(&self, origin: &FeedKey, intent: &MutationIntent) -> TimelineResult<MutationOutcome> {
        self.coordinator.mutate(origin, intent).await
    }

    pub fn invalidate(&self, key: &FeedKey) -> bool {
        self.cache.invalidate(key)
    }

    pub fn invalidate_prefix(&self, prefix: &FeedKeyPrefix) -> usize {
        self.cache.invalidate_prefix(prefix)
    }

    /// Effective notification category mapping: every default category,
    /// overridden by what is stored
    pub fn notification_filters(&self) -> NotificationPreferences {
        let stored = self
            .preferences
            .get(&self.config.notifications_preference_key)
            .and_then(|v| preferences_from_value(&v));
        with_defaults(stored.as_ref())
    }

    /// Persist the mapping and invalidate Notifications when it changed.
    ///
    /// Categories missing from `filters` keep their current value.
    pub fn update_notification_filters(&self, changes: NotificationPreferences) -> TimelineResult<bool> {
        let current = self.notification_filters();
        let mut filters = current.clone();
        filters.extend(changes);
        if filters == current {
            debug!("Notification filters unchanged");
            return Ok(false);
        }

        let value = serde_json::to_value(&filters)?;
        self.preferences
            .set(&self.config.notifications_preference_key, value);
        self.cache.invalidate(&FeedKey::Notifications);
        info!(categories = filters.len(), "Notification filters updated");
        Ok(true)
    }
}

/// Snapshot of one feed for rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedView {
    pub items: Vec<Item>,
    pub is_loading: bool,
    pub has_next: bool,
    pub is_stale: bool,
    /// The latest fetch failed; `view` will not retry until `load` or `refresh`
    pub fetch_failed: bool,
}

/// One consumer's view onto a feed
#[derive(Clone)]
pub struct FeedHandle {
    key: FeedKey,
    cache: TimelineCache,
}

impl FeedHandle {
    pub fn key(&self) -> &FeedKey {
        &self.key
    }

    /// Current cached state. Starts a background revalidation when the
    /// feed is absent or stale and a tokio runtime is available. After a
    /// failed fetch nothing is started until `load`, `refresh` or an
    /// invalidation.
    pub fn view(&self) -> FeedView {
        let mut is_loading = self.cache.is_fetching(&self.key);

        if !is_loading
            && self.cache.needs_revalidation(&self.key)
            && !self.cache.last_fetch_failed(&self.key)
        {
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                let cache = self.cache.clone();
                let key = self.key.clone();
                runtime.spawn(async move {
                    if let Err(err) = cache.fetch_newest(&key).await {
                        debug!(feed = %key, error = %err, "Background revalidation failed");
                    }
                });
                is_loading = true;
            }
        }

        self.snapshot(is_loading)
    }

    fn snapshot(&self, is_loading: bool) -> FeedView {
        FeedView {
            items: self.cache.items(&self.key),
            is_loading,
            has_next: self.cache.has_next(&self.key),
            is_stale: self.cache.is_stale(&self.key),
            fetch_failed: self.cache.last_fetch_failed(&self.key),
        }
    }

    /// Revalidate if needed and return the settled view
    pub async fn load(&self) -> TimelineResult<FeedView> {
        if self.cache.needs_revalidation(&self.key) || self.cache.is_fetching(&self.key) {
            self.cache.fetch_newest(&self.key).await?;
        }
        Ok(self.snapshot(self.cache.is_fetching(&self.key)))
    }

    pub async fn fetch_next(&self) -> TimelineResult<FetchOutcome> {
        self.cache.fetch_next(&self.key).await
    }

    /// Pull-to-refresh
    pub async fn refresh(&self) -> TimelineResult<FetchOutcome> {
        self.cache.fetch_newest(&self.key).await
    }
}
