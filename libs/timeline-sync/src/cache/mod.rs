//! Feed cache with single-flight fetches
//!
//! Entries live in a `DashMap` keyed by [`FeedKey`]; every write to an entry
//! happens under its shard lock. Fetches run on detached tokio tasks and are
//! shared through `futures::future::Shared`, so concurrent callers for one
//! key attach to the same transport call and a caller that stops awaiting
//! does not abort it.

mod entry;

pub use entry::{CacheEntry, FetchStart, ItemEdit, RestoreMode, Touched};

use crate::error::{HttpError, TimelineError, TimelineResult};
use crate::feed_key::{FeedKey, FeedKeyPrefix};
use crate::metrics::TimelineMetrics;
use crate::model::{Item, Page};
use crate::paginator::{FetchDirection, Paginator};
use crate::ports::Cursor;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use entry::EntrySlot;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of one fetch request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Fetched { new_items: usize, has_next: bool },
    /// The last page has no cursor; nothing was requested
    NoNextPage,
}

/// Pre-write state of one entry, captured by [`TimelineCache::apply_everywhere`]
#[derive(Debug, Clone)]
pub struct EntrySnapshot {
    key: FeedKey,
    entry: CacheEntry,
    applied_revision: u64,
    touched: Touched,
}

impl EntrySnapshot {
    pub fn key(&self) -> &FeedKey {
        &self.key
    }

    /// The entry as it was before the write
    pub fn entry(&self) -> &CacheEntry {
        &self.entry
    }

    pub fn touched(&self) -> &Touched {
        &self.touched
    }
}

type SharedFetch = Shared<BoxFuture<'static, TimelineResult<FetchOutcome>>>;

#[derive(Clone)]
struct InFlight {
    id: u64,
    direction: FetchDirection,
    result: SharedFetch,
}

struct CacheInner {
    entries: DashMap<FeedKey, EntrySlot>,
    in_flight: DashMap<FeedKey, InFlight>,
    paginator: Paginator,
    metrics: TimelineMetrics,
    next_flight_id: AtomicU64,
}

/// Shared feed cache. Cloning is cheap; clones see the same entries.
#[derive(Clone)]
pub struct TimelineCache {
    inner: Arc<CacheInner>,
}

enum FetchPlan {
    Request {
        cursor: Option<Cursor>,
        settle_as: FetchDirection,
        start: FetchStart,
    },
    Exhausted,
}

impl TimelineCache {
    pub fn new(paginator: Paginator) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: DashMap::new(),
                in_flight: DashMap::new(),
                paginator,
                metrics: TimelineMetrics::new(),
                next_flight_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn paginator(&self) -> &Paginator {
        &self.inner.paginator
    }

    /// Cached pages for `key`, empty when nothing was fetched yet
    pub fn get(&self, key: &FeedKey) -> Vec<Page> {
        self.inner
            .entries
            .get(key)
            .map(|slot| slot.entry.pages.clone())
            .unwrap_or_default()
    }

    pub fn entry(&self, key: &FeedKey) -> Option<CacheEntry> {
        self.inner.entries.get(key).map(|slot| slot.entry.clone())
    }

    /// Flattened items of every page, in display order
    pub fn items(&self, key: &FeedKey) -> Vec<Item> {
        self.inner
            .entries
            .get(key)
            .map(|slot| slot.entry.items().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, key: &FeedKey) -> bool {
        self.inner.entries.contains_key(key)
    }

    pub fn keys(&self) -> Vec<FeedKey> {
        self.inner.entries.iter().map(|e| e.key().clone()).collect()
    }

    /// Read-only walk over every cached item of every entry
    pub fn visit_items(&self, visit: &mut dyn FnMut(&FeedKey, &Item)) {
        for slot in self.inner.entries.iter() {
            for item in slot.entry.items() {
                visit(slot.key(), item);
            }
        }
    }

    pub fn is_stale(&self, key: &FeedKey) -> bool {
        self.inner
            .entries
            .get(key)
            .map(|slot| slot.entry.stale)
            .unwrap_or(false)
    }

    /// Absent, never loaded, or stale
    pub fn needs_revalidation(&self, key: &FeedKey) -> bool {
        match self.inner.entries.get(key) {
            Some(slot) => !slot.loaded || slot.entry.stale,
            None => true,
        }
    }

    /// Whether `fetch_next` would issue a request
    pub fn has_next(&self, key: &FeedKey) -> bool {
        match self.inner.entries.get(key) {
            Some(slot) if slot.loaded => slot.entry.has_next(),
            _ => true,
        }
    }

    /// The latest fetch of `key` failed and nothing settled or invalidated it since
    pub fn last_fetch_failed(&self, key: &FeedKey) -> bool {
        self.inner
            .entries
            .get(key)
            .map(|slot| slot.failed)
            .unwrap_or(false)
    }

    pub fn is_fetching(&self, key: &FeedKey) -> bool {
        self.inner.in_flight.contains_key(key)
    }

    pub async fn fetch_next(&self, key: &FeedKey) -> TimelineResult<FetchOutcome> {
        self.fetch(key, FetchDirection::Next).await
    }

    pub async fn fetch_newest(&self, key: &FeedKey) -> TimelineResult<FetchOutcome> {
        self.fetch(key, FetchDirection::Newest).await
    }

    /// Fetch one page, attaching to an in-flight fetch of the same key.
    ///
    /// A caller asking for the other direction waits for the running fetch
    /// to settle and then issues its own.
    pub async fn fetch(&self, key: &FeedKey, direction: FetchDirection) -> TimelineResult<FetchOutcome> {
        key.validate()?;

        loop {
            let (flight, joined) = match self.inner.in_flight.entry(key.clone()) {
                Entry::Occupied(occupied) => (occupied.get().clone(), true),
                Entry::Vacant(vacant) => match self.plan(key, direction) {
                    FetchPlan::Exhausted => {
                        debug!(feed = %key, "No next page");
                        return Ok(FetchOutcome::NoNextPage);
                    }
                    FetchPlan::Request {
                        cursor,
                        settle_as,
                        start,
                    } => {
                        let flight = self.spawn_fetch(key.clone(), direction, settle_as, cursor, start);
                        vacant.insert(flight.clone());
                        (flight, false)
                    }
                },
            };

            if !joined {
                return flight.result.await;
            }

            let kind = key.kind();
            self.inner.metrics.record_single_flight_join(kind.as_str());
            debug!(
                feed = %key,
                requested = %direction,
                in_flight = %flight.direction,
                "Attached to in-flight fetch"
            );

            let result = flight.result.await;
            if flight.direction == direction {
                return result;
            }
        }
    }

    fn plan(&self, key: &FeedKey, direction: FetchDirection) -> FetchPlan {
        let slot = self.inner.entries.entry(key.clone()).or_default();
        let start = slot.fetch_start();

        match direction {
            FetchDirection::Newest => FetchPlan::Request {
                cursor: None,
                settle_as: FetchDirection::Newest,
                start,
            },
            FetchDirection::Next => match slot.entry.pages.last() {
                None => FetchPlan::Request {
                    cursor: None,
                    settle_as: FetchDirection::Newest,
                    start,
                },
                Some(Page {
                    next_cursor: Some(cursor),
                    ..
                }) => FetchPlan::Request {
                    cursor: Some(cursor.clone()),
                    settle_as: FetchDirection::Next,
                    start,
                },
                Some(_) => FetchPlan::Exhausted,
            },
        }
    }

    fn spawn_fetch(
        &self,
        key: FeedKey,
        direction: FetchDirection,
        settle_as: FetchDirection,
        cursor: Option<Cursor>,
        start: FetchStart,
    ) -> InFlight {
        let id = self.inner.next_flight_id.fetch_add(1, Ordering::Relaxed);
        let kind = key.kind();
        self.inner
            .metrics
            .record_fetch(kind.as_str(), direction.as_str());

        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            let outcome = match inner.paginator.fetch(&key, cursor).await {
                Ok(page) => {
                    let has_next = page.next_cursor.is_some();
                    let settled = inner
                        .entries
                        .get_mut(&key)
                        .map(|mut slot| slot.settle(settle_as, page, start));
                    match settled {
                        Some(new_items) => {
                            debug!(feed = %key, %direction, new_items, has_next, "Fetch settled");
                        }
                        None => debug!(feed = %key, "Entry removed during fetch, result dropped"),
                    }
                    Ok(FetchOutcome::Fetched {
                        new_items: settled.unwrap_or(0),
                        has_next,
                    })
                }
                Err(err) => {
                    warn!(feed = %key, %direction, error = %err, "Fetch failed");
                    inner
                        .metrics
                        .record_fetch_error(kind.as_str(), err.kind());
                    if let Some(mut slot) = inner.entries.get_mut(&key) {
                        slot.fetch_failed();
                    }
                    Err(err)
                }
            };
            inner.in_flight.remove_if(&key, |_, flight| flight.id == id);
            outcome
        });

        let result = handle
            .map(|joined| match joined {
                Ok(outcome) => outcome,
                Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                Err(err) => Err(TimelineError::Transport(HttpError::network(format!(
                    "fetch task cancelled: {}",
                    err
                )))),
            })
            .boxed()
            .shared();

        InFlight {
            id,
            direction,
            result,
        }
    }

    /// Mark `key` stale; cached pages stay readable until the next fetch
    pub fn invalidate(&self, key: &FeedKey) -> bool {
        match self.inner.entries.get_mut(key) {
            Some(mut slot) => {
                slot.invalidate();
                self.inner.metrics.record_invalidation(key.kind().as_str());
                info!(feed = %key, "Invalidated feed");
                true
            }
            None => false,
        }
    }

    pub fn invalidate_prefix(&self, prefix: &FeedKeyPrefix) -> usize {
        let mut count = 0;
        for mut slot in self.inner.entries.iter_mut() {
            if prefix.matches(slot.key()) {
                slot.value_mut().invalidate();
                self.inner
                    .metrics
                    .record_invalidation(slot.key().kind().as_str());
                count += 1;
            }
        }
        if count > 0 {
            info!(prefix = ?prefix, count, "Invalidated feeds");
        }
        count
    }

    pub fn remove(&self, key: &FeedKey) -> Option<CacheEntry> {
        self.inner.entries.remove(key).map(|(_, slot)| slot.entry)
    }

    /// Transform one entry in place.
    ///
    /// Returns a snapshot when the transform changed anything; later fetch
    /// results are rebased onto the changed items instead of replacing them.
    pub fn set_entry(&self, key: &FeedKey, transform: impl FnOnce(&mut CacheEntry)) -> Option<EntrySnapshot> {
        let mut slot = self.inner.entries.get_mut(key)?;
        let before = slot.entry.clone();
        let revision = slot.revision;
        let touched = slot.apply_entry(transform);
        if slot.revision == revision {
            return None;
        }
        Some(EntrySnapshot {
            key: key.clone(),
            entry: before,
            applied_revision: slot.revision,
            touched,
        })
    }

    /// Run `edit` over every item of every entry.
    ///
    /// Returns one snapshot per entry the edit changed.
    pub fn apply_everywhere(&self, edit: &mut dyn FnMut(&mut Item) -> ItemEdit) -> Vec<EntrySnapshot> {
        let mut snapshots = Vec::new();
        for mut slot in self.inner.entries.iter_mut() {
            let before = slot.entry.clone();
            let touched = slot.apply_items(edit);
            if touched.is_empty() {
                continue;
            }
            debug!(
                feed = %slot.key(),
                modified = touched.modified.len(),
                removed = touched.removed.len(),
                "Applied optimistic write"
            );
            snapshots.push(EntrySnapshot {
                key: slot.key().clone(),
                entry: before,
                applied_revision: slot.revision,
                touched,
            });
        }
        snapshots
    }

    /// Undo the write captured by `snapshot`; `None` when the entry is gone
    pub fn restore(&self, snapshot: &EntrySnapshot) -> Option<RestoreMode> {
        let mut slot = self.inner.entries.get_mut(&snapshot.key)?;
        let mode = slot.restore(&snapshot.entry, snapshot.applied_revision, &snapshot.touched);
        debug!(feed = %snapshot.key, mode = ?mode, "Restored entry");
        Some(mode)
    }
}
