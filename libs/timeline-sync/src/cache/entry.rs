//! Per-feed cache entry and its merge rules
//!
//! An [`EntrySlot`] wraps the visible [`CacheEntry`] with bookkeeping:
//! - a revision bumped on every write, used for compare-and-swap rollback
//! - the revision of the latest local write per item id, so a fetch that
//!   started earlier never clobbers an optimistic write
//! - tombstones for locally removed ids, so late fetches never resurrect them
//! - an invalidation epoch, so a fetch that started before `invalidate`
//!   does not clear the stale mark
//!
//! Fetches are single-flight per key, so once a fetch settles every write
//! recorded before it started is pruned from the bookkeeping.

use crate::model::{Item, Page};
use crate::paginator::FetchDirection;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Visible state of one feed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub pages: Vec<Page>,
    pub stale: bool,
}

impl CacheEntry {
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.pages.iter().flat_map(|p| p.items.iter())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items().any(|item| item.id() == id)
    }

    pub fn find(&self, id: &str) -> Option<&Item> {
        self.items().find(|item| item.id() == id)
    }

    fn position(&self, id: &str) -> Option<(usize, usize)> {
        self.pages.iter().enumerate().find_map(|(p, page)| {
            page.items
                .iter()
                .position(|item| item.id() == id)
                .map(|i| (p, i))
        })
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut Item> {
        self.pages
            .iter_mut()
            .flat_map(|p| p.items.iter_mut())
            .find(|item| item.id() == id)
    }

    pub fn has_next(&self) -> bool {
        self.pages
            .last()
            .map(|p| p.next_cursor.is_some())
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.pages.iter().map(|p| p.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of a per-item transform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemEdit {
    Unchanged,
    Modified,
    Remove,
}

/// Item ids a write changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Touched {
    pub modified: Vec<String>,
    pub removed: Vec<String>,
}

impl Touched {
    pub fn is_empty(&self) -> bool {
        self.modified.is_empty() && self.removed.is_empty()
    }

    fn ids(&self) -> impl Iterator<Item = &String> {
        self.modified.iter().chain(self.removed.iter())
    }
}

/// Where a fetch started, captured before the transport call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStart {
    pub revision: u64,
    pub epoch: u64,
}

/// How a rollback was carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreMode {
    /// Nothing else wrote the entry; the snapshot was put back whole
    Verbatim,
    /// A later write landed; only the touched items were reverted
    Targeted,
}

#[derive(Debug, Default)]
pub(crate) struct EntrySlot {
    pub(crate) entry: CacheEntry,
    pub(crate) revision: u64,
    /// At least one fetch has settled into this entry
    pub(crate) loaded: bool,
    /// The latest fetch failed and nothing has settled since
    pub(crate) failed: bool,
    epoch: u64,
    local_writes: HashMap<String, u64>,
    /// Locally removed id -> revision of the removal
    tombstones: HashMap<String, u64>,
}

impl EntrySlot {
    pub(crate) fn fetch_start(&self) -> FetchStart {
        FetchStart {
            revision: self.revision,
            epoch: self.epoch,
        }
    }

    fn record_local_write(&mut self, touched: &Touched) {
        self.revision += 1;
        for id in &touched.modified {
            self.local_writes.insert(id.clone(), self.revision);
        }
        for id in &touched.removed {
            self.local_writes.insert(id.clone(), self.revision);
            self.tombstones.insert(id.clone(), self.revision);
        }
    }

    /// Run `edit` over every item; returns what changed
    pub(crate) fn apply_items(&mut self, edit: &mut dyn FnMut(&mut Item) -> ItemEdit) -> Touched {
        let mut touched = Touched::default();
        for page in &mut self.entry.pages {
            page.items.retain_mut(|item| match edit(item) {
                ItemEdit::Unchanged => true,
                ItemEdit::Modified => {
                    touched.modified.push(item.id().to_string());
                    true
                }
                ItemEdit::Remove => {
                    touched.removed.push(item.id().to_string());
                    false
                }
            });
        }
        if !touched.is_empty() {
            self.record_local_write(&touched);
        }
        touched
    }

    /// Arbitrary entry transform; changes are found by diffing
    pub(crate) fn apply_entry(&mut self, transform: impl FnOnce(&mut CacheEntry)) -> Touched {
        let before = self.entry.clone();
        transform(&mut self.entry);

        let before_items: HashMap<&str, &Item> = before.items().map(|i| (i.id(), i)).collect();
        let after_ids: HashSet<&str> = self.entry.items().map(Item::id).collect();

        let mut touched = Touched::default();
        for item in self.entry.items() {
            match before_items.get(item.id()) {
                Some(old) if *old == item => {}
                _ => touched.modified.push(item.id().to_string()),
            }
        }
        for id in before_items.keys() {
            if !after_ids.contains(id) {
                touched.removed.push(id.to_string());
            }
        }

        if !touched.is_empty() || before.pages != self.entry.pages {
            self.record_local_write(&touched);
        }
        touched
    }

    pub(crate) fn invalidate(&mut self) {
        self.entry.stale = true;
        self.failed = false;
        self.epoch += 1;
    }

    pub(crate) fn fetch_failed(&mut self) {
        self.failed = true;
    }

    /// Put pre-mutation state back.
    ///
    /// Verbatim when the entry has not been written since `applied_revision`,
    /// otherwise only the touched ids are reverted from `snapshot`. The stale
    /// mark is never taken from the snapshot; `invalidate` does not bump the
    /// revision, so an invalidation during the mutation must survive.
    pub(crate) fn restore(
        &mut self,
        snapshot: &CacheEntry,
        applied_revision: u64,
        touched: &Touched,
    ) -> RestoreMode {
        let mode = if self.revision == applied_revision {
            self.entry.pages = snapshot.pages.clone();
            RestoreMode::Verbatim
        } else {
            for id in &touched.modified {
                if let (Some(original), Some(current)) = (snapshot.find(id), self.entry.find_mut(id)) {
                    *current = original.clone();
                }
            }
            for id in &touched.removed {
                if self.entry.contains(id) {
                    continue;
                }
                if let (Some((p, i)), Some(original)) = (snapshot.position(id), snapshot.find(id)) {
                    self.reinsert(p, i, original.clone());
                }
            }
            RestoreMode::Targeted
        };

        for id in &touched.removed {
            self.tombstones.remove(id);
        }
        let restored = Touched {
            modified: touched.ids().cloned().collect(),
            removed: Vec::new(),
        };
        self.record_local_write(&restored);
        mode
    }

    fn reinsert(&mut self, page: usize, index: usize, item: Item) {
        if self.entry.pages.is_empty() {
            self.entry.pages.push(Page::default());
        }
        let page = page.min(self.entry.pages.len() - 1);
        let items = &mut self.entry.pages[page].items;
        let index = index.min(items.len());
        items.insert(index, item);
    }

    /// Fold a fetched page into the entry by id.
    ///
    /// Returns the number of items that were new to the entry.
    pub(crate) fn settle(&mut self, direction: FetchDirection, page: Page, start: FetchStart) -> usize {
        let Page { items, next_cursor } = page;

        // Ids locally written after the fetch started keep their local copy
        let written_after = |id: &str| {
            self.local_writes
                .get(id)
                .map(|&rev| rev > start.revision)
                .unwrap_or(false)
        };

        let incoming: Vec<(Item, bool)> = items
            .into_iter()
            .filter(|item| !self.tombstones.contains_key(item.id()))
            .map(|item| {
                let keep_local = written_after(item.id());
                (item, keep_local)
            })
            .collect();

        let new_items = match direction {
            FetchDirection::Next => self.settle_next(incoming, next_cursor),
            FetchDirection::Newest => self.settle_newest(incoming, next_cursor),
        };

        if direction == FetchDirection::Newest && self.epoch == start.epoch {
            self.entry.stale = false;
        }
        self.loaded = true;
        self.failed = false;
        self.revision += 1;
        self.prune(start);
        new_items
    }

    /// Drop bookkeeping no later fetch can need: the next fetch of this key
    /// starts after this one settled
    fn prune(&mut self, start: FetchStart) {
        self.local_writes.retain(|_, rev| *rev > start.revision);
        self.tombstones.retain(|_, rev| *rev > start.revision);
    }

    fn settle_next(&mut self, incoming: Vec<(Item, bool)>, next_cursor: Option<crate::ports::Cursor>) -> usize {
        let mut fresh = Vec::with_capacity(incoming.len());
        for (item, keep_local) in incoming {
            match self.entry.find_mut(item.id()) {
                // Page-boundary overlap: adopt the newer copy in place
                Some(existing) => {
                    if !keep_local && *existing != item {
                        adopt(existing, item);
                    }
                }
                None => fresh.push(item),
            }
        }
        let added = fresh.len();
        self.entry.pages.push(Page::new(fresh, next_cursor));
        added
    }

    fn settle_newest(&mut self, incoming: Vec<(Item, bool)>, next_cursor: Option<crate::ports::Cursor>) -> usize {
        let mut first = Vec::with_capacity(incoming.len());
        let mut added = 0;
        for (item, keep_local) in incoming {
            match self.entry.find(item.id()) {
                Some(existing) if keep_local => first.push(existing.clone()),
                Some(_) => first.push(item),
                None => {
                    added += 1;
                    first.push(item);
                }
            }
        }

        let fresh_ids: HashSet<String> = first.iter().map(|i| i.id().to_string()).collect();
        let mut pages = vec![Page::new(first, next_cursor)];
        pages.extend(self.entry.pages.drain(..).skip(1).map(|mut page| {
            page.items.retain(|item| !fresh_ids.contains(item.id()));
            page
        }));
        self.entry.pages = pages;
        added
    }
}

/// Replace `existing` with `incoming`, keeping the pinned mark of a copy
/// that came from the account's pinned sub-feed
fn adopt(existing: &mut Item, mut incoming: Item) {
    if let (Item::Status(old), Item::Status(new)) = (&*existing, &mut incoming) {
        new.shown_pinned |= old.shown_pinned;
    }
    *existing = incoming;
}
