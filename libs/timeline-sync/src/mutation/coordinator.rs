//! Optimistic mutation with guaranteed rollback

use super::intent::{DeleteSource, MutationIntent, PollAction, StatusProperty};
use super::state::{MutationState, MutationTrace};
use crate::cache::{EntrySnapshot, ItemEdit, TimelineCache};
use crate::error::{TimelineError, TimelineResult};
use crate::feed_key::{FeedKey, FeedKeyPrefix, FeedKind};
use crate::metrics::TimelineMetrics;
use crate::model::{Item, ItemKind, Poll};
use crate::ports::StatusLookup;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What one `mutate` call went through
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationOutcome {
    pub trace: Vec<MutationState>,
    /// Server response; `None` when the call was a no-op
    pub body: Option<serde_json::Value>,
}

impl MutationOutcome {
    fn noop() -> Self {
        Self {
            trace: vec![MutationState::Idle],
            body: None,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.body.is_none()
    }
}

pub struct MutationCoordinator {
    cache: TimelineCache,
    lookup: Arc<dyn StatusLookup>,
    metrics: TimelineMetrics,
}

impl MutationCoordinator {
    pub fn new(cache: TimelineCache, lookup: Arc<dyn StatusLookup>) -> Self {
        Self {
            cache,
            lookup,
            metrics: TimelineMetrics::new(),
        }
    }

    /// Apply `intent` optimistically, call the server, then keep or roll back.
    ///
    /// `origin` is the feed the action came from; it is invalidated after
    /// the call whatever the outcome.
    pub async fn mutate(&self, origin: &FeedKey, intent: &MutationIntent) -> TimelineResult<MutationOutcome> {
        let label = intent.label();

        let resolved_id = match self.resolve(intent).await {
            Ok(id) => id,
            Err(err) => {
                self.metrics.record_mutation(label, "unresolved");
                return Err(err);
            }
        };

        if self.already_applied(intent) {
            debug!(feed = %origin, intent = label, "Mutation already reflected in cache, skipping");
            self.metrics.record_mutation(label, "noop");
            return Ok(MutationOutcome::noop());
        }

        let mut trace = MutationTrace::new();
        trace.advance(MutationState::Applying)?;
        let snapshots = self.apply_optimistic(intent);
        debug!(
            feed = %origin,
            intent = label,
            state = %trace.state(),
            entries = snapshots.len(),
            "Optimistic state committed"
        );

        let request = intent.request(resolved_id.as_deref());
        let result = match self.cache.paginator().transport().request(request).await {
            Ok(response) => confirm(intent, response.body),
            Err(err) => Err(TimelineError::from(err)),
        };

        let result = match result {
            Ok(body) => {
                trace.advance(MutationState::Settled)?;
                self.settle(intent, &body);
                Ok(body)
            }
            Err(err) => {
                trace.advance(MutationState::RolledBack)?;
                self.roll_back(label, &snapshots);
                warn!(
                    feed = %origin,
                    intent = label,
                    error = %err,
                    restored = snapshots.len(),
                    "Mutation failed, optimistic state rolled back"
                );
                Err(err)
            }
        };

        trace.advance(MutationState::Reconciling)?;
        self.cache.invalidate(origin);
        trace.advance(MutationState::Idle)?;

        match result {
            Ok(body) => {
                self.metrics.record_mutation(label, "settled");
                Ok(MutationOutcome {
                    trace: trace.into_history(),
                    body: Some(body),
                })
            }
            Err(err) => {
                self.metrics.record_mutation(label, "rolled_back");
                Err(err)
            }
        }
    }

    async fn resolve(&self, intent: &MutationIntent) -> TimelineResult<Option<String>> {
        let target = match intent.remote_target() {
            Some(target) => target,
            None => return Ok(None),
        };
        if target.uri.is_empty() {
            return Err(TimelineError::Resolution(format!(
                "remote status {} has no uri",
                target.id
            )));
        }

        match self.lookup.resolve_remote_status(&target.uri).await {
            Ok(Some(local_id)) => {
                debug!(uri = %target.uri, local_id = %local_id, "Resolved remote status");
                Ok(Some(local_id))
            }
            Ok(None) => Err(TimelineError::Resolution(format!(
                "no local copy of {}",
                target.uri
            ))),
            Err(err) => Err(TimelineError::Resolution(format!(
                "lookup of {} failed: {}",
                target.uri, err
            ))),
        }
    }

    /// True when every cached copy of the target already has the requested flag
    fn already_applied(&self, intent: &MutationIntent) -> bool {
        let (status_id, flag, to) = match intent {
            MutationIntent::StatusProperty {
                status,
                property,
                to,
            } => (status.id.as_str(), property.flag(), *to),
            _ => return false,
        };

        let mut copies = 0;
        let mut matching = 0;
        self.cache.visit_items(&mut |_, item| {
            if let Some(value) = item.status_flag(status_id, flag) {
                copies += 1;
                if value == to {
                    matching += 1;
                }
            }
        });
        copies > 0 && copies == matching
    }

    fn apply_optimistic(&self, intent: &MutationIntent) -> Vec<EntrySnapshot> {
        match intent {
            MutationIntent::StatusProperty {
                status,
                property,
                to,
            } => {
                let flag = property.flag();
                self.cache.apply_everywhere(&mut |item| {
                    if item.set_status_flag(&status.id, flag, *to) {
                        ItemEdit::Modified
                    } else {
                        ItemEdit::Unchanged
                    }
                })
            }
            MutationIntent::Poll {
                poll_id,
                action: action @ PollAction::Vote { .. },
                ..
            } => {
                let choices = action.choices();
                self.cache.apply_everywhere(&mut |item| {
                    let voted = item
                        .status_mut()
                        .map(|s| s.update_poll(poll_id, &mut |poll| poll.apply_vote(&choices)))
                        .unwrap_or(false);
                    if voted {
                        ItemEdit::Modified
                    } else {
                        ItemEdit::Unchanged
                    }
                })
            }
            MutationIntent::DeleteItem { source, id } => self.remove_everywhere(*source, id),
            _ => Vec::new(),
        }
    }

    fn remove_everywhere(&self, source: DeleteSource, id: &str) -> Vec<EntrySnapshot> {
        let kind = match source {
            DeleteSource::Statuses => ItemKind::Status,
            DeleteSource::Conversations => ItemKind::Conversation,
        };
        self.cache.apply_everywhere(&mut |item| {
            if item.kind() == kind && item.id() == id {
                ItemEdit::Remove
            } else {
                ItemEdit::Unchanged
            }
        })
    }

    fn settle(&self, intent: &MutationIntent, body: &serde_json::Value) {
        match intent {
            MutationIntent::StatusProperty {
                property: StatusProperty::Reblogged { .. },
                ..
            } => {
                let count = self
                    .cache
                    .invalidate_prefix(&FeedKeyPrefix::Kind(FeedKind::Following));
                info!(count, "Boost settled, following feeds invalidated");
            }
            MutationIntent::DeleteItem { source, id } => {
                self.remove_everywhere(*source, id);
            }
            MutationIntent::Poll { poll_id, .. } => {
                // confirm() already checked the shape
                if let Ok(server) = serde_json::from_value::<Poll>(body.clone()) {
                    self.adopt_poll(poll_id, &server);
                }
            }
            _ => {}
        }
    }

    fn adopt_poll(&self, poll_id: &str, server: &Poll) {
        self.cache.apply_everywhere(&mut |item: &mut Item| {
            let changed = item
                .status_mut()
                .map(|s| {
                    s.update_poll(poll_id, &mut |poll| {
                        if poll == server {
                            false
                        } else {
                            *poll = server.clone();
                            true
                        }
                    })
                })
                .unwrap_or(false);
            if changed {
                ItemEdit::Modified
            } else {
                ItemEdit::Unchanged
            }
        });
    }

    fn roll_back(&self, label: &str, snapshots: &[EntrySnapshot]) {
        for snapshot in snapshots.iter().rev() {
            if let Some(mode) = self.cache.restore(snapshot) {
                debug!(feed = %snapshot.key(), mode = ?mode, "Rolled back entry");
                self.metrics.record_rollback(label);
            }
        }
    }
}

/// Check the server response agrees with what the intent asked for
fn confirm(intent: &MutationIntent, body: serde_json::Value) -> TimelineResult<serde_json::Value> {
    match intent {
        MutationIntent::DeleteItem { id, .. } => {
            if let Some(returned) = body.get("id").and_then(|v| v.as_str()) {
                if returned != id {
                    return Err(TimelineError::Consistency(format!(
                        "deleted {} but server returned {}",
                        id, returned
                    )));
                }
            }
        }
        MutationIntent::StatusProperty { property, to, .. } => {
            let field = property.flag().field();
            if let Some(value) = body.get(field).and_then(|v| v.as_bool()) {
                if value != *to {
                    return Err(TimelineError::Consistency(format!(
                        "server reports {} = {}, requested {}",
                        field, value, to
                    )));
                }
            }
        }
        MutationIntent::Poll { .. } => {
            serde_json::from_value::<Poll>(body.clone())?;
        }
        _ => {}
    }
    Ok(body)
}
