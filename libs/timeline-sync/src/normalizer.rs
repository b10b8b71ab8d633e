//! Raw response → cached items
//!
//! Decoding dispatches on the feed kind, never on the shape of the JSON.
//! Post-hoc filters and the pinned merge live here so the paginator only
//! deals with requests and cursors.

use crate::error::{TimelineError, TimelineResult};
use crate::feed_key::FeedKind;
use crate::model::{Conversation, Item, Notification, Status};
use serde::de::DeserializeOwned;
use std::collections::HashSet;

/// Decode a response body for a feed of `kind`.
///
/// Duplicate ids inside one response collapse to their first occurrence.
pub fn decode_items(kind: FeedKind, body: &serde_json::Value) -> TimelineResult<Vec<Item>> {
    let raw = body.as_array().ok_or_else(|| {
        TimelineError::Consistency(format!("{} response is not an array", kind))
    })?;

    let items = match kind {
        FeedKind::Notifications => decode_all::<Notification>(raw)?
            .into_iter()
            .map(Item::Notification)
            .collect(),
        FeedKind::Conversations => decode_all::<Conversation>(raw)?
            .into_iter()
            .map(Item::Conversation)
            .collect(),
        _ => decode_all::<Status>(raw)?
            .into_iter()
            .map(Item::Status)
            .collect(),
    };

    Ok(dedup_by_id(items))
}

fn decode_all<T: DeserializeOwned>(raw: &[serde_json::Value]) -> TimelineResult<Vec<T>> {
    raw.iter()
        .map(|v| serde_json::from_value(v.clone()).map_err(TimelineError::from))
        .collect()
}

/// Keep the first occurrence of every id, preserving order
pub fn dedup_by_id(items: Vec<Item>) -> Vec<Item> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.id().to_string()))
        .collect()
}

/// Drop boosts and/or replies from a home-timeline page
pub fn filter_following(items: Vec<Item>, show_boosts: bool, show_replies: bool) -> Vec<Item> {
    if show_boosts && show_replies {
        return items;
    }

    items
        .into_iter()
        .filter(|item| match item.as_status() {
            Some(status) => {
                !(!show_boosts && status.is_boost()) && !(!show_replies && status.is_reply())
            }
            None => true,
        })
        .collect()
}

/// Union pinned and regular statuses of an account.
///
/// Pinned statuses come first and win on id conflicts; each is marked as
/// shown pinned.
pub fn merge_pinned(pinned: Vec<Item>, regular: Vec<Item>) -> Vec<Item> {
    let pinned = pinned.into_iter().map(|mut item| {
        if let Item::Status(status) = &mut item {
            status.shown_pinned = true;
        }
        item
    });
    dedup_by_id(pinned.chain(regular).collect())
}
