//! Request-time notification filtering
//!
//! Turns the stored `category -> included` mapping into either an include
//! list (`types[]`, when the instance supports positive filtering) or an
//! exclude list (`exclude_types[]`).

use crate::ports::ApiRequest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Categories every account can receive
pub const DEFAULT_CATEGORIES: [&str; 8] = [
    "follow",
    "follow_request",
    "favourite",
    "reblog",
    "mention",
    "poll",
    "status",
    "update",
];

pub type NotificationPreferences = BTreeMap<String, bool>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationFilter {
    /// No stored preferences: let the server return everything
    Unfiltered,
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl NotificationFilter {
    pub fn compute(preferences: Option<&NotificationPreferences>, positive_supported: bool) -> Self {
        let preferences = match preferences {
            Some(p) if !p.is_empty() => p,
            _ => return NotificationFilter::Unfiltered,
        };

        let enabled = categories_where(preferences, true);
        let disabled = categories_where(preferences, false);

        // An empty include list would widen the result to every category
        if positive_supported && !enabled.is_empty() {
            NotificationFilter::Include(enabled)
        } else if disabled.is_empty() {
            NotificationFilter::Unfiltered
        } else {
            NotificationFilter::Exclude(disabled)
        }
    }

    pub fn apply(&self, mut request: ApiRequest) -> ApiRequest {
        let (name, values) = match self {
            NotificationFilter::Unfiltered => return request,
            NotificationFilter::Include(v) => ("types[]", v),
            NotificationFilter::Exclude(v) => ("exclude_types[]", v),
        };
        for value in values {
            request = request.param(name, value.as_str());
        }
        request
    }
}

fn categories_where(preferences: &NotificationPreferences, included: bool) -> Vec<String> {
    preferences
        .iter()
        .filter(|&(_, &v)| v == included)
        .map(|(k, _)| k.clone())
        .collect()
}

/// Read a stored mapping, skipping entries that are not booleans
pub fn preferences_from_value(value: &serde_json::Value) -> Option<NotificationPreferences> {
    let object = value.as_object()?;
    Some(
        object
            .iter()
            .filter_map(|(k, v)| v.as_bool().map(|b| (k.clone(), b)))
            .collect(),
    )
}

/// Every default category included, then `overrides` on top
pub fn with_defaults(overrides: Option<&NotificationPreferences>) -> NotificationPreferences {
    let mut preferences: NotificationPreferences = DEFAULT_CATEGORIES
        .iter()
        .map(|c| (c.to_string(), true))
        .collect();
    if let Some(overrides) = overrides {
        preferences.extend(overrides.iter().map(|(k, v)| (k.clone(), *v)));
    }
    preferences
}
