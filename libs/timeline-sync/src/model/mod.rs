//! Feed item model
//!
//! Items are a closed union over the three record kinds a feed can hold.
//! Every merge and mutation path dispatches on the variant.

mod status;

pub use status::{Account, Poll, PollOption, Status, StatusFlag, Visibility};

use crate::ports::Cursor;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub category: String,
    pub account: Account,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub unread: bool,
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub last_status: Option<Status>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Discriminant of [`Item`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Status,
    Notification,
    Conversation,
}

/// One cached feed entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "item_type", rename_all = "snake_case")]
pub enum Item {
    Status(Status),
    Notification(Notification),
    Conversation(Conversation),
}

impl Item {
    pub fn id(&self) -> &str {
        match self {
            Item::Status(s) => &s.id,
            Item::Notification(n) => &n.id,
            Item::Conversation(c) => &c.id,
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            Item::Status(_) => ItemKind::Status,
            Item::Notification(_) => ItemKind::Notification,
            Item::Conversation(_) => ItemKind::Conversation,
        }
    }

    pub fn as_status(&self) -> Option<&Status> {
        match self {
            Item::Status(s) => Some(s),
            _ => None,
        }
    }

    /// The status this item shows, if any
    pub fn status(&self) -> Option<&Status> {
        match self {
            Item::Status(s) => Some(s),
            Item::Notification(n) => n.status.as_ref(),
            Item::Conversation(c) => c.last_status.as_ref(),
        }
    }

    pub fn status_mut(&mut self) -> Option<&mut Status> {
        match self {
            Item::Status(s) => Some(s),
            Item::Notification(n) => n.status.as_mut(),
            Item::Conversation(c) => c.last_status.as_mut(),
        }
    }

    /// Set a status flag wherever `status_id` appears inside this item
    pub fn set_status_flag(&mut self, status_id: &str, flag: StatusFlag, value: bool) -> bool {
        match self.status_mut() {
            Some(status) => status.set_flag(status_id, flag, value),
            None => false,
        }
    }

    pub fn status_flag(&self, status_id: &str, flag: StatusFlag) -> Option<bool> {
        self.status().and_then(|s| s.flag_of(status_id, flag))
    }
}

/// One fetched slice of a feed. `next_cursor: None` marks end-of-feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub items: Vec<Item>,
    pub next_cursor: Option<Cursor>,
}

impl Page {
    pub fn new(items: Vec<Item>, next_cursor: Option<Cursor>) -> Self {
        Self { items, next_cursor }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(Item::id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn notification_with_status() -> Item {
        let n: Notification = serde_json::from_value(json!({
            "id": "n1",
            "type": "mention",
            "created_at": "2024-01-01T00:00:00Z",
            "account": {"id": "a1", "acct": "alice"},
            "status": {"id": "s1", "account": {"id": "a2"}}
        }))
        .unwrap();
        Item::Notification(n)
    }

    #[test]
    fn test_item_id_and_kind() {
        let item = notification_with_status();
        assert_eq!(item.id(), "n1");
        assert_eq!(item.kind(), ItemKind::Notification);
        assert!(item.as_status().is_none());
    }

    #[test]
    fn test_flag_reaches_nested_status() {
        let mut item = notification_with_status();
        assert!(item.set_status_flag("s1", StatusFlag::Bookmarked, true));
        assert_eq!(item.status_flag("s1", StatusFlag::Bookmarked), Some(true));
        assert_eq!(item.status_flag("n1", StatusFlag::Bookmarked), None);
    }

    #[test]
    fn test_conversation_without_status() {
        let mut item = Item::Conversation(Conversation {
            id: "c1".to_string(),
            unread: true,
            accounts: vec![],
            last_status: None,
            extra: Map::new(),
        });
        assert!(!item.set_status_flag("s1", StatusFlag::Muted, true));
        assert_eq!(item.status_flag("s1", StatusFlag::Muted), None);
    }

    #[test]
    fn test_tagged_serialization() {
        let value = serde_json::to_value(notification_with_status()).unwrap();
        assert_eq!(value["item_type"], "notification");
        assert_eq!(value["type"], "mention");
        assert_eq!(value["created_at"], "2024-01-01T00:00:00Z");

        let back: Item = serde_json::from_value(value).unwrap();
        assert_eq!(back, notification_with_status());
    }
}
