//! Status records as read from the remote service

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Account reference carried by statuses and notifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    #[serde(default)]
    pub acct: String,
    /// Server fields the engine does not read, kept for rendering
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Visibility a boost is published with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Unlisted,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Unlisted => "unlisted",
            Visibility::Private => "private",
        }
    }
}

/// Togglable interaction flags on a status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFlag {
    Favourited,
    Reblogged,
    Bookmarked,
    Muted,
    Pinned,
}

impl StatusFlag {
    /// Field name in the server's status representation
    pub fn field(&self) -> &'static str {
        match self {
            StatusFlag::Favourited => "favourited",
            StatusFlag::Reblogged => "reblogged",
            StatusFlag::Bookmarked => "bookmarked",
            StatusFlag::Muted => "muted",
            StatusFlag::Pinned => "pinned",
        }
    }

    /// Action segment of `statuses/{id}/{action}`
    pub fn action(&self) -> &'static str {
        match self {
            StatusFlag::Favourited => "favourite",
            StatusFlag::Reblogged => "reblog",
            StatusFlag::Bookmarked => "bookmark",
            StatusFlag::Muted => "mute",
            StatusFlag::Pinned => "pin",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollOption {
    pub title: String,
    #[serde(default)]
    pub votes_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poll {
    pub id: String,
    #[serde(default)]
    pub expired: bool,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default)]
    pub votes_count: u64,
    #[serde(default)]
    pub voters_count: Option<u64>,
    #[serde(default)]
    pub voted: bool,
    #[serde(default)]
    pub own_votes: Vec<usize>,
    #[serde(default)]
    pub options: Vec<PollOption>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Poll {
    /// Record a local vote. Returns false when the poll cannot take it.
    pub fn apply_vote(&mut self, choices: &[usize]) -> bool {
        if self.voted || self.expired || choices.is_empty() {
            return false;
        }
        if choices.iter().any(|&c| c >= self.options.len()) {
            return false;
        }

        for &choice in choices {
            if let Some(count) = self.options[choice].votes_count.as_mut() {
                *count += 1;
            }
        }
        self.votes_count += choices.len() as u64;
        if let Some(voters) = self.voters_count.as_mut() {
            *voters += 1;
        }
        self.voted = true;
        self.own_votes = choices.to_vec();
        true
    }
}

/// A post. `reblog` holds the original when this record is a boost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub id: String,
    #[serde(default)]
    pub uri: String,
    pub account: Account,
    #[serde(default)]
    pub in_reply_to_id: Option<String>,
    #[serde(default)]
    pub reblog: Option<Box<Status>>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub favourited: bool,
    #[serde(default)]
    pub reblogged: bool,
    #[serde(default)]
    pub bookmarked: bool,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub poll: Option<Poll>,
    /// Observed through a foreign-instance view; needs a local id before mutation
    #[serde(default, rename = "_remote")]
    pub remote: bool,
    /// Came from the account's pinned sub-feed
    #[serde(default, rename = "_pinned")]
    pub shown_pinned: bool,
    /// Everything else the server sent: media, card, counts, timestamps
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Status {
    pub fn flag(&self, flag: StatusFlag) -> bool {
        match flag {
            StatusFlag::Favourited => self.favourited,
            StatusFlag::Reblogged => self.reblogged,
            StatusFlag::Bookmarked => self.bookmarked,
            StatusFlag::Muted => self.muted,
            StatusFlag::Pinned => self.pinned,
        }
    }

    fn flag_mut(&mut self, flag: StatusFlag) -> &mut bool {
        match flag {
            StatusFlag::Favourited => &mut self.favourited,
            StatusFlag::Reblogged => &mut self.reblogged,
            StatusFlag::Bookmarked => &mut self.bookmarked,
            StatusFlag::Muted => &mut self.muted,
            StatusFlag::Pinned => &mut self.pinned,
        }
    }

    pub fn is_boost(&self) -> bool {
        self.reblog.is_some()
    }

    pub fn is_reply(&self) -> bool {
        self.in_reply_to_id
            .as_deref()
            .map(|id| !id.is_empty())
            .unwrap_or(false)
    }

    /// Visit this record and the boosted original, if any
    pub fn for_each_record_mut(&mut self, f: &mut dyn FnMut(&mut Status) -> bool) -> bool {
        let mut changed = f(self);
        if let Some(inner) = self.reblog.as_deref_mut() {
            changed |= f(inner);
        }
        changed
    }

    pub fn records(&self) -> impl Iterator<Item = &Status> {
        std::iter::once(self).chain(self.reblog.as_deref())
    }

    /// Set `flag` on whichever record (outer boost or inner original) has `id`
    pub fn set_flag(&mut self, id: &str, flag: StatusFlag, value: bool) -> bool {
        self.for_each_record_mut(&mut |record| {
            if record.id == id && record.flag(flag) != value {
                *record.flag_mut(flag) = value;
                true
            } else {
                false
            }
        })
    }

    /// Current value of `flag` on the record with `id`
    pub fn flag_of(&self, id: &str, flag: StatusFlag) -> Option<bool> {
        self.records().find(|r| r.id == id).map(|r| r.flag(flag))
    }

    pub fn poll_of(&self, poll_id: &str) -> Option<&Poll> {
        self.records()
            .filter_map(|r| r.poll.as_ref())
            .find(|p| p.id == poll_id)
    }

    /// Apply `f` to every poll with `poll_id` in this status
    pub fn update_poll(&mut self, poll_id: &str, f: &mut dyn FnMut(&mut Poll) -> bool) -> bool {
        self.for_each_record_mut(&mut |record| match record.poll.as_mut() {
            Some(poll) if poll.id == poll_id => f(poll),
            _ => false,
        })
    }
}
