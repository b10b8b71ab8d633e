//! Feed identity
//!
//! A [`FeedKey`] names one logical feed: its kind plus the parameters that
//! kind takes. Structural equality is cache identity and single-flight
//! identity. Display format: `Timeline:{Kind}[:{param}...]`

use crate::error::{TimelineError, TimelineResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of feed kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedKind {
    Following,
    Local,
    LocalPublic,
    Trending,
    Notifications,
    Account,
    Hashtag,
    List,
    Conversations,
    Bookmarks,
    Favourites,
}

impl FeedKind {
    pub const ALL: [FeedKind; 11] = [
        FeedKind::Following,
        FeedKind::Local,
        FeedKind::LocalPublic,
        FeedKind::Trending,
        FeedKind::Notifications,
        FeedKind::Account,
        FeedKind::Hashtag,
        FeedKind::List,
        FeedKind::Conversations,
        FeedKind::Bookmarks,
        FeedKind::Favourites,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedKind::Following => "Following",
            FeedKind::Local => "Local",
            FeedKind::LocalPublic => "LocalPublic",
            FeedKind::Trending => "Trending",
            FeedKind::Notifications => "Notifications",
            FeedKind::Account => "Account",
            FeedKind::Hashtag => "Hashtag",
            FeedKind::List => "List",
            FeedKind::Conversations => "Conversations",
            FeedKind::Bookmarks => "Bookmarks",
            FeedKind::Favourites => "Favourites",
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedKind {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeedKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| TimelineError::Configuration(format!("unknown feed kind: {}", s)))
    }
}

/// Identity of one logical feed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "page")]
pub enum FeedKey {
    Following {
        #[serde(rename = "showBoosts")]
        show_boosts: bool,
        #[serde(rename = "showReplies")]
        show_replies: bool,
    },
    Local,
    LocalPublic,
    Trending,
    Notifications,
    Account {
        #[serde(default)]
        id: Option<String>,
        exclude_reblogs: bool,
        only_media: bool,
    },
    Hashtag {
        hashtag: String,
    },
    List {
        list: String,
    },
    Conversations,
    Bookmarks,
    Favourites,
}

impl FeedKey {
    /// Home timeline with boosts and replies shown
    pub fn following() -> Self {
        FeedKey::Following {
            show_boosts: true,
            show_replies: true,
        }
    }

    pub fn account(id: impl Into<String>, exclude_reblogs: bool, only_media: bool) -> Self {
        FeedKey::Account {
            id: Some(id.into()),
            exclude_reblogs,
            only_media,
        }
    }

    pub fn hashtag(tag: impl Into<String>) -> Self {
        FeedKey::Hashtag {
            hashtag: tag.into(),
        }
    }

    pub fn list(id: impl Into<String>) -> Self {
        FeedKey::List { list: id.into() }
    }

    pub fn kind(&self) -> FeedKind {
        match self {
            FeedKey::Following { .. } => FeedKind::Following,
            FeedKey::Local => FeedKind::Local,
            FeedKey::LocalPublic => FeedKind::LocalPublic,
            FeedKey::Trending => FeedKind::Trending,
            FeedKey::Notifications => FeedKind::Notifications,
            FeedKey::Account { .. } => FeedKind::Account,
            FeedKey::Hashtag { .. } => FeedKind::Hashtag,
            FeedKey::List { .. } => FeedKind::List,
            FeedKey::Conversations => FeedKind::Conversations,
            FeedKey::Bookmarks => FeedKind::Bookmarks,
            FeedKey::Favourites => FeedKind::Favourites,
        }
    }

    /// Fail fast when a kind's required parameter is missing
    pub fn validate(&self) -> TimelineResult<()> {
        match self {
            FeedKey::Account { id, .. } if id.as_deref().map_or(true, str::is_empty) => Err(
                TimelineError::Configuration("account feed requires an account id".to_string()),
            ),
            FeedKey::Hashtag { hashtag } if hashtag.is_empty() => Err(
                TimelineError::Configuration("hashtag feed requires a tag name".to_string()),
            ),
            FeedKey::List { list } if list.is_empty() => Err(TimelineError::Configuration(
                "list feed requires a list id".to_string(),
            )),
            _ => Ok(()),
        }
    }

    pub fn account_id(&self) -> Option<&str> {
        match self {
            FeedKey::Account { id, .. } => id.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for FeedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timeline:{}", self.kind())?;
        match self {
            FeedKey::Following {
                show_boosts,
                show_replies,
            } => write!(f, ":boosts={}:replies={}", show_boosts, show_replies),
            FeedKey::Account {
                id,
                exclude_reblogs,
                only_media,
            } => write!(
                f,
                ":{}:exclude_reblogs={}:only_media={}",
                id.as_deref().unwrap_or("-"),
                exclude_reblogs,
                only_media
            ),
            FeedKey::Hashtag { hashtag } => write!(f, ":{}", hashtag),
            FeedKey::List { list } => write!(f, ":{}", list),
            _ => Ok(()),
        }
    }
}

/// Predicate over feed keys for bulk invalidation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedKeyPrefix {
    All,
    Kind(FeedKind),
    /// Every Account feed of one account, whatever its filters
    Account(String),
}

impl FeedKeyPrefix {
    pub fn matches(&self, key: &FeedKey) -> bool {
        match self {
            FeedKeyPrefix::All => true,
            FeedKeyPrefix::Kind(kind) => key.kind() == *kind,
            FeedKeyPrefix::Account(account_id) => key.account_id() == Some(account_id.as_str()),
        }
    }
}

impl From<FeedKind> for FeedKeyPrefix {
    fn from(kind: FeedKind) -> Self {
        FeedKeyPrefix::Kind(kind)
    }
}
