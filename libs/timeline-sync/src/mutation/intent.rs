//! Mutation intents and their transport requests

use crate::model::{Status, StatusFlag, Visibility};
use crate::ports::ApiRequest;
use serde::{Deserialize, Serialize};

/// The status a status-level intent acts on, as it is cached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTarget {
    pub id: String,
    #[serde(default)]
    pub uri: String,
    /// Seen through a foreign-instance view; `uri` must be resolved first
    #[serde(default)]
    pub remote: bool,
}

impl StatusTarget {
    pub fn local(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            uri: String::new(),
            remote: false,
        }
    }

    pub fn remote(id: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            uri: uri.into(),
            remote: true,
        }
    }
}

impl From<&Status> for StatusTarget {
    fn from(status: &Status) -> Self {
        Self {
            id: status.id.clone(),
            uri: status.uri.clone(),
            remote: status.remote,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "property", rename_all = "snake_case")]
pub enum StatusProperty {
    Favourited,
    Reblogged { visibility: Visibility },
    Bookmarked,
    Muted,
    Pinned,
}

impl StatusProperty {
    pub fn flag(&self) -> StatusFlag {
        match self {
            StatusProperty::Favourited => StatusFlag::Favourited,
            StatusProperty::Reblogged { .. } => StatusFlag::Reblogged,
            StatusProperty::Bookmarked => StatusFlag::Bookmarked,
            StatusProperty::Muted => StatusFlag::Muted,
            StatusProperty::Pinned => StatusFlag::Pinned,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PollAction {
    /// One boolean per poll option, `true` = chosen
    Vote { options: Vec<bool> },
    Refresh,
}

impl PollAction {
    /// Indexes of the chosen options
    pub fn choices(&self) -> Vec<usize> {
        match self {
            PollAction::Vote { options } => options
                .iter()
                .enumerate()
                .filter_map(|(i, &chosen)| chosen.then_some(i))
                .collect(),
            PollAction::Refresh => Vec::new(),
        }
    }
}

/// Collection a deleted item belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteSource {
    Statuses,
    Conversations,
}

impl DeleteSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeleteSource::Statuses => "statuses",
            DeleteSource::Conversations => "conversations",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountProperty {
    Mute,
    Block,
    Report,
}

/// One user action against the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MutationIntent {
    StatusProperty {
        status: StatusTarget,
        #[serde(flatten)]
        property: StatusProperty,
        to: bool,
    },
    Poll {
        status: StatusTarget,
        poll_id: String,
        #[serde(flatten)]
        action: PollAction,
    },
    DeleteItem {
        source: DeleteSource,
        id: String,
    },
    AccountProperty {
        account_id: String,
        property: AccountProperty,
        current_value: bool,
    },
    DomainBlock {
        domain: String,
    },
}

impl MutationIntent {
    pub fn favourite(status: StatusTarget, to: bool) -> Self {
        MutationIntent::StatusProperty {
            status,
            property: StatusProperty::Favourited,
            to,
        }
    }

    pub fn reblog(status: StatusTarget, to: bool, visibility: Visibility) -> Self {
        MutationIntent::StatusProperty {
            status,
            property: StatusProperty::Reblogged { visibility },
            to,
        }
    }

    pub fn bookmark(status: StatusTarget, to: bool) -> Self {
        MutationIntent::StatusProperty {
            status,
            property: StatusProperty::Bookmarked,
            to,
        }
    }

    pub fn delete_status(id: impl Into<String>) -> Self {
        MutationIntent::DeleteItem {
            source: DeleteSource::Statuses,
            id: id.into(),
        }
    }

    pub fn vote(status: StatusTarget, poll_id: impl Into<String>, options: Vec<bool>) -> Self {
        MutationIntent::Poll {
            status,
            poll_id: poll_id.into(),
            action: PollAction::Vote { options },
        }
    }

    /// Short label for metrics and logs
    pub fn label(&self) -> &'static str {
        match self {
            MutationIntent::StatusProperty { property, .. } => property.flag().action(),
            MutationIntent::Poll {
                action: PollAction::Vote { .. },
                ..
            } => "poll_vote",
            MutationIntent::Poll {
                action: PollAction::Refresh,
                ..
            } => "poll_refresh",
            MutationIntent::DeleteItem { .. } => "delete",
            MutationIntent::AccountProperty { property, .. } => match property {
                AccountProperty::Mute => "account_mute",
                AccountProperty::Block => "account_block",
                AccountProperty::Report => "report",
            },
            MutationIntent::DomainBlock { .. } => "domain_block",
        }
    }

    /// Status id that must be resolved through the lookup, if any
    pub fn remote_target(&self) -> Option<&StatusTarget> {
        match self {
            MutationIntent::StatusProperty { status, .. } if status.remote => Some(status),
            _ => None,
        }
    }

    /// Transport request; `resolved_id` replaces the cached status id
    pub fn request(&self, resolved_id: Option<&str>) -> ApiRequest {
        match self {
            MutationIntent::StatusProperty {
                status,
                property,
                to,
            } => {
                let id = resolved_id.unwrap_or(&status.id);
                let prefix = if *to { "" } else { "un" };
                let request =
                    ApiRequest::post(format!("statuses/{}/{}{}", id, prefix, property.flag().action()));
                match property {
                    StatusProperty::Reblogged { visibility } => {
                        request.form_field("visibility", visibility.as_str())
                    }
                    _ => request,
                }
            }
            MutationIntent::Poll {
                poll_id, action, ..
            } => match action {
                PollAction::Vote { .. } => action.choices().into_iter().fold(
                    ApiRequest::post(format!("polls/{}/votes", poll_id)),
                    |request, choice| request.form_field("choices[]", choice.to_string()),
                ),
                PollAction::Refresh => ApiRequest::get(format!("polls/{}", poll_id)),
            },
            MutationIntent::DeleteItem { source, id } => {
                ApiRequest::delete(format!("{}/{}", source.as_str(), id))
            }
            MutationIntent::AccountProperty {
                account_id,
                property,
                current_value,
            } => match property {
                AccountProperty::Mute | AccountProperty::Block => {
                    let prefix = if *current_value { "un" } else { "" };
                    let action = if *property == AccountProperty::Mute {
                        "mute"
                    } else {
                        "block"
                    };
                    ApiRequest::post(format!("accounts/{}/{}{}", account_id, prefix, action))
                }
                AccountProperty::Report => {
                    ApiRequest::post("reports").param("account_id", account_id.as_str())
                }
            },
            MutationIntent::DomainBlock { domain } => {
                ApiRequest::post("domain_blocks").param("domain", domain.as_str())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::Method;
    use serde_json::json;

    #[test]
    fn test_status_property_requests() {
        let req = MutationIntent::favourite(StatusTarget::local("9"), true).request(None);
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.path, "statuses/9/favourite");

        let req = MutationIntent::bookmark(StatusTarget::local("9"), false).request(None);
        assert_eq!(req.path, "statuses/9/unbookmark");

        let req = MutationIntent::reblog(StatusTarget::remote("9", "https://far/9"), true, Visibility::Unlisted)
            .request(Some("42"));
        assert_eq!(req.path, "statuses/42/reblog");
        assert_eq!(
            req.form,
            vec![("visibility".to_string(), "unlisted".to_string())]
        );
    }

    #[test]
    fn test_poll_vote_sends_chosen_indexes() {
        let intent = MutationIntent::vote(StatusTarget::local("1"), "p1", vec![true, false, true]);
        let req = intent.request(None);
        assert_eq!(req.path, "polls/p1/votes");
        let choices: Vec<&str> = req
            .form
            .iter()
            .filter(|(n, _)| n == "choices[]")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(choices, vec!["0", "2"]);
    }

    #[test]
    fn test_account_and_domain_requests() {
        let unmute = MutationIntent::AccountProperty {
            account_id: "7".to_string(),
            property: AccountProperty::Mute,
            current_value: true,
        };
        assert_eq!(unmute.request(None).path, "accounts/7/unmute");

        let block = MutationIntent::AccountProperty {
            account_id: "7".to_string(),
            property: AccountProperty::Block,
            current_value: false,
        };
        assert_eq!(block.request(None).path, "accounts/7/block");

        let report = MutationIntent::AccountProperty {
            account_id: "7".to_string(),
            property: AccountProperty::Report,
            current_value: false,
        };
        let req = report.request(None);
        assert_eq!(req.path, "reports");
        assert_eq!(req.param_value("account_id"), Some("7"));

        let req = MutationIntent::DomainBlock {
            domain: "spam.example".to_string(),
        }
        .request(None);
        assert_eq!(req.path, "domain_blocks");
        assert_eq!(req.param_value("domain"), Some("spam.example"));
    }

    #[test]
    fn test_delete_request_and_label() {
        let intent = MutationIntent::DeleteItem {
            source: DeleteSource::Conversations,
            id: "c1".to_string(),
        };
        assert_eq!(intent.request(None).method, Method::Delete);
        assert_eq!(intent.request(None).path, "conversations/c1");
        assert_eq!(intent.label(), "delete");
    }

    #[test]
    fn test_only_remote_status_targets_need_resolution() {
        let local = MutationIntent::favourite(StatusTarget::local("1"), true);
        assert!(local.remote_target().is_none());

        let remote = MutationIntent::favourite(StatusTarget::remote("1", "https://far/1"), true);
        assert_eq!(remote.remote_target().unwrap().uri, "https://far/1");
    }

    #[test]
    fn test_intent_serialization() {
        let value = serde_json::to_value(MutationIntent::reblog(
            StatusTarget::local("1"),
            true,
            Visibility::Public,
        ))
        .unwrap();
        assert_eq!(
            value,
            json!({
                "type": "status_property",
                "status": {"id": "1", "uri": "", "remote": false},
                "property": "reblogged",
                "visibility": "public",
                "to": true
            })
        );
    }
}
