//! Optimistic mutations: apply, confirm, roll back, reconcile

mod common;

use common::{engine, engine_with, ids, status, statuses, MockLookup, ScriptedTransport};
use serde_json::json;
use std::sync::Arc;
use timeline_sync::model::{StatusFlag, Visibility};
use timeline_sync::{
    ApiResponse, FeedKey, HttpError, Method, MutationIntent, MutationState, StatusTarget,
    TimelineEngine, TimelineError,
};

async fn load(engine: &TimelineEngine, key: &FeedKey) {
    engine.feed(key.clone()).load().await.unwrap();
}

fn flag(engine: &TimelineEngine, key: &FeedKey, id: &str, flag: StatusFlag) -> Option<bool> {
    engine
        .cache()
        .items(key)
        .iter()
        .find_map(|item| item.status_flag(id, flag))
}

#[tokio::test]
async fn test_delete_from_favourites() {
    let transport = ScriptedTransport::new();
    transport.respond(Method::Get, "favourites", ApiResponse::new(statuses(&["a", "b", "c"])));
    transport.respond(Method::Delete, "statuses/b", ApiResponse::new(status("b")));
    let engine = engine(transport.clone());
    let key = FeedKey::Favourites;
    load(&engine, &key).await;

    let outcome = engine
        .mutate(&key, &MutationIntent::delete_status("b"))
        .await
        .unwrap();

    assert_eq!(ids(&engine, &key), vec!["a", "c"]);
    assert_eq!(
        outcome.trace,
        vec![
            MutationState::Idle,
            MutationState::Applying,
            MutationState::Settled,
            MutationState::Reconciling,
            MutationState::Idle
        ]
    );
    assert!(engine.cache().is_stale(&key));
    assert_eq!(transport.count(Method::Delete, "statuses/b"), 1);
}

#[tokio::test]
async fn test_delete_with_mismatched_id_rolls_back() {
    let transport = ScriptedTransport::new();
    transport.respond(Method::Get, "favourites", ApiResponse::new(statuses(&["a", "b", "c"])));
    transport.respond(Method::Delete, "statuses/b", ApiResponse::new(status("z")));
    let engine = engine(transport);
    let key = FeedKey::Favourites;
    load(&engine, &key).await;

    let err = engine
        .mutate(&key, &MutationIntent::delete_status("b"))
        .await
        .unwrap_err();

    assert!(matches!(err, TimelineError::Consistency(_)));
    assert_eq!(ids(&engine, &key), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_failed_reblog_restores_exactly() {
    let transport = ScriptedTransport::new();
    transport.respond(Method::Get, "timelines/public", ApiResponse::new(statuses(&["a", "b"])));
    transport.respond(Method::Get, "timelines/home", ApiResponse::new(statuses(&["a"])));
    transport.fail(
        Method::Post,
        "statuses/a/reblog",
        HttpError::new(500, json!({"error": "boom"})),
    );
    let engine = engine(transport.clone());
    let local = FeedKey::Local;
    let home = FeedKey::following();
    load(&engine, &local).await;
    load(&engine, &home).await;

    let local_before = serde_json::to_vec(&engine.cache().get(&local)).unwrap();
    let home_before = serde_json::to_vec(&engine.cache().get(&home)).unwrap();

    let err = engine
        .mutate(
            &local,
            &MutationIntent::reblog(StatusTarget::local("a"), true, Visibility::Public),
        )
        .await
        .unwrap_err();

    match err {
        TimelineError::Transport(http) => {
            assert_eq!(http.status, Some(500));
            assert_eq!(http.server_message(), Some("boom"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(serde_json::to_vec(&engine.cache().get(&local)).unwrap(), local_before);
    assert_eq!(serde_json::to_vec(&engine.cache().get(&home)).unwrap(), home_before);
    assert_eq!(flag(&engine, &home, "a", StatusFlag::Reblogged), Some(false));

    // Only the originating feed is invalidated on failure
    assert!(engine.cache().is_stale(&local));
    assert!(!engine.cache().is_stale(&home));

    let reblog = transport
        .requests()
        .into_iter()
        .find(|r| r.path == "statuses/a/reblog")
        .unwrap();
    assert_eq!(reblog.form, vec![("visibility".to_string(), "public".to_string())]);
}

#[tokio::test]
async fn test_successful_reblog_invalidates_following() {
    let transport = ScriptedTransport::new();
    transport.respond(Method::Get, "timelines/public", ApiResponse::new(statuses(&["a"])));
    transport.respond(Method::Get, "timelines/home", ApiResponse::new(statuses(&["x"])));
    transport.respond(
        Method::Post,
        "statuses/a/reblog",
        ApiResponse::new(json!({"id": "r1", "account": {"id": "me"}, "reblogged": true, "reblog": status("a")})),
    );
    let engine = engine(transport);
    let local = FeedKey::Local;
    let home = FeedKey::Following {
        show_boosts: true,
        show_replies: false,
    };
    load(&engine, &local).await;
    load(&engine, &home).await;

    engine
        .mutate(
            &local,
            &MutationIntent::reblog(StatusTarget::local("a"), true, Visibility::Private),
        )
        .await
        .unwrap();

    assert_eq!(flag(&engine, &local, "a", StatusFlag::Reblogged), Some(true));
    assert!(engine.cache().is_stale(&home));
}

#[tokio::test]
async fn test_repeated_toggle_is_noop() {
    let transport = ScriptedTransport::new();
    transport.respond(Method::Get, "bookmarks", ApiResponse::new(statuses(&["a"])));
    let engine = engine(transport.clone());
    let key = FeedKey::Bookmarks;
    load(&engine, &key).await;

    let intent = MutationIntent::favourite(StatusTarget::local("a"), true);
    let first = engine.mutate(&key, &intent).await.unwrap();
    assert!(engine.cache().is_stale(&key));

    // Revalidation brings back the server copy, already favourited
    let mut favourited = status("a");
    favourited["favourited"] = json!(true);
    transport.respond(Method::Get, "bookmarks", ApiResponse::new(json!([favourited])));
    load(&engine, &key).await;
    let after_first = engine.cache().get(&key);

    let second = engine.mutate(&key, &intent).await.unwrap();

    assert!(!first.is_noop());
    assert!(second.is_noop());
    assert_eq!(engine.cache().get(&key), after_first);
    assert_eq!(transport.count(Method::Post, "statuses/a/favourite"), 1);
    assert!(!engine.cache().is_stale(&key));
}

#[tokio::test]
async fn test_favourite_reaches_every_feed() {
    let transport = ScriptedTransport::new();
    transport.respond(Method::Get, "timelines/public", ApiResponse::new(statuses(&["a", "b"])));
    transport.respond(
        Method::Get,
        "timelines/home",
        ApiResponse::new(json!([
            {"id": "boost-of-a", "account": {"id": "bob"}, "reblog": status("a")}
        ])),
    );
    transport.respond(
        Method::Get,
        "notifications",
        ApiResponse::new(json!([
            {"id": "n1", "type": "favourite", "account": {"id": "carol"}, "status": status("a")}
        ])),
    );
    transport.respond(
        Method::Post,
        "statuses/a/favourite",
        ApiResponse::new(json!({"id": "a", "account": {"id": "acc-1"}, "favourited": true})),
    );
    let engine = engine(transport);
    let local = FeedKey::Local;
    let home = FeedKey::following();
    let notifications = FeedKey::Notifications;
    for key in [&local, &home, &notifications] {
        load(&engine, key).await;
    }

    engine
        .mutate(&local, &MutationIntent::favourite(StatusTarget::local("a"), true))
        .await
        .unwrap();

    for key in [&local, &home, &notifications] {
        assert_eq!(flag(&engine, key, "a", StatusFlag::Favourited), Some(true), "{}", key);
    }
    assert_eq!(flag(&engine, &local, "b", StatusFlag::Favourited), Some(false));
    assert_eq!(flag(&engine, &home, "boost-of-a", StatusFlag::Favourited), Some(false));
}

#[tokio::test]
async fn test_contradicting_server_flag_rolls_back() {
    let transport = ScriptedTransport::new();
    transport.respond(Method::Get, "bookmarks", ApiResponse::new(statuses(&["a"])));
    transport.respond(
        Method::Post,
        "statuses/a/pin",
        ApiResponse::new(json!({"id": "a", "account": {"id": "acc-1"}, "pinned": false})),
    );
    let engine = engine(transport);
    let key = FeedKey::Bookmarks;
    load(&engine, &key).await;

    let intent = MutationIntent::StatusProperty {
        status: StatusTarget::local("a"),
        property: timeline_sync::mutation::StatusProperty::Pinned,
        to: true,
    };
    let err = engine.mutate(&key, &intent).await.unwrap_err();

    assert_eq!(err.kind(), "consistency");
    assert_eq!(flag(&engine, &key, "a", StatusFlag::Pinned), Some(false));
}

#[tokio::test]
async fn test_remote_status_resolved_before_mutation() {
    let transport = ScriptedTransport::new();
    transport.respond(
        Method::Get,
        "timelines/public",
        ApiResponse::new(json!([
            {"id": "far-9", "uri": "https://far.example/9", "account": {"id": "z"}, "_remote": true}
        ])),
    );
    let mut lookup = MockLookup::new();
    lookup
        .expect_resolve_remote_status()
        .withf(|uri| uri.ends_with("far.example/9"))
        .times(1)
        .returning(|_| Ok(Some("42".to_string())));
    let engine = engine_with(transport.clone(), Arc::new(lookup));
    let key = FeedKey::LocalPublic;
    load(&engine, &key).await;

    let item = engine.cache().items(&key).remove(0);
    let target = StatusTarget::from(item.as_status().unwrap());
    assert!(target.remote);

    engine
        .mutate(&key, &MutationIntent::bookmark(target, true))
        .await
        .unwrap();

    assert_eq!(transport.count(Method::Post, "statuses/42/bookmark"), 1);
    assert_eq!(flag(&engine, &key, "far-9", StatusFlag::Bookmarked), Some(true));
}

#[tokio::test]
async fn test_unresolvable_remote_status_never_writes() {
    let transport = ScriptedTransport::new();
    transport.respond(
        Method::Get,
        "timelines/public",
        ApiResponse::new(json!([
            {"id": "far-9", "uri": "https://far.example/9", "account": {"id": "z"}, "_remote": true}
        ])),
    );
    let mut lookup = MockLookup::new();
    lookup
        .expect_resolve_remote_status()
        .times(1)
        .returning(|_| Ok(None));
    let engine = engine_with(transport.clone(), Arc::new(lookup));
    let key = FeedKey::LocalPublic;
    load(&engine, &key).await;
    let before = engine.cache().entry(&key);

    let err = engine
        .mutate(
            &key,
            &MutationIntent::favourite(StatusTarget::remote("far-9", "https://far.example/9"), true),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, TimelineError::Resolution(_)));
    assert_eq!(engine.cache().entry(&key), before);
    assert!(transport
        .requests()
        .iter()
        .all(|r| r.method == Method::Get));
}

#[tokio::test]
async fn test_poll_vote_adopts_server_poll() {
    let poll = json!({
        "id": "p1",
        "multiple": false,
        "votes_count": 3,
        "voted": false,
        "options": [{"title": "yes", "votes_count": 2}, {"title": "no", "votes_count": 1}]
    });
    let mut with_poll = status("a");
    with_poll["poll"] = poll;

    let transport = ScriptedTransport::new();
    transport.gate(Method::Post, "polls/p1/votes");
    transport.respond(Method::Get, "timelines/home", ApiResponse::new(json!([with_poll])));
    transport.respond(
        Method::Post,
        "polls/p1/votes",
        ApiResponse::new(json!({
            "id": "p1",
            "votes_count": 5,
            "voted": true,
            "own_votes": [1],
            "options": [{"title": "yes", "votes_count": 3}, {"title": "no", "votes_count": 2}]
        })),
    );
    let engine = Arc::new(engine(transport.clone()));
    let key = FeedKey::following();
    load(&engine, &key).await;

    let poll_of = |engine: &TimelineEngine| {
        engine.cache().items(&key)[0]
            .as_status()
            .and_then(|s| s.poll_of("p1").cloned())
            .unwrap()
    };

    let task_engine = engine.clone();
    let task_key = key.clone();
    let vote = tokio::spawn(async move {
        task_engine
            .mutate(
                &task_key,
                &MutationIntent::vote(StatusTarget::local("a"), "p1", vec![false, true]),
            )
            .await
    });
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    let optimistic = poll_of(engine.as_ref());
    assert!(optimistic.voted);
    assert_eq!(optimistic.own_votes, vec![1]);
    assert_eq!(optimistic.options[1].votes_count, Some(2));

    transport.release(Method::Post, "polls/p1/votes", 1);
    vote.await.unwrap().unwrap();

    let settled = poll_of(engine.as_ref());
    assert_eq!(settled.votes_count, 5);
    assert_eq!(settled.options[0].votes_count, Some(3));
}

#[tokio::test]
async fn test_account_actions_skip_optimistic_write() {
    let transport = ScriptedTransport::new();
    transport.respond(
        Method::Get,
        "accounts/7/statuses",
        ApiResponse::new(statuses(&["a"])),
    );
    transport.fail(
        Method::Post,
        "accounts/7/block",
        HttpError::new(403, json!({"error": "forbidden"})),
    );
    let engine = engine(transport.clone());
    let key = FeedKey::account("7", false, false);
    load(&engine, &key).await;
    let before = engine.cache().get(&key);

    let intent = timeline_sync::MutationIntent::AccountProperty {
        account_id: "7".to_string(),
        property: timeline_sync::mutation::AccountProperty::Block,
        current_value: false,
    };
    assert!(engine.mutate(&key, &intent).await.is_err());
    assert_eq!(engine.cache().get(&key), before);
    assert!(engine.cache().is_stale(&key));

    let report = timeline_sync::MutationIntent::AccountProperty {
        account_id: "7".to_string(),
        property: timeline_sync::mutation::AccountProperty::Report,
        current_value: false,
    };
    engine.mutate(&key, &report).await.unwrap();
    let sent = transport
        .requests()
        .into_iter()
        .find(|r| r.path == "reports")
        .unwrap();
    assert_eq!(sent.param_value("account_id"), Some("7"));
}

#[tokio::test]
async fn test_rollback_keeps_invalidation_made_while_in_flight() {
    let transport = ScriptedTransport::new();
    transport.respond(Method::Get, "timelines/home", ApiResponse::new(statuses(&["a"])));
    transport.respond(Method::Get, "favourites", ApiResponse::new(statuses(&["a"])));
    transport.gate(Method::Post, "statuses/a/favourite");
    transport.fail(
        Method::Post,
        "statuses/a/favourite",
        HttpError::new(500, json!({"error": "boom"})),
    );
    let engine = Arc::new(engine(transport.clone()));
    let home = FeedKey::following();
    let favourites = FeedKey::Favourites;
    load(&engine, &home).await;
    load(&engine, &favourites).await;
    let home_pages = engine.cache().get(&home);

    let task_engine = engine.clone();
    let task_origin = favourites.clone();
    let favourite = tokio::spawn(async move {
        task_engine
            .mutate(
                &task_origin,
                &MutationIntent::favourite(StatusTarget::local("a"), true),
            )
            .await
    });
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    assert_eq!(flag(&engine, &home, "a", StatusFlag::Favourited), Some(true));

    assert!(engine.invalidate(&home));
    transport.release(Method::Post, "statuses/a/favourite", 1);
    assert!(favourite.await.unwrap().is_err());

    assert_eq!(engine.cache().get(&home), home_pages);
    assert!(engine.cache().is_stale(&home));
    assert!(engine.cache().is_stale(&favourites));
}
