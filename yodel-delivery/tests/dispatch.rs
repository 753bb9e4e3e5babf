#![allow(clippy::expect_used, clippy::unwrap_used)]

mod support;

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use support::Harness;
use yodel_common::{ApiError, ContactPair, User, Yo, YoId, YoStatus, identity};
use yodel_delivery::{DeliveryError, DispatchOutcome, SystemError};
use yodel_store::YoStore;

#[tokio::test]
async fn test_link_to_three_recipients() {
    let h = Harness::new();
    let (alice, _) = h.user_with_device("ALICE");
    let recipients: Vec<_> = ["BOB", "CAROL", "DAVE"]
        .into_iter()
        .map(|name| h.user_with_device(name))
        .collect();

    let yo = Yo::to_many(alice, recipients.iter().map(|(user, _)| *user).collect())
        .with_link("https://example.com/article");
    let parent = h.sender.send(yo).await.unwrap();
    h.settle().await;

    let stored = h.store.get(parent).await.unwrap();
    assert_eq!(stored.status, YoStatus::Sent);
    assert_eq!(stored.recipient_count, 3);
    assert_eq!(stored.sent_count, 3);

    let children = h.store.children_of(parent).await.unwrap();
    assert_eq!(children.len(), 3);
    assert!(children.iter().all(|child| child.status == YoStatus::Sent));

    for (_, endpoint) in &recipients {
        assert_eq!(h.broker.published_to(*endpoint), 1);
    }

    h.shutdown().await;
}

#[tokio::test]
async fn test_single_recipient_push_carries_the_yo() {
    let h = Harness::new();
    let (alice, _) = h.user_with_device("ALICE");
    let (bob, endpoint) = h.user_with_device("BOB");

    let id = h.sender.send(Yo::to(alice, bob)).await.unwrap();
    h.settle().await;

    let published = h.broker.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, endpoint);

    let envelope: serde_json::Value = serde_json::from_str(&published[0].1).unwrap();
    assert!(envelope.to_string().contains(&id.to_string()));

    assert_eq!(h.store.get(id).await.unwrap().status, YoStatus::Sent);
    assert!(h.broker.enabled().contains(&endpoint));

    h.shutdown().await;
}

#[tokio::test]
async fn test_dispatching_a_sent_yo_does_nothing() {
    let h = Harness::new();
    let (alice, _) = h.user_with_device("ALICE");
    let (bob, _) = h.user_with_device("BOB");

    let mut yo = Yo::to(alice, bob);
    yo.status = YoStatus::Sent;
    h.store.insert(&yo).await.unwrap();

    let outcome = h.dispatcher.dispatch_yo(yo.id).await.unwrap();
    h.settle().await;

    assert_eq!(outcome, DispatchOutcome::AlreadySent);
    assert!(h.broker.published().is_empty());
    assert!(h.broker.enabled().is_empty());

    h.shutdown().await;
}

#[tokio::test]
async fn test_missing_yo_is_not_found() {
    let h = Harness::new();
    let missing = YoId::generate();

    let err = h.dispatcher.dispatch_yo(missing).await.unwrap_err();

    assert!(matches!(
        err,
        DeliveryError::System(SystemError::YoNotFound(id)) if id == missing
    ));
    assert!(!err.is_temporary());

    h.shutdown().await;
}

#[tokio::test]
async fn test_invalid_token_disables_the_endpoint() {
    let h = Harness::new();
    let (alice, _) = h.user_with_device("ALICE");
    let (bob, endpoint) = h.user_with_device("BOB");
    h.broker.reject("token-BOB", "InvalidToken");

    h.sender.send(Yo::to(alice, bob)).await.unwrap();
    h.settle().await;

    assert!(h.directory.endpoint_snapshot(endpoint).unwrap().is_disabled);
    assert!(h.broker.published().is_empty());

    // Nothing left to reach Bob with
    let second = h.sender.send(Yo::to(alice, bob)).await.unwrap();
    h.settle().await;

    assert_eq!(h.store.get(second).await.unwrap().status, YoStatus::Failed);

    h.shutdown().await;
}

#[tokio::test]
async fn test_unrelated_rejections_are_retried_not_disabled() {
    let h = Harness::new();
    let (alice, _) = h.user_with_device("ALICE");
    let (bob, endpoint) = h.user_with_device("BOB");
    h.broker.fail_next(2);

    h.sender.send(Yo::to(alice, bob)).await.unwrap();
    h.settle().await;

    assert_eq!(h.broker.published_to(endpoint), 1);
    assert!(!h.directory.endpoint_snapshot(endpoint).unwrap().is_disabled);

    h.shutdown().await;
}

#[tokio::test]
async fn test_pseudo_recipient_is_welcomed_once() {
    let h = Harness::new();
    let (alice, _) = h.user_with_device("ALICE");
    let carol = h
        .directory
        .add_user(User::pseudo("CAROL", "+15555550100"));

    h.sender
        .send(Yo::to(alice, carol).with_link("https://example.com"))
        .await
        .unwrap();
    h.settle().await;

    let sent = h.sms.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|(phone, _)| phone == "+15555550100"));
    assert_eq!(
        sent.iter()
            .filter(|(_, body)| body.contains("sent you a Yo!"))
            .count(),
        1
    );
    assert!(h.directory.user_snapshot(carol).unwrap().sms_welcomed);

    h.sender.send(Yo::to(alice, carol)).await.unwrap();
    h.settle().await;

    assert_eq!(h.sms.sent().len(), 3);
    assert!(h.broker.published().is_empty());

    h.shutdown().await;
}

#[tokio::test]
async fn test_welcome_goes_out_before_the_yo() {
    let h = Harness::new();
    let (alice, _) = h.user_with_device("ALICE");
    let carol = h
        .directory
        .add_user(User::pseudo("CAROL", "+15555550100"));
    h.sms.fail_next(1);

    h.sender.send(Yo::to(alice, carol)).await.unwrap();
    h.settle().await;

    let sent = h.sms.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].1.contains("sent you a Yo!"));
    assert!(!sent[1].1.contains("sent you a Yo!"));
    assert!(!h.dispatcher.guard().is_locked("+15555550100"));

    h.shutdown().await;
}

#[tokio::test]
async fn test_failed_welcome_still_sends_the_yo() {
    let h = Harness::new();
    let (alice, _) = h.user_with_device("ALICE");
    let carol = h
        .directory
        .add_user(User::pseudo("CAROL", "+15555550100"));
    h.sms.fail_next(3);

    let id = h.sender.send(Yo::to(alice, carol)).await.unwrap();
    h.settle().await;

    let sent = h.sms.sent();
    assert_eq!(sent.len(), 1);
    assert!(!sent[0].1.contains("sent you a Yo!"));
    assert_eq!(h.store.get(id).await.unwrap().status, YoStatus::Sent);
    assert!(!h.dispatcher.guard().is_locked("+15555550100"));

    h.shutdown().await;
}

#[tokio::test]
async fn test_sms_in_flight_suppresses_another() {
    let h = Harness::new();
    let (alice, _) = h.user_with_device("ALICE");
    let carol = h
        .directory
        .add_user(User::pseudo("CAROL", "+15555550100"));

    assert!(h.dispatcher.guard().try_acquire("+15555550100"));

    let id = h.sender.send(Yo::to(alice, carol)).await.unwrap();
    h.settle().await;

    assert!(h.sms.sent().is_empty());
    assert_eq!(h.store.get(id).await.unwrap().status, YoStatus::Sent);

    h.dispatcher.guard().release("+15555550100");
    h.sender.send(Yo::to(alice, carol)).await.unwrap();
    h.settle().await;

    assert!(!h.sms.sent().is_empty());
    assert!(!h.dispatcher.guard().is_locked("+15555550100"));

    h.shutdown().await;
}

#[tokio::test]
async fn test_push_only_yo_never_falls_back_to_sms() {
    let h = Harness::new();
    let (alice, _) = h.user_with_device("ALICE");
    let carol = h
        .directory
        .add_user(User::pseudo("CAROL", "+15555550100"));

    let id = h.sender.send(Yo::to(alice, carol).push_only()).await.unwrap();
    h.settle().await;

    assert!(h.sms.sent().is_empty());
    assert_eq!(h.store.get(id).await.unwrap().status, YoStatus::Failed);

    h.shutdown().await;
}

#[tokio::test]
async fn test_callback_reaches_the_recipient_webhook() {
    let h = Harness::new();
    let (alice, _) = h.user_with_device("ALICE");
    let bob = h.directory.add_user(User {
        callback_url: Some("https://hooks.example.com/bob".to_string()),
        ..User::new("BOB")
    });
    h.directory.register_endpoint(
        yodel_common::Endpoint::new(bob, yodel_common::Platform::Android, "token-BOB")
            .with_version("2.0.0"),
    );

    let id = h
        .sender
        .send(Yo::to(alice, bob).with_link("https://example.com"))
        .await
        .unwrap();
    h.settle().await;

    let calls = h.webhooks.calls();
    assert_eq!(calls.len(), 1);

    let (url, params) = &calls[0];
    assert_eq!(url, "https://hooks.example.com/bob");
    assert!(params.contains(&("username".to_string(), "ALICE".to_string())));
    assert!(params.contains(&("yo_id".to_string(), id.to_string())));
    assert!(params.contains(&("link".to_string(), "https://example.com".to_string())));

    h.shutdown().await;
}

#[tokio::test]
async fn test_muted_recipient_counts_but_is_not_pushed() {
    let h = Harness::new();
    let (alice, _) = h.user_with_device("ALICE");
    let (bob, muting) = h.user_with_device("BOB");
    let (carol, listening) = h.user_with_device("CAROL");

    h.directory.set_contact(ContactPair {
        muted_until: Some(Utc::now() + Duration::hours(1)),
        ..ContactPair::new(bob, alice)
    });

    let parent = h.sender.send(Yo::to_many(alice, vec![bob, carol])).await.unwrap();
    h.settle().await;

    let stored = h.store.get(parent).await.unwrap();
    assert_eq!(stored.sent_count, 2);
    assert_eq!(h.broker.published_to(muting), 0);
    assert_eq!(h.broker.published_to(listening), 1);

    h.shutdown().await;
}

#[tokio::test]
async fn test_denied_sender_is_refused() {
    let h = Harness::new();
    let (alice, _) = h.user_with_device("ALICE");
    let (bob, _) = h.user_with_device("BOB");
    h.directory.deny(alice);

    let err = h.sender.send(Yo::to(alice, bob)).await.unwrap_err();

    assert!(matches!(err, ApiError::PermissionDenied(user) if user == alice));
    assert!(h.store.is_empty());

    h.shutdown().await;
}

#[tokio::test]
async fn test_acting_user_must_be_the_sender() {
    let h = Harness::new();
    let (alice, _) = h.user_with_device("ALICE");
    let (bob, _) = h.user_with_device("BOB");

    let err = identity::act_as(bob, h.sender.send(Yo::to(alice, bob)))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::PermissionDenied(user) if user == bob));

    let sent = identity::act_as(alice, h.sender.send(Yo::to(alice, bob))).await;
    assert!(sent.is_ok());
    h.settle().await;

    h.shutdown().await;
}
