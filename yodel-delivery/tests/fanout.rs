#![allow(clippy::expect_used, clippy::unwrap_used)]

mod support;

use std::collections::HashSet;

use pretty_assertions::assert_eq;
use support::{Harness, test_config};
use yodel_common::{User, UserId, Yo, YoStatus};
use yodel_delivery::{DeliveryConfig, FanoutConfig};
use yodel_store::YoStore;

/// A broadcaster followed by `followers` users with one device each
fn broadcaster(h: &Harness, followers: usize) -> UserId {
    let sender = h.directory.add_user(User::new("NEWSROOM"));

    for n in 0..followers {
        let (follower, _) = h.user_with_device(&format!("FOLLOWER{n}"));
        h.directory.follow(follower, sender);
    }

    sender
}

#[tokio::test]
async fn test_broadcast_creates_one_child_per_follower() {
    for followers in [0, 1, 25, 1000] {
        let h = Harness::new();
        let sender = broadcaster(&h, followers);

        let parent = h.sender.send(Yo::broadcast(sender)).await.unwrap();
        h.settle().await;

        let stored = h.store.get(parent).await.unwrap();
        assert_eq!(stored.status, YoStatus::Sent, "{followers} followers");
        assert_eq!(stored.recipient_count, followers as u64);
        assert_eq!(stored.sent_count, followers as u64);

        let children = h.store.children_of(parent).await.unwrap();
        assert_eq!(children.len(), followers);
        assert!(children.iter().all(|child| child.status == YoStatus::Sent));

        let recipients: HashSet<_> = children.iter().filter_map(|child| child.recipient).collect();
        assert_eq!(recipients.len(), followers);
        assert_eq!(h.broker.published().len(), followers);

        h.shutdown().await;
    }
}

#[tokio::test]
async fn test_fanout_is_not_repeated() {
    let h = Harness::new();
    let sender = broadcaster(&h, 5);

    let parent = h.sender.send(Yo::broadcast(sender)).await.unwrap();
    h.settle().await;

    assert_eq!(h.dispatcher.fanout_yo(parent).await.unwrap(), 0);
    h.settle().await;

    assert_eq!(h.store.children_of(parent).await.unwrap().len(), 5);
    assert_eq!(h.broker.published().len(), 5);

    h.shutdown().await;
}

#[tokio::test]
async fn test_partition_retry_skips_nothing_and_repeats_nothing() {
    let h = Harness::new();
    let sender = broadcaster(&h, 10);
    h.broker.fail_next(1);

    let parent = h.sender.send(Yo::broadcast(sender)).await.unwrap();
    h.settle().await;

    let published = h.broker.published();
    let endpoints: HashSet<_> = published.iter().map(|(endpoint, _)| *endpoint).collect();
    assert_eq!(published.len(), 10);
    assert_eq!(endpoints.len(), 10);

    let children = h.store.children_of(parent).await.unwrap();
    assert!(children.iter().all(|child| child.status == YoStatus::Sent));

    h.shutdown().await;
}

#[tokio::test]
async fn test_directory_outage_is_retried_not_stranded() {
    let h = Harness::new();
    let sender = broadcaster(&h, 3);
    h.lookups.fail_followers(1);

    let parent = h.sender.send(Yo::broadcast(sender)).await.unwrap();
    h.settle().await;

    let stored = h.store.get(parent).await.unwrap();
    assert_eq!(stored.status, YoStatus::Sent);
    assert_eq!(stored.recipient_count, 3);
    assert_eq!(stored.sent_count, 3);
    assert_eq!(h.store.children_of(parent).await.unwrap().len(), 3);
    assert_eq!(h.broker.published().len(), 3);

    h.shutdown().await;
}

#[tokio::test]
async fn test_resumed_fanout_keeps_earlier_children() {
    let h = Harness::new();
    let sender = h.directory.add_user(User::new("NEWSROOM"));
    let followers: Vec<UserId> = (0..3)
        .map(|n| {
            let (follower, _) = h.user_with_device(&format!("FOLLOWER{n}"));
            h.directory.follow(follower, sender);
            follower
        })
        .collect();

    let parent = Yo::broadcast(sender);
    h.store.insert(&parent).await.unwrap();
    h.store
        .insert_many(&[parent.child_for(followers[0], false)])
        .await
        .unwrap();

    assert_eq!(h.dispatcher.fanout_yo(parent.id).await.unwrap(), 3);
    h.settle().await;

    let children = h.store.children_of(parent.id).await.unwrap();
    let recipients: HashSet<_> = children.iter().filter_map(|child| child.recipient).collect();
    assert_eq!(children.len(), 3);
    assert_eq!(recipients, followers.into_iter().collect::<HashSet<_>>());

    let stored = h.store.get(parent.id).await.unwrap();
    assert_eq!(stored.status, YoStatus::Sent);
    assert_eq!(stored.recipient_count, 3);
    assert_eq!(stored.sent_count, 3);

    h.shutdown().await;
}

#[tokio::test]
async fn test_rejected_endpoint_in_a_partition_is_disabled() {
    let h = Harness::new();
    let sender = h.directory.add_user(User::new("NEWSROOM"));
    let (bob, stale) = h.user_with_device("BOB");
    let (carol, fresh) = h.user_with_device("CAROL");
    h.directory.follow(bob, sender);
    h.directory.follow(carol, sender);
    h.broker.reject("token-BOB", "NotRegistered");

    h.sender.send(Yo::broadcast(sender)).await.unwrap();
    h.settle().await;

    assert!(h.directory.endpoint_snapshot(stale).unwrap().is_disabled);
    assert!(!h.directory.endpoint_snapshot(fresh).unwrap().is_disabled);
    assert_eq!(h.broker.published_to(fresh), 1);
    assert_eq!(h.broker.published_to(stale), 0);

    h.shutdown().await;
}

#[tokio::test]
async fn test_pseudo_follower_is_texted() {
    let h = Harness::new();
    let sender = broadcaster(&h, 3);
    let carol = h
        .directory
        .add_user(User::pseudo("CAROL", "+15555550100"));
    h.directory.follow(carol, sender);

    let parent = h.sender.send(Yo::broadcast(sender)).await.unwrap();
    h.settle().await;

    assert_eq!(h.store.get(parent).await.unwrap().sent_count, 4);
    assert_eq!(h.broker.published().len(), 3);
    assert_eq!(h.sms.sent().len(), 2);

    h.shutdown().await;
}

#[tokio::test]
async fn test_group_excludes_the_sender() {
    let h = Harness::new();
    let (alice, own) = h.user_with_device("ALICE");
    let (bob, _) = h.user_with_device("BOB");
    let (carol, _) = h.user_with_device("CAROL");
    let group = h.directory.add_user(User::new("CLIMBERS"));
    h.directory.set_group(group, vec![alice, bob, carol, bob]);

    let parent = h.sender.send(Yo::to_group(alice, group)).await.unwrap();
    h.settle().await;

    let children = h.store.children_of(parent).await.unwrap();
    let recipients: HashSet<_> = children.iter().filter_map(|child| child.recipient).collect();
    assert_eq!(recipients, HashSet::from([bob, carol]));
    assert_eq!(h.broker.published_to(own), 0);

    h.shutdown().await;
}

#[tokio::test]
async fn test_large_fanout_uses_the_sender_lane() {
    let config = DeliveryConfig {
        fanout: FanoutConfig {
            custom_lane_threshold: 5,
            partition_size: 3,
            ..test_config().fanout
        },
        ..test_config()
    };
    let h = Harness::with_config(&config);
    let sender = broadcaster(&h, 20);

    let parent = h.sender.send(Yo::broadcast(sender)).await.unwrap();
    h.settle().await;

    assert_eq!(h.store.get(parent).await.unwrap().sent_count, 20);
    assert_eq!(h.broker.published().len(), 20);

    h.shutdown().await;
}
