#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::{sync::Arc, time::Duration as StdDuration};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tokio::sync::broadcast;
use yodel_common::{
    Endpoint, Platform, Signal, User, UserId, Yo, YoStatus, traits::RealtimeNotifier,
};
use yodel_delivery::{
    DeliveryConfig, Dispatcher, JobQueue, Transports, YoSender, transport::LoggingTransport,
};
use yodel_payload::{CopyResolver, PayloadBuilder, PayloadConfig};
use yodel_scheduler::{
    ScheduleHandler, ScheduledYoHandler, Scheduler, SchedulerConfig, SchedulerError,
};
use yodel_store::{
    CachedYoStore, MemoryDirectory, MemoryHeaders, MemoryYoStore, PassthroughShortener, YoStore,
};

const GRACE_SECS: i64 = 300;

#[derive(Default)]
struct RecordingNotifier {
    events: Mutex<Vec<(UserId, String, serde_json::Value)>>,
}

#[async_trait]
impl RealtimeNotifier for RecordingNotifier {
    async fn notify(&self, user: UserId, event: &str, payload: serde_json::Value) {
        self.events.lock().push((user, event.to_string(), payload));
    }
}

struct Harness {
    store: Arc<CachedYoStore>,
    directory: Arc<MemoryDirectory>,
    notifier: Arc<RecordingNotifier>,
    handler: Arc<ScheduledYoHandler>,
    scheduler: Scheduler,
    queue: JobQueue,
    shutdown: broadcast::Sender<Signal>,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(CachedYoStore::new(Arc::new(MemoryYoStore::new())));
        let directory = Arc::new(MemoryDirectory::new());
        let headers = Arc::new(MemoryHeaders::load(Vec::new()).expect("headers"));
        let notifier = Arc::new(RecordingNotifier::default());

        let builder = Arc::new(PayloadBuilder::new(
            CopyResolver::new(headers, directory.clone(), "copy"),
            directory.clone(),
            Arc::new(PassthroughShortener),
            PayloadConfig::default(),
        ));

        let delivery = DeliveryConfig::default();
        let queue = JobQueue::new(delivery.queue.clone());
        let dispatcher = Arc::new(Dispatcher::new(
            store.clone(),
            directory.clone(),
            builder,
            Transports {
                push: Arc::new(LoggingTransport),
                sms: Arc::new(LoggingTransport),
                webhooks: Arc::new(LoggingTransport),
            },
            queue.clone(),
            &delivery,
        ));

        let sender = Arc::new(YoSender::new(
            store.clone(),
            directory.clone(),
            directory.clone(),
            queue.clone(),
        ));

        let config = SchedulerConfig {
            grace_secs: GRACE_SECS.unsigned_abs(),
            ..SchedulerConfig::default()
        };
        let handler = Arc::new(ScheduledYoHandler::new(
            store.clone(),
            sender,
            notifier.clone(),
            &config,
        ));
        let scheduler = Scheduler::new(&config).with_handler(handler.clone());

        let (shutdown, receiver) = broadcast::channel(1);
        {
            let queue = queue.clone();
            tokio::spawn(async move { queue.serve(dispatcher, receiver).await });
        }

        Self {
            store,
            directory,
            notifier,
            handler,
            scheduler,
            queue,
            shutdown,
        }
    }

    /// A sender and a recipient with one device
    fn users(&self) -> (UserId, UserId) {
        let alice = self.directory.add_user(User::new("ALICE"));
        let bob = self.directory.add_user(User::new("BOB"));
        self.directory.register_endpoint(
            Endpoint::new(bob, Platform::Android, "token-BOB").with_version("2.0.0"),
        );

        (alice, bob)
    }

    async fn schedule_at(&self, due: DateTime<Utc>) -> Yo {
        let (alice, bob) = self.users();
        let yo = Yo::to(alice, bob).scheduled(due, "default");
        self.handler.schedule(yo.clone()).await.unwrap();
        yo
    }

    async fn settle(&self) {
        tokio::time::timeout(StdDuration::from_secs(10), self.queue.wait_idle())
            .await
            .expect("queue did not go idle");
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = self.shutdown.send(Signal::Shutdown);
    }
}

#[tokio::test]
async fn test_grace_window_boundaries() {
    let due = Utc::now() - Duration::hours(1);
    let polls = [
        (due - Duration::seconds(1), 0),
        (due, 1),
        (due + Duration::seconds(GRACE_SECS / 2), 1),
        (due + Duration::seconds(GRACE_SECS), 1),
        (due + Duration::seconds(GRACE_SECS + 1), 0),
    ];

    for (poll, expected) in polls {
        let h = Harness::new();
        let yo = h.schedule_at(due).await;

        let started = h.scheduler.poll_once(poll).await;
        assert_eq!(started, expected, "poll at due {:+}s", (poll - due).num_seconds());

        let status = h.store.get(yo.id).await.unwrap().status;
        if expected == 0 {
            assert_eq!(status, YoStatus::Scheduled);
        }
        h.settle().await;
    }
}

#[tokio::test]
async fn test_due_item_is_executed_once() {
    let h = Harness::new();
    let now = Utc::now();
    let yo = h.schedule_at(now - Duration::seconds(5)).await;

    assert_eq!(h.scheduler.poll_once(now).await, 1);
    assert_eq!(h.scheduler.poll_once(now).await, 0);
    h.settle().await;

    assert_eq!(h.store.get(yo.id).await.unwrap().status, YoStatus::Sent);
}

#[tokio::test]
async fn test_claimed_item_is_left_alone() {
    let h = Harness::new();
    let now = Utc::now();
    let yo = h.schedule_at(now).await;

    let items = h.handler.discover(now).await.unwrap();
    assert_eq!(items.len(), 1);

    h.store
        .compare_and_set_status(yo.id, YoStatus::Scheduled, YoStatus::Started)
        .await
        .unwrap();

    assert_eq!(
        h.handler.execute(&items[0]).await.unwrap(),
        yodel_scheduler::Execution::ClaimedElsewhere
    );
}

#[tokio::test]
async fn test_scheduling_notifies_the_sender() {
    let h = Harness::new();
    let due = Utc::now() + Duration::minutes(10);
    let yo = h.schedule_at(due).await;

    let events = h.notifier.events.lock().clone();
    assert_eq!(events.len(), 1);

    let (user, event, payload) = &events[0];
    assert_eq!(Some(*user), yo.sender);
    assert_eq!(event, "yo.scheduled");
    assert_eq!(payload["yo_id"], yo.id.to_string());

    assert_eq!(h.store.get(yo.id).await.unwrap().status, YoStatus::Scheduled);
}

#[tokio::test]
async fn test_next_delay_tracks_the_nearest_item() {
    let h = Harness::new();
    let now = Utc::now();

    assert_eq!(h.handler.next_delay(now).await.unwrap(), None);

    h.schedule_at(now + Duration::seconds(90)).await;
    h.schedule_at(now + Duration::seconds(20)).await;

    assert_eq!(
        h.handler.next_delay(now).await.unwrap(),
        Some(StdDuration::from_secs(20))
    );
    assert_eq!(h.scheduler.next_sleep(now).await, StdDuration::from_secs(20));
}

#[tokio::test]
async fn test_revoked_sender_fails_the_item() {
    let h = Harness::new();
    let now = Utc::now();
    let yo = h.schedule_at(now).await;
    h.directory.deny(yo.sender.unwrap());

    assert_eq!(h.scheduler.poll_once(now).await, 0);

    assert!(!h.store.is_cached(yo.id));
    assert_eq!(h.store.get(yo.id).await.unwrap().status, YoStatus::Failed);
}

#[tokio::test]
async fn test_unscheduled_yo_is_refused() {
    let h = Harness::new();
    let (alice, bob) = h.users();

    let err = h.handler.schedule(Yo::to(alice, bob)).await.unwrap_err();

    assert!(matches!(err, SchedulerError::Api(_)));
}
