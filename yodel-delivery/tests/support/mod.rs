#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use chrono::{DateTime, Utc};
use tokio::{sync::broadcast, task::JoinHandle};
use yodel_common::{
    ContactPair, DirectoryError, Endpoint, EndpointId, Platform, Signal, User, UserId,
    traits::Directory,
};
use yodel_delivery::{
    DeliveryConfig, DeliveryError, Dispatcher, FanoutConfig, JobQueue, LaneConfig, QueueConfig,
    RetryPolicy, Transports, YoSender,
    transport::{BatchReport, PushBroker, SmsProvider, TransportError, WebhookClient},
};
use yodel_payload::{CopyResolver, PayloadBuilder, PayloadConfig};
use yodel_store::{MemoryDirectory, MemoryHeaders, MemoryYoStore, PassthroughShortener};

/// Records every publish, rejecting tokens it was told to reject
#[derive(Debug, Default)]
pub struct RecordingBroker {
    published: Mutex<Vec<(EndpointId, String)>>,
    enabled: Mutex<Vec<EndpointId>>,
    rejections: Mutex<HashMap<String, String>>,
    outages: AtomicUsize,
}

impl RecordingBroker {
    /// Reject `token` with broker `code` from now on
    pub fn reject(&self, token: &str, code: &str) {
        self.rejections
            .lock()
            .insert(token.to_string(), code.to_string());
    }

    /// Fail the next `count` publishes as unavailable
    pub fn fail_next(&self, count: usize) {
        self.outages.store(count, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<(EndpointId, String)> {
        self.published.lock().clone()
    }

    pub fn published_to(&self, endpoint: EndpointId) -> usize {
        self.published
            .lock()
            .iter()
            .filter(|(id, _)| *id == endpoint)
            .count()
    }

    pub fn enabled(&self) -> Vec<EndpointId> {
        self.enabled.lock().clone()
    }

    fn rejection(&self, endpoint: &Endpoint) -> Option<TransportError> {
        self.rejections
            .lock()
            .get(&endpoint.token)
            .map(|code| TransportError::rejected(code.as_str(), "rejected by test broker"))
    }

    fn outage(&self) -> Option<TransportError> {
        self.outages
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .ok()
            .map(|_| TransportError::Unavailable("test broker is down".to_string()))
    }
}

#[async_trait]
impl PushBroker for RecordingBroker {
    async fn enable(&self, endpoint: &Endpoint) -> Result<(), TransportError> {
        self.enabled.lock().push(endpoint.id);
        Ok(())
    }

    async fn publish(&self, endpoint: &Endpoint, envelope: &str) -> Result<(), TransportError> {
        if let Some(err) = self.outage() {
            return Err(err);
        }

        if let Some(err) = self.rejection(endpoint) {
            return Err(err);
        }

        self.published
            .lock()
            .push((endpoint.id, envelope.to_string()));
        Ok(())
    }

    async fn publish_batch(
        &self,
        endpoints: &[Endpoint],
        envelope: &str,
    ) -> Result<BatchReport, TransportError> {
        if let Some(err) = self.outage() {
            return Err(err);
        }

        let mut report = BatchReport::default();
        let mut published = self.published.lock();

        for endpoint in endpoints {
            match self.rejection(endpoint) {
                Some(err) => report.failures.push((endpoint.id, err)),
                None => published.push((endpoint.id, envelope.to_string())),
            }
        }

        Ok(report)
    }
}

#[derive(Debug, Default)]
pub struct RecordingSms {
    sent: Mutex<Vec<(String, String)>>,
    outages: AtomicUsize,
}

impl RecordingSms {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }

    /// Fail the next `count` texts as unavailable
    pub fn fail_next(&self, count: usize) {
        self.outages.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl SmsProvider for RecordingSms {
    async fn send(&self, phone: &str, body: &str) -> Result<(), TransportError> {
        if self
            .outages
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
        {
            return Err(TransportError::Unavailable("test provider is down".to_string()));
        }

        self.sent.lock().push((phone.to_string(), body.to_string()));
        Ok(())
    }
}

/// The in-memory directory, with follower lookups that can be made to fail
#[derive(Debug)]
pub struct FlakyDirectory {
    inner: Arc<MemoryDirectory>,
    follower_outages: AtomicUsize,
}

impl FlakyDirectory {
    /// Fail the next `count` follower lookups as unavailable
    pub fn fail_followers(&self, count: usize) {
        self.follower_outages.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl Directory for FlakyDirectory {
    async fn user(&self, id: UserId) -> Result<User, DirectoryError> {
        self.inner.user(id).await
    }

    async fn endpoints_for(
        &self,
        user: UserId,
        app_id: Option<&str>,
    ) -> Result<Vec<Endpoint>, DirectoryError> {
        self.inner.endpoints_for(user, app_id).await
    }

    async fn endpoint(&self, id: EndpointId) -> Result<Endpoint, DirectoryError> {
        self.inner.endpoint(id).await
    }

    async fn contact_pair(
        &self,
        owner: UserId,
        target: UserId,
    ) -> Result<Option<ContactPair>, DirectoryError> {
        self.inner.contact_pair(owner, target).await
    }

    async fn followers(&self, user: UserId) -> Result<Vec<UserId>, DirectoryError> {
        if self
            .follower_outages
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
        {
            return Err(DirectoryError::Unavailable("test directory is down".to_string()));
        }

        self.inner.followers(user).await
    }

    async fn group_members(&self, group: UserId) -> Result<Vec<UserId>, DirectoryError> {
        self.inner.group_members(group).await
    }

    async fn disable_endpoint(&self, id: EndpointId) -> Result<(), DirectoryError> {
        self.inner.disable_endpoint(id).await
    }

    async fn touch_contact(
        &self,
        owner: UserId,
        target: UserId,
        at: DateTime<Utc>,
    ) -> Result<(), DirectoryError> {
        self.inner.touch_contact(owner, target, at).await
    }

    async fn mark_sms_welcomed(&self, user: UserId) -> Result<bool, DirectoryError> {
        self.inner.mark_sms_welcomed(user).await
    }
}

#[derive(Debug, Default)]
pub struct RecordingWebhooks {
    calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl RecordingWebhooks {
    pub fn calls(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl WebhookClient for RecordingWebhooks {
    async fn get(&self, url: &str, params: &[(String, String)]) -> Result<(), TransportError> {
        self.calls.lock().push((url.to_string(), params.to_vec()));
        Ok(())
    }
}

/// Lanes that retry quickly so failing scenarios finish fast
fn fast_lane(concurrency: usize, max_attempts: u32) -> LaneConfig {
    LaneConfig {
        concurrency,
        timeout_secs: 5,
        retry: RetryPolicy {
            max_attempts,
            base_delay_ms: 1,
            max_delay_ms: 5,
            jitter_factor: 0.0,
        },
    }
}

pub fn test_config() -> DeliveryConfig {
    DeliveryConfig {
        queue: QueueConfig {
            capacity: 4096,
            max_in_flight: 256,
            default: fast_lane(16, 5),
            sms: fast_lane(4, 3),
            callbacks: fast_lane(4, 1),
            fanouts: fast_lane(2, 3),
            sender: fast_lane(4, 5),
        },
        fanout: FanoutConfig {
            buffer_size: 64,
            partition_size: 100,
            ..FanoutConfig::default()
        },
        ..DeliveryConfig::default()
    }
}

/// Everything between the send path and the transports, wired to in-memory
/// collaborators, with the queue served in the background
pub struct Harness {
    pub store: Arc<MemoryYoStore>,
    pub directory: Arc<MemoryDirectory>,
    /// What the dispatcher looks users up through
    pub lookups: Arc<FlakyDirectory>,
    pub broker: Arc<RecordingBroker>,
    pub sms: Arc<RecordingSms>,
    pub webhooks: Arc<RecordingWebhooks>,
    pub dispatcher: Arc<Dispatcher>,
    pub sender: YoSender,
    pub queue: JobQueue,
    shutdown: broadcast::Sender<Signal>,
    serving: JoinHandle<Result<(), DeliveryError>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(&test_config())
    }

    pub fn with_config(config: &DeliveryConfig) -> Self {
        let store = Arc::new(MemoryYoStore::new());
        let directory = Arc::new(MemoryDirectory::new());
        let lookups = Arc::new(FlakyDirectory {
            inner: directory.clone(),
            follower_outages: AtomicUsize::new(0),
        });
        let headers = Arc::new(MemoryHeaders::load(Vec::new()).expect("headers"));

        let broker = Arc::new(RecordingBroker::default());
        let sms = Arc::new(RecordingSms::default());
        let webhooks = Arc::new(RecordingWebhooks::default());

        let builder = Arc::new(PayloadBuilder::new(
            CopyResolver::new(headers, directory.clone(), "copy"),
            directory.clone(),
            Arc::new(PassthroughShortener),
            PayloadConfig::default(),
        ));

        let queue = JobQueue::new(config.queue.clone());
        let dispatcher = Arc::new(Dispatcher::new(
            store.clone(),
            lookups.clone(),
            builder,
            Transports {
                push: broker.clone(),
                sms: sms.clone(),
                webhooks: webhooks.clone(),
            },
            queue.clone(),
            config,
        ));

        let sender = YoSender::new(
            store.clone(),
            directory.clone(),
            directory.clone(),
            queue.clone(),
        );

        let (shutdown, receiver) = broadcast::channel(1);
        let serving = {
            let queue = queue.clone();
            let handler = dispatcher.clone();
            tokio::spawn(async move { queue.serve(handler, receiver).await })
        };

        Self {
            store,
            directory,
            lookups,
            broker,
            sms,
            webhooks,
            dispatcher,
            sender,
            queue,
            shutdown,
            serving,
        }
    }

    /// A user with one modern iOS device
    pub fn user_with_device(&self, username: &str) -> (UserId, EndpointId) {
        let user = self.directory.add_user(User::new(username));
        let endpoint = self.directory.register_endpoint(
            Endpoint::new(user, Platform::Ios, format!("token-{username}")).with_version("2.0.0"),
        );
        (user, endpoint)
    }

    /// Waits for every queued job, failing the test if that takes too long
    pub async fn settle(&self) {
        tokio::time::timeout(Duration::from_secs(30), self.queue.wait_idle())
            .await
            .expect("queue did not go idle");
    }

    pub async fn shutdown(self) {
        self.shutdown.send(Signal::Shutdown).expect("queue listening");
        self.serving
            .await
            .expect("serve task")
            .expect("serve result");
    }
}
