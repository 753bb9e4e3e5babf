//! Turns queued jobs into broker publishes, texts and callbacks.

mod callback;
mod fanout;
mod push;
mod sms;
mod yo;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use yodel_common::{
    UserId, Yo, YoId, YoStatus, audit,
    traits::Directory,
};
use yodel_payload::{PayloadBuilder, Prepared, RenderRequest};
use yodel_store::YoStore;

use crate::{
    config::{DeliveryConfig, FanoutConfig},
    error::DeliveryError,
    guard::SmsGuard,
    queue::{Job, JobHandler, JobQueue},
    transport::{PushBroker, SmsProvider, WebhookClient},
};

/// The three ways out of the process
#[derive(Clone)]
pub struct Transports {
    pub push: Arc<dyn PushBroker>,
    pub sms: Arc<dyn SmsProvider>,
    pub webhooks: Arc<dyn WebhookClient>,
}

/// What a per-recipient dispatch did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Nothing was done, the Yo had been sent before
    AlreadySent,
    /// Delivery jobs were queued
    Queued { pushes: usize, sms: bool },
    /// The recipient has no enabled endpoint and can't be texted
    Unreachable,
}

/// Result of a single endpoint publish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Sent,
    /// The broker rejected the endpoint for good and it has been disabled
    TargetDisabled,
    /// The endpoint was already disabled
    Skipped,
}

pub struct Dispatcher {
    store: Arc<dyn YoStore>,
    directory: Arc<dyn Directory>,
    builder: Arc<PayloadBuilder>,
    transports: Transports,
    queue: JobQueue,
    guard: SmsGuard,
    fanout: FanoutConfig,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn YoStore>,
        directory: Arc<dyn Directory>,
        builder: Arc<PayloadBuilder>,
        transports: Transports,
        queue: JobQueue,
        config: &DeliveryConfig,
    ) -> Self {
        Self {
            store,
            directory,
            builder,
            transports,
            queue,
            guard: SmsGuard::new(Duration::from_secs(config.sms_guard.ttl_secs)),
            fanout: config.fanout.clone(),
        }
    }

    pub const fn guard(&self) -> &SmsGuard {
        &self.guard
    }

    /// Looks up everything needed to render `yo`, following its parent and
    /// the Yo it forwards
    async fn prepare(&self, yo: &Yo) -> Result<Prepared, DeliveryError> {
        let parent = match yo.parent {
            Some(parent) => self.store.get(parent).await.ok(),
            None => None,
        };

        let origin_sender = match yo.origin_yo {
            Some(origin) => self
                .store
                .get(origin)
                .await
                .ok()
                .and_then(|origin| origin.sender),
            None => None,
        };

        let request = RenderRequest::new(yo, parent.as_ref()).with_origin_sender(origin_sender);
        Ok(self.builder.prepare(request).await?)
    }

    async fn mark_failed(&self, yo_id: YoId, reason: &str, attempts: u32) {
        audit::log_yo_failed(&yo_id.to_string(), reason, attempts);

        if let Err(err) = self.store.set_status(yo_id, YoStatus::Failed).await {
            tracing::error!(%yo_id, "Unable to mark Yo failed: {err}");
        }
    }

    async fn touch_contact(&self, owner: UserId, target: UserId) {
        if let Err(err) = self.directory.touch_contact(owner, target, Utc::now()).await {
            tracing::warn!(%owner, %target, "Unable to record contact interaction: {err}");
        }
    }
}

#[async_trait]
impl JobHandler for Dispatcher {
    async fn run(&self, job: &Job, attempt: u32) -> Result<(), DeliveryError> {
        match job {
            Job::DispatchYo { yo_id } => self.dispatch_yo(*yo_id).await.map(|_| ()),
            Job::Push {
                yo_id,
                endpoint,
                envelope,
            } => {
                let endpoint = self.directory.endpoint(*endpoint).await?;
                self.push(*yo_id, &endpoint, envelope, attempt)
                    .await
                    .map(|_| ())
            }
            Job::PushPartition { parent, children } => self
                .push_partition(*parent, children, attempt)
                .await
                .map(|_| ()),
            Job::Sms {
                yo_id,
                phone,
                body,
                welcome,
                then,
            } => {
                self.sms(*yo_id, phone, body, *welcome, then.as_deref())
                    .await
            }
            Job::Callback { yo_id, url, params } => {
                self.callback(*yo_id, url, params).await;
                Ok(())
            }
            Job::Fanout { yo_id } => self.fanout_yo(*yo_id).await.map(|_| ()),
        }
    }

    async fn on_failure(&self, job: &Job, error: &DeliveryError, attempts: u32) {
        match job {
            Job::DispatchYo { yo_id } | Job::Fanout { yo_id } => {
                self.mark_failed(*yo_id, &error.to_string(), attempts).await;
            }
            Job::Sms {
                yo_id,
                phone,
                welcome: false,
                ..
            } => {
                self.guard.release(phone);
                self.mark_failed(*yo_id, &error.to_string(), attempts).await;
            }
            Job::Sms {
                yo_id,
                phone,
                then: Some(next),
                ..
            } => {
                tracing::warn!(%yo_id, attempts, "Giving up on welcome SMS: {error}");
                if let Err(err) = self.queue_sms_after_welcome(*yo_id, phone, next) {
                    self.mark_failed(*yo_id, &err.to_string(), attempts).await;
                }
            }
            Job::PushPartition { children, .. } => {
                for child in children {
                    let Ok(yo) = self.store.get(*child).await else {
                        continue;
                    };

                    if yo.status != YoStatus::Sent {
                        self.mark_failed(*child, &error.to_string(), attempts).await;
                    }
                }
            }
            Job::Push { yo_id, endpoint, .. } => {
                tracing::warn!(
                    %yo_id,
                    %endpoint,
                    attempts,
                    "Giving up on push: {error}"
                );
            }
            Job::Sms { yo_id, .. } | Job::Callback { yo_id, .. } => {
                tracing::warn!(%yo_id, attempts, "Giving up on {}: {error}", job.kind());
            }
        }
    }
}
