//! Scheduled Yos: discovered from the store within the grace window and
//! resumed through the normal send path as their sender.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use yodel_common::{
    Yo, YoStatus, audit, identity, internal, traits::RealtimeNotifier, tracing,
};
use yodel_delivery::YoSender;
use yodel_store::YoStore;

use crate::{
    config::SchedulerConfig,
    error::SchedulerError,
    handler::{Execution, ScheduleHandler, ScheduledItem},
};

pub const JOB_TYPE: &str = "yo";

pub struct ScheduledYoHandler {
    store: Arc<dyn YoStore>,
    sender: Arc<YoSender>,
    notifier: Arc<dyn RealtimeNotifier>,
    schedule: String,
    grace: chrono::Duration,
}

impl ScheduledYoHandler {
    pub fn new(
        store: Arc<dyn YoStore>,
        sender: Arc<YoSender>,
        notifier: Arc<dyn RealtimeNotifier>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            store,
            sender,
            notifier,
            schedule: config.schedule.clone(),
            grace: chrono::Duration::from_std(config.grace()).unwrap_or(chrono::Duration::MAX),
        }
    }

    /// Records `yo` for later and announces it. `yo` is put on this
    /// handler's schedule unless it names one already.
    ///
    /// # Errors
    ///
    /// Whatever [`YoSender::schedule`] refuses, and
    /// [`SchedulerError::NotScheduled`] when `yo` has no due time.
    pub async fn schedule(&self, mut yo: Yo) -> Result<ScheduledItem, SchedulerError> {
        if yo.schedule_name.is_none() {
            yo.schedule_name = Some(self.schedule.clone());
        }

        let yo = self.sender.schedule(yo).await?;
        let item = item_for(&yo)?;
        self.on_new(&item).await;

        Ok(item)
    }
}

fn item_for(yo: &Yo) -> Result<ScheduledItem, SchedulerError> {
    let due = yo
        .scheduled_for
        .ok_or_else(|| SchedulerError::NotScheduled(yo.id.to_string()))?;

    Ok(ScheduledItem {
        id: yo.id,
        job_type: JOB_TYPE,
        due,
        owner: yo.sender()?,
    })
}

#[async_trait]
impl ScheduleHandler for ScheduledYoHandler {
    fn job_type(&self) -> &'static str {
        JOB_TYPE
    }

    async fn discover(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledItem>, SchedulerError> {
        let from = now
            .checked_sub_signed(self.grace)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        self.store
            .due_scheduled(&self.schedule, from, now)
            .await?
            .iter()
            .map(item_for)
            .collect()
    }

    async fn next_delay(&self, now: DateTime<Utc>) -> Result<Option<Duration>, SchedulerError> {
        Ok(self
            .store
            .next_due(&self.schedule, now)
            .await?
            .map(|due| (due - now).to_std().unwrap_or_default()))
    }

    async fn execute(&self, item: &ScheduledItem) -> Result<Execution, SchedulerError> {
        let claimed = self
            .store
            .compare_and_set_status(item.id, YoStatus::Scheduled, YoStatus::Started)
            .await?;

        if !claimed {
            internal!(level = DEBUG, "Scheduled Yo {} was already claimed", item.id);
            return Ok(Execution::ClaimedElsewhere);
        }

        tracing::debug!(yo_id = %item.id, owner = %item.owner, "Resuming scheduled Yo");
        identity::act_as(item.owner, self.sender.resume(item.id)).await?;
        Ok(Execution::Started)
    }

    async fn on_new(&self, item: &ScheduledItem) {
        self.notifier
            .notify(
                item.owner,
                "yo.scheduled",
                json!({
                    "yo_id": item.id.to_string(),
                    "scheduled_for": item.due.to_rfc3339(),
                }),
            )
            .await;
    }

    async fn on_failure(&self, item: &ScheduledItem, error: &SchedulerError) {
        audit::log_yo_failed(&item.id.to_string(), &error.to_string(), 1);

        if let Err(err) = self.store.set_status(item.id, YoStatus::Failed).await {
            tracing::error!(yo_id = %item.id, "Unable to mark scheduled Yo failed: {err}");
        }

        self.store.evict(item.id);
    }
}
