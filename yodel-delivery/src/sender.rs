//! The synchronous half of sending a Yo: validate, record, enqueue.

use std::sync::Arc;

use yodel_common::{
    ApiError, UserId, Yo, YoId, YoStatus, audit, identity,
    traits::{Directory, Permissions},
    tracing,
};
use yodel_store::YoStore;
use yodel_tracing::traced;

use crate::queue::{Job, JobQueue, Lane};

pub struct YoSender {
    store: Arc<dyn YoStore>,
    directory: Arc<dyn Directory>,
    permissions: Arc<dyn Permissions>,
    queue: JobQueue,
}

impl YoSender {
    pub fn new(
        store: Arc<dyn YoStore>,
        directory: Arc<dyn Directory>,
        permissions: Arc<dyn Permissions>,
        queue: JobQueue,
    ) -> Self {
        Self {
            store,
            directory,
            permissions,
            queue,
        }
    }

    /// Records `yo` and enqueues its delivery.
    ///
    /// Succeeds as soon as the Yo is stored and queued; delivery itself
    /// happens in the background.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`] here is the caller's to handle, nothing has been
    /// recorded.
    #[traced(instrument(level = tracing::Level::DEBUG, skip_all, fields(yo_id = %yo.id)), timing(precision = "us"))]
    pub async fn send(&self, mut yo: Yo) -> Result<YoId, ApiError> {
        self.check(&yo).await?;

        yo.status = YoStatus::Pending;
        yo.scheduled_for = None;
        if !yo.needs_fanout() {
            yo.recipient_count = 1;
        }

        self.store.insert(&yo).await?;
        self.enqueue(&yo).await?;
        accepted(&yo, "immediate");

        Ok(yo.id)
    }

    /// Records `yo` as `scheduled` without enqueueing anything.
    ///
    /// # Errors
    ///
    /// Fails like [`YoSender::send`], and with
    /// [`ApiError::Internal`] when `yo` has no due time or schedule.
    pub async fn schedule(&self, mut yo: Yo) -> Result<Yo, ApiError> {
        if yo.scheduled_for.is_none() || yo.schedule_name.is_none() {
            return Err(ApiError::Internal(format!(
                "Yo {} has no due time or schedule",
                yo.id
            )));
        }

        self.check(&yo).await?;

        yo.status = YoStatus::Scheduled;
        if !yo.needs_fanout() {
            yo.recipient_count = 1;
        }

        self.store.insert(&yo).await?;
        accepted(&yo, "scheduled");

        Ok(yo)
    }

    /// Enqueues delivery of an already recorded Yo, e.g. once its scheduled
    /// time has come. Permissions are checked again for the acting user.
    pub async fn resume(&self, yo_id: YoId) -> Result<(), ApiError> {
        let yo = self.store.get(yo_id).await?;
        self.authorise(yo.sender()?).await?;
        self.enqueue(&yo).await
    }

    async fn check(&self, yo: &Yo) -> Result<(), ApiError> {
        yo.validate()?;

        let sender = yo.sender()?;
        self.authorise(sender).await?;
        self.directory.user(sender).await?;

        if let Some(recipient) = yo.single_recipient() {
            self.directory.user(recipient).await?;
        }

        if let Some(group) = yo.group {
            self.directory.user(group).await?;
        }

        Ok(())
    }

    /// Only the sender may send as the sender, whoever is acting
    async fn authorise(&self, sender: UserId) -> Result<(), ApiError> {
        let acting = identity::acting_user().unwrap_or(sender);
        if acting != sender {
            return Err(ApiError::PermissionDenied(acting));
        }

        self.permissions.assert_can_send(sender).await
    }

    async fn enqueue(&self, yo: &Yo) -> Result<(), ApiError> {
        let (lane, job) = if yo.needs_fanout() {
            (Lane::Fanout, Job::Fanout { yo_id: yo.id })
        } else {
            (Lane::Default, Job::DispatchYo { yo_id: yo.id })
        };

        self.queue
            .enqueue(lane, job)
            .await
            .map_err(|err| ApiError::Internal(err.to_string()))
    }
}

fn accepted(yo: &Yo, kind: &str) {
    let sender = yo.sender.map(|sender| sender.to_string()).unwrap_or_default();
    audit::log_yo_accepted(
        &yo.id.to_string(),
        &sender,
        kind,
        yo.content.text.as_deref(),
    );
}
