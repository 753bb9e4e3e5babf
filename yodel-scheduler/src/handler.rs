use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use yodel_common::{UserId, YoId};

use crate::error::SchedulerError;

/// One occurrence of scheduled work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledItem {
    pub id: YoId,
    /// Tag of the handler responsible for the item
    pub job_type: &'static str,
    pub due: DateTime<Utc>,
    /// Identity the work is executed as
    pub owner: UserId,
}

impl ScheduledItem {
    /// How late the item is at `now`, zero if not yet due
    pub fn lag(&self, now: DateTime<Utc>) -> Duration {
        (now - self.due).to_std().unwrap_or_default()
    }
}

/// What [`ScheduleHandler::execute`] did with an item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    /// The item moved to `started` and was handed to the send path
    Started,
    /// Someone else moved the item on first
    ClaimedElsewhere,
}

/// Extension points for one kind of scheduled work
#[async_trait]
pub trait ScheduleHandler: Send + Sync {
    fn job_type(&self) -> &'static str;

    /// Items due at `now`, earliest first. Only items due within the grace
    /// window are returned; anything older has been missed.
    async fn discover(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledItem>, SchedulerError>;

    /// Time from `now` until the next item falls due, if any is waiting
    async fn next_delay(&self, now: DateTime<Utc>) -> Result<Option<Duration>, SchedulerError>;

    /// Claims `item` and hands it on, at most once per item
    async fn execute(&self, item: &ScheduledItem) -> Result<Execution, SchedulerError>;

    /// Called as soon as an item is scheduled, long before it is due
    async fn on_new(&self, item: &ScheduledItem);

    async fn on_failure(&self, item: &ScheduledItem, error: &SchedulerError);
}
