use async_trait::async_trait;
use chrono::{DateTime, Utc};
use yodel_common::{Yo, YoId, YoStatus};

use crate::Result;

/// Persistence for Yos.
///
/// A Yo is written once and afterwards only touched through the field-scoped
/// updates below, never overwritten wholesale, so fan-out and per-child
/// dispatch can't clobber each other's changes.
#[async_trait]
pub trait YoStore: Send + Sync + std::fmt::Debug {
    async fn insert(&self, yo: &Yo) -> Result<()>;

    /// Bulk insert, returning how many rows were written
    async fn insert_many(&self, yos: &[Yo]) -> Result<usize>;

    async fn get(&self, id: YoId) -> Result<Yo>;

    async fn set_status(&self, id: YoId, status: YoStatus) -> Result<()>;

    /// Set `status` to `new` only if it is currently `expected`.
    ///
    /// Returns whether the transition happened.
    async fn compare_and_set_status(
        &self,
        id: YoId,
        expected: YoStatus,
        new: YoStatus,
    ) -> Result<bool>;

    async fn set_counts(&self, id: YoId, recipient_count: u64, sent_count: u64) -> Result<()>;

    /// Adds `by` to `sent_count`, returning the new value
    async fn increment_sent(&self, id: YoId, by: u64) -> Result<u64>;

    /// Children created by fan-out, in creation order
    async fn children_of(&self, parent: YoId) -> Result<Vec<Yo>>;

    /// `scheduled` Yos on `schedule` whose due time lies in `[from, to]`,
    /// earliest first
    async fn due_scheduled(
        &self,
        schedule: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Yo>>;

    /// Earliest due time after `after` among `scheduled` Yos on `schedule`
    async fn next_due(&self, schedule: &str, after: DateTime<Utc>)
    -> Result<Option<DateTime<Utc>>>;

    /// Drop any cached copy of `id`. Only meaningful for caching stores.
    fn evict(&self, _id: YoId) {}
}
