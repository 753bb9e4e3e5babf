use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use yodel_common::{Yo, YoId, YoStatus};

use crate::{Result, StoreError, r#trait::YoStore};

/// In-memory Yo store
///
/// Yos live in a `HashMap` behind an `RwLock`. Every field-scoped update takes
/// the write lock for just that one field change, which is what gives the
/// compare-and-set its atomicity.
#[derive(Debug, Clone, Default)]
pub struct MemoryYoStore {
    yos: Arc<RwLock<HashMap<YoId, Yo>>>,
}

impl MemoryYoStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recovers gracefully if the lock is poisoned
    #[must_use]
    pub fn len(&self) -> usize {
        self.yos
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn update<T>(&self, id: YoId, f: impl FnOnce(&mut Yo) -> T) -> Result<T> {
        self.yos
            .write()?
            .get_mut(&id)
            .map(f)
            .ok_or(StoreError::NotFound(id))
    }

    fn scheduled_on(yo: &Yo, schedule: &str) -> Option<DateTime<Utc>> {
        (yo.status == YoStatus::Scheduled && yo.schedule_name.as_deref() == Some(schedule))
            .then_some(yo.scheduled_for)
            .flatten()
    }
}

#[async_trait]
impl YoStore for MemoryYoStore {
    async fn insert(&self, yo: &Yo) -> Result<()> {
        let mut yos = self.yos.write()?;
        if yos.contains_key(&yo.id) {
            return Err(StoreError::AlreadyExists(yo.id));
        }

        yos.insert(yo.id, yo.clone());
        Ok(())
    }

    async fn insert_many(&self, batch: &[Yo]) -> Result<usize> {
        let mut yos = self.yos.write()?;
        if let Some(existing) = batch.iter().find(|yo| yos.contains_key(&yo.id)) {
            return Err(StoreError::AlreadyExists(existing.id));
        }

        yos.extend(batch.iter().map(|yo| (yo.id, yo.clone())));
        Ok(batch.len())
    }

    async fn get(&self, id: YoId) -> Result<Yo> {
        self.yos
            .read()?
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn set_status(&self, id: YoId, status: YoStatus) -> Result<()> {
        self.update(id, |yo| yo.status = status)
    }

    async fn compare_and_set_status(
        &self,
        id: YoId,
        expected: YoStatus,
        new: YoStatus,
    ) -> Result<bool> {
        self.update(id, |yo| {
            let matched = yo.status == expected;
            if matched {
                yo.status = new;
            }
            matched
        })
    }

    async fn set_counts(&self, id: YoId, recipient_count: u64, sent_count: u64) -> Result<()> {
        self.update(id, |yo| {
            yo.recipient_count = recipient_count;
            yo.sent_count = sent_count;
        })
    }

    async fn increment_sent(&self, id: YoId, by: u64) -> Result<u64> {
        self.update(id, |yo| {
            yo.sent_count += by;
            yo.sent_count
        })
    }

    async fn children_of(&self, parent: YoId) -> Result<Vec<Yo>> {
        let mut children: Vec<_> = self
            .yos
            .read()?
            .values()
            .filter(|yo| yo.parent == Some(parent))
            .cloned()
            .collect();

        // ULIDs are lexicographically sortable by creation time
        children.sort_by_key(|yo| yo.id);

        Ok(children)
    }

    async fn due_scheduled(
        &self,
        schedule: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Yo>> {
        let mut due: Vec<_> = self
            .yos
            .read()?
            .values()
            .filter_map(|yo| {
                Self::scheduled_on(yo, schedule)
                    .filter(|at| (from..=to).contains(at))
                    .map(|at| (at, yo.clone()))
            })
            .collect();

        due.sort_by_key(|(at, yo)| (*at, yo.id));

        Ok(due.into_iter().map(|(_, yo)| yo).collect())
    }

    async fn next_due(
        &self,
        schedule: &str,
        after: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .yos
            .read()?
            .values()
            .filter_map(|yo| Self::scheduled_on(yo, schedule))
            .filter(|at| *at > after)
            .min())
    }
}
