use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use yodel_common::{Yo, YoId, YoStatus};

use crate::{Result, r#trait::YoStore};

const DEFAULT_CAPACITY: usize = 10_000;
const STRIPES: usize = 64;

/// Read-through cache in front of another [`YoStore`].
///
/// Reads are served from the cache when possible. Every update goes to the
/// inner store first and then drops the cached copy, so the next read sees the
/// stored value.
///
/// Each update also bumps a generation counter shared by a stripe of ids. A
/// read only keeps what it fetched if no update to the same stripe landed
/// while it was fetching, so a slow read can't cache a value an update has
/// already replaced. At most `capacity` Yos are cached; past that an
/// arbitrary entry makes room.
#[derive(Debug)]
pub struct CachedYoStore {
    inner: Arc<dyn YoStore>,
    cache: DashMap<YoId, Yo>,
    generations: [AtomicU64; STRIPES],
    capacity: usize,
}

impl CachedYoStore {
    pub fn new(inner: Arc<dyn YoStore>) -> Self {
        Self::with_capacity(inner, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(inner: Arc<dyn YoStore>, capacity: usize) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
            generations: std::array::from_fn(|_| AtomicU64::new(0)),
            capacity: capacity.max(1),
        }
    }

    pub fn is_cached(&self, id: YoId) -> bool {
        self.cache.contains_key(&id)
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    fn generation(&self, id: YoId) -> &AtomicU64 {
        let stripe = u128::from(id.ulid()) % STRIPES as u128;
        &self.generations[usize::try_from(stripe).unwrap_or_default()]
    }

    /// Drops the cached copy of `id` after the inner store changed it
    fn invalidate(&self, id: YoId) {
        self.generation(id).fetch_add(1, Ordering::SeqCst);
        self.cache.remove(&id);
    }

    /// Caches `yo` unless `id`'s stripe was updated since `seen`
    fn fill(&self, yo: &Yo, seen: u64) {
        let generation = self.generation(yo.id);
        if generation.load(Ordering::SeqCst) != seen {
            return;
        }

        if self.cache.len() >= self.capacity && !self.cache.contains_key(&yo.id) {
            let victim = self.cache.iter().next().map(|entry| *entry.key());
            if let Some(victim) = victim {
                self.cache.remove(&victim);
            }
        }

        self.cache.insert(yo.id, yo.clone());

        // An update may have slipped in between the check and the insert
        if generation.load(Ordering::SeqCst) != seen {
            self.cache.remove(&yo.id);
        }
    }
}

#[async_trait]
impl YoStore for CachedYoStore {
    async fn insert(&self, yo: &Yo) -> Result<()> {
        let seen = self.generation(yo.id).load(Ordering::SeqCst);
        self.inner.insert(yo).await?;
        self.fill(yo, seen);
        Ok(())
    }

    async fn insert_many(&self, yos: &[Yo]) -> Result<usize> {
        self.inner.insert_many(yos).await
    }

    async fn get(&self, id: YoId) -> Result<Yo> {
        if let Some(yo) = self.cache.get(&id) {
            return Ok(yo.clone());
        }

        let seen = self.generation(id).load(Ordering::SeqCst);
        let yo = self.inner.get(id).await?;
        self.fill(&yo, seen);
        Ok(yo)
    }

    async fn set_status(&self, id: YoId, status: YoStatus) -> Result<()> {
        let result = self.inner.set_status(id, status).await;
        self.invalidate(id);
        result
    }

    async fn compare_and_set_status(
        &self,
        id: YoId,
        expected: YoStatus,
        new: YoStatus,
    ) -> Result<bool> {
        let result = self.inner.compare_and_set_status(id, expected, new).await;
        self.invalidate(id);
        result
    }

    async fn set_counts(&self, id: YoId, recipient_count: u64, sent_count: u64) -> Result<()> {
        let result = self.inner.set_counts(id, recipient_count, sent_count).await;
        self.invalidate(id);
        result
    }

    async fn increment_sent(&self, id: YoId, by: u64) -> Result<u64> {
        let result = self.inner.increment_sent(id, by).await;
        self.invalidate(id);
        result
    }

    async fn children_of(&self, parent: YoId) -> Result<Vec<Yo>> {
        self.inner.children_of(parent).await
    }

    async fn due_scheduled(
        &self,
        schedule: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Yo>> {
        self.inner.due_scheduled(schedule, from, to).await
    }

    async fn next_due(
        &self,
        schedule: &str,
        after: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        self.inner.next_due(schedule, after).await
    }

    fn evict(&self, id: YoId) {
        self.invalidate(id);
    }
}
