//! crates/study_core/src/local.rs
//!
//! The local half of resource storage: a `ResourceCache` behind a mutex that
//! persists synchronously after every mutation. None of its operations suspend
//! while the lock is held.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use crate::cache::ResourceCache;
use crate::clock::Clock;
use crate::counters::StudyCounters;
use crate::domain::{round_tenths, Resource, StatsSource, UserStats};
use crate::ports::{PortError, PortResult, ResourceStore};

pub struct LocalResourceStore {
    cache: Mutex<ResourceCache>,
    counters: StudyCounters,
    clock: Arc<dyn Clock>,
}

impl LocalResourceStore {
    pub fn new(cache: ResourceCache, counters: StudyCounters, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache: Mutex::new(cache),
            counters,
            clock,
        }
    }

    fn cache(&self) -> MutexGuard<'_, ResourceCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of the cached list, most recent first.
    pub fn snapshot(&self) -> Vec<Resource> {
        self.cache().resources().to_vec()
    }

    pub fn is_empty(&self) -> bool {
        self.cache().is_empty()
    }

    /// Head-inserts a resource unless its id is already cached, then persists.
    pub fn insert(&self, resource: Resource) -> bool {
        let mut cache = self.cache();
        let inserted = cache.upsert_front(resource);
        cache.persist();
        inserted
    }

    /// Looks a resource up, records the access and persists.
    pub fn touch(&self, id: &str) -> Option<Resource> {
        let now = self.clock.now_millis();
        let mut cache = self.cache();
        let resource = cache.touch(id, now)?;
        cache.persist();
        Some(resource)
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut cache = self.cache();
        let removed = cache.remove(id);
        cache.persist();
        removed
    }

    /// Approximates user statistics from cached resources and local counters.
    pub fn local_stats(&self) -> UserStats {
        let (total, mastered) = {
            let cache = self.cache();
            cache.resources().iter().fold((0usize, 0usize), |(t, m), r| {
                (t + r.flashcards.len(), m + r.mastered_cards())
            })
        };
        let retention = if total == 0 {
            0
        } else {
            ((mastered as f64 / total as f64) * 100.0).round() as u32
        };
        let stats = UserStats {
            streak: self.counters.streak(),
            total_cards: total as u64,
            retention,
            hours_studied: round_tenths(self.counters.focus_seconds() as f64 / 3600.0),
            source: StatsSource::Local,
        };
        debug!(?stats, "Computed local stats");
        stats
    }

    pub fn counters(&self) -> &StudyCounters {
        &self.counters
    }
}

#[async_trait]
impl ResourceStore for LocalResourceStore {
    async fn list_resources(&self) -> PortResult<Vec<Resource>> {
        Ok(self.snapshot())
    }

    async fn get_resource(&self, id: &str) -> PortResult<Resource> {
        self.touch(id)
            .ok_or_else(|| PortError::NotFound(format!("Resource {} not cached", id)))
    }

    async fn save_resource(&self, resource: &Resource) -> PortResult<()> {
        self.insert(resource.clone());
        Ok(())
    }

    async fn delete_resource(&self, id: &str) -> PortResult<()> {
        self.remove(id);
        Ok(())
    }
}
