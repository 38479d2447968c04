//! crates/study_core/src/cache.rs
//!
//! The in-memory resource list backing the local fallback path, seeded from the
//! obfuscated blob in the key-value store.
//!
//! Order is most recent first. When a write cannot be persisted (for example the
//! store is full), the in-memory list stays authoritative for the rest of the
//! session and the persisted copy lags behind it.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::Resource;
use crate::obfuscation;
use crate::storage::KeyValueStore;

pub const DEFAULT_CACHE_KEY: &str = "study_resources";
pub const DEFAULT_CAPACITY: usize = 50;

pub struct ResourceCache {
    store: Arc<dyn KeyValueStore>,
    key: String,
    capacity: usize,
    resources: Vec<Resource>,
}

impl ResourceCache {
    /// Creates a cache and loads whatever the store currently holds.
    pub fn open(store: Arc<dyn KeyValueStore>, key: impl Into<String>, capacity: usize) -> Self {
        let mut cache = Self {
            store,
            key: key.into(),
            capacity: capacity.max(1),
            resources: Vec::new(),
        };
        cache.resources = cache.load();
        cache
    }

    /// Reads and decodes the persisted list. Absent or corrupt data is an empty list.
    pub fn load(&self) -> Vec<Resource> {
        match self.store.get(&self.key) {
            Ok(Some(blob)) => match obfuscation::decode::<Vec<Resource>>(&blob) {
                Some(mut resources) => {
                    resources.truncate(self.capacity);
                    debug!(count = resources.len(), "Loaded cached resources");
                    resources
                }
                None => {
                    warn!(key = %self.key, "Ignoring unreadable resource cache blob");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(key = %self.key, "Resource cache storage unavailable: {}", e);
                Vec::new()
            }
        }
    }

    /// Encodes and writes the current list. Failures are logged, not returned.
    pub fn persist(&self) -> bool {
        let blob = match obfuscation::encode(&self.resources) {
            Ok(blob) => blob,
            Err(e) => {
                warn!(key = %self.key, "Failed to encode resource cache: {}", e);
                return false;
            }
        };
        match self.store.set(&self.key, &blob) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    key = %self.key,
                    count = self.resources.len(),
                    "Failed to persist resource cache, keeping it in memory only: {}",
                    e
                );
                false
            }
        }
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id == id)
    }

    /// Inserts at the head unless the id is already cached, then drops the
    /// oldest entries beyond capacity. Returns whether the resource was inserted.
    pub fn upsert_front(&mut self, resource: Resource) -> bool {
        if self.find_by_id(&resource.id).is_some() {
            return false;
        }
        self.resources.insert(0, resource);
        if self.resources.len() > self.capacity {
            let dropped = self.resources.len() - self.capacity;
            self.resources.truncate(self.capacity);
            debug!(dropped, "Evicted oldest cached resources");
        }
        true
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.resources.len();
        self.resources.retain(|r| r.id != id);
        self.resources.len() != before
    }

    /// Records an access and returns the updated resource.
    pub fn touch(&mut self, id: &str, now_millis: i64) -> Option<Resource> {
        let resource = self.resources.iter_mut().find(|r| r.id == id)?;
        resource.touch(now_millis);
        Some(resource.clone())
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::{Flashcard, FlashcardStatus, ResourceKind, ResourceStatus};
    use crate::storage::MemoryStore;

    pub(crate) fn resource(id: &str, title: &str) -> Resource {
        Resource {
            id: id.to_string(),
            title: title.to_string(),
            kind: ResourceKind::Text,
            original_content: format!("{title} source"),
            summary: format!("{title} summary"),
            flashcards: vec![Flashcard {
                id: format!("{id}-c1"),
                front: "front".to_string(),
                back: "back".to_string(),
                status: FlashcardStatus::New,
            }],
            quiz: vec![],
            created_at: 1_000,
            last_accessed: 1_000,
            status: ResourceStatus::Ready,
            tags: vec!["biology".to_string()],
        }
    }

    fn ids(cache: &ResourceCache) -> Vec<String> {
        cache.resources().iter().map(|r| r.id.clone()).collect()
    }

    #[test]
    fn cap_keeps_most_recent_first() {
        let mut cache = ResourceCache::open(Arc::new(MemoryStore::new()), DEFAULT_CACHE_KEY, 3);
        for i in 0..7 {
            assert!(cache.upsert_front(resource(&format!("r{i}"), "t")));
        }
        assert_eq!(cache.len(), 3);
        assert_eq!(ids(&cache), vec!["r6", "r5", "r4"]);
    }

    #[test]
    fn duplicate_id_keeps_first_record() {
        let mut cache = ResourceCache::open(Arc::new(MemoryStore::new()), DEFAULT_CACHE_KEY, 50);
        assert!(cache.upsert_front(resource("dup", "First")));
        assert!(!cache.upsert_front(resource("dup", "Second")));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.find_by_id("dup").unwrap().title, "First");
    }

    #[test]
    fn persisted_list_is_seen_by_a_new_cache() {
        let store = Arc::new(MemoryStore::new());
        let mut cache = ResourceCache::open(store.clone(), DEFAULT_CACHE_KEY, 50);
        cache.upsert_front(resource("a", "A"));
        cache.upsert_front(resource("b", "B"));
        assert!(cache.persist());

        let raw = store.get(DEFAULT_CACHE_KEY).unwrap().unwrap();
        assert!(raw.starts_with(obfuscation::MARKER));

        let reloaded = ResourceCache::open(store, DEFAULT_CACHE_KEY, 50);
        assert_eq!(ids(&reloaded), vec!["b", "a"]);
        assert_eq!(reloaded.find_by_id("a"), cache.find_by_id("a"));
    }

    #[test]
    fn corrupt_blob_loads_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set(DEFAULT_CACHE_KEY, "obf1:%%%").unwrap();
        assert!(ResourceCache::open(store.clone(), DEFAULT_CACHE_KEY, 50).is_empty());
        store.set(DEFAULT_CACHE_KEY, "[{\"id\":\"plain\"}]").unwrap();
        assert!(ResourceCache::open(store, DEFAULT_CACHE_KEY, 50).is_empty());
    }

    #[test]
    fn full_store_keeps_memory_authoritative() {
        let store = Arc::new(MemoryStore::with_quota(64));
        let mut cache = ResourceCache::open(store.clone(), DEFAULT_CACHE_KEY, 50);
        cache.upsert_front(resource("big", "A title long enough to overflow"));
        assert!(!cache.persist());
        assert_eq!(cache.len(), 1);
        assert_eq!(store.get(DEFAULT_CACHE_KEY).unwrap(), None);
    }

    #[test]
    fn remove_and_touch() {
        let mut cache = ResourceCache::open(Arc::new(MemoryStore::new()), DEFAULT_CACHE_KEY, 50);
        cache.upsert_front(resource("a", "A"));
        assert_eq!(cache.touch("a", 5_000).unwrap().last_accessed, 5_000);
        assert_eq!(cache.touch("a", 4_000).unwrap().last_accessed, 5_000);
        assert!(cache.touch("missing", 1).is_none());
        assert!(cache.remove("a"));
        assert!(!cache.remove("a"));
    }
}
