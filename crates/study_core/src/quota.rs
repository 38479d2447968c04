//! Daily usage quotas persisted across sessions.
//!
//! A tracker keeps one `{count, date}` record under its own key. The record
//! only counts usage for the calendar day it names; reading it on any other
//! day is the same as reading a zero count.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::clock::Clock;
use crate::storage::KeyValueStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyQuotaRecord {
    pub count: u32,
    pub date: String,
}

pub struct DailyQuotaTracker {
    key: String,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    // Serialises load-modify-store so two checks cannot both take the last unit.
    guard: Mutex<()>,
}

impl DailyQuotaTracker {
    pub fn new(key: impl Into<String>, store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            key: key.into(),
            store,
            clock,
            guard: Mutex::new(()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Consumes one unit of today's quota, returning false when `limit` is
    /// already reached. The first call on a new day always succeeds.
    pub fn check(&self, limit: u32) -> bool {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let today = self.clock.today();
        let record = self.load(&today);

        if record.date != today {
            self.save(&DailyQuotaRecord { count: 1, date: today });
            return true;
        }
        if record.count >= limit {
            return false;
        }
        self.save(&DailyQuotaRecord {
            count: record.count + 1,
            date: today,
        });
        true
    }

    /// Whether `check(limit)` would refuse right now. Consumes nothing.
    pub fn is_exhausted(&self, limit: u32) -> bool {
        let today = self.clock.today();
        let record = self.load(&today);
        record.date == today && record.count >= limit
    }

    /// Units left today under `limit`.
    pub fn remaining(&self, limit: u32) -> u32 {
        let today = self.clock.today();
        let record = self.load(&today);
        if record.date != today {
            return limit;
        }
        limit.saturating_sub(record.count)
    }

    /// Units consumed today.
    pub fn current_count(&self) -> u32 {
        let today = self.clock.today();
        let record = self.load(&today);
        if record.date != today {
            return 0;
        }
        record.count
    }

    fn load(&self, today: &str) -> DailyQuotaRecord {
        let empty = || DailyQuotaRecord {
            count: 0,
            date: today.to_string(),
        };
        match self.store.get(&self.key) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(key = %self.key, "Discarding unreadable quota record: {}", e);
                empty()
            }),
            Ok(None) => empty(),
            Err(e) => {
                warn!(key = %self.key, "Quota storage unavailable, allowing usage: {}", e);
                empty()
            }
        }
    }

    fn save(&self, record: &DailyQuotaRecord) {
        let result = serde_json::to_string(record)
            .map_err(|e| e.to_string())
            .and_then(|raw| self.store.set(&self.key, &raw).map_err(|e| e.to_string()));
        if let Err(e) = result {
            warn!(key = %self.key, "Failed to persist quota record: {}", e);
        }
    }
}

impl std::fmt::Debug for DailyQuotaTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DailyQuotaTracker")
            .field("key", &self.key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::{MemoryStore, StorageError, StorageResult};
    use chrono::Duration;

    fn tracker() -> (Arc<ManualClock>, Arc<MemoryStore>, DailyQuotaTracker) {
        let clock = Arc::new(ManualClock::at_date(2026, 10, 15));
        let store = Arc::new(MemoryStore::new());
        let tracker = DailyQuotaTracker::new("quota_daily_uploads", store.clone(), clock.clone());
        (clock, store, tracker)
    }

    #[test]
    fn fifty_uploads_then_next_day() {
        let (clock, _store, tracker) = tracker();
        for _ in 0..50 {
            assert!(tracker.check(50));
        }
        assert!(!tracker.check(50));
        assert_eq!(tracker.current_count(), 50);

        clock.advance(Duration::days(1));
        assert!(tracker.check(50));
        assert_eq!(tracker.current_count(), 1);
    }

    #[test]
    fn remaining_tracks_successful_checks() {
        let (_clock, _store, tracker) = tracker();
        assert_eq!(tracker.remaining(5), 5);
        for k in 1..=5 {
            assert!(tracker.check(5));
            assert_eq!(tracker.remaining(5), 5 - k);
        }
        assert!(!tracker.check(5));
        assert_eq!(tracker.remaining(5), 0);
    }

    #[test]
    fn exhaustion_matches_check_without_consuming() {
        let (clock, _store, tracker) = tracker();
        assert!(!tracker.is_exhausted(2));
        assert!(tracker.check(2));
        assert!(tracker.check(2));
        assert!(tracker.is_exhausted(2));
        assert_eq!(tracker.current_count(), 2);

        clock.advance(Duration::days(1));
        assert!(!tracker.is_exhausted(0));
        assert!(tracker.check(0));
    }

    #[test]
    fn stale_record_resets_even_when_over_limit() {
        let (_clock, store, tracker) = tracker();
        store
            .set(
                "quota_daily_uploads",
                r#"{"count":999,"date":"2026-10-14"}"#,
            )
            .unwrap();
        assert_eq!(tracker.current_count(), 0);
        assert_eq!(tracker.remaining(3), 3);
        assert!(tracker.check(3));

        let raw = store.get("quota_daily_uploads").unwrap().unwrap();
        let record: DailyQuotaRecord = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            record,
            DailyQuotaRecord {
                count: 1,
                date: "2026-10-15".to_string()
            }
        );
    }

    #[test]
    fn evaluates_against_the_current_limit() {
        let (_clock, _store, tracker) = tracker();
        for _ in 0..3 {
            assert!(tracker.check(3));
        }
        assert!(!tracker.check(3));
        // Tier upgraded mid-day.
        assert_eq!(tracker.remaining(10), 7);
        assert!(tracker.check(10));
        // And downgraded again.
        assert_eq!(tracker.remaining(2), 0);
        assert!(!tracker.check(2));
    }

    #[test]
    fn corrupt_record_counts_as_empty() {
        let (_clock, store, tracker) = tracker();
        store.set("quota_daily_uploads", "{not json").unwrap();
        assert_eq!(tracker.current_count(), 0);
        assert!(tracker.check(1));
        assert_eq!(tracker.current_count(), 1);
    }

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> StorageResult<Option<String>> {
            Err(StorageError::Io(std::io::Error::other("disk gone")))
        }
        fn set(&self, _key: &str, _value: &str) -> StorageResult<()> {
            Err(StorageError::Io(std::io::Error::other("disk gone")))
        }
        fn remove(&self, _key: &str) -> StorageResult<()> {
            Ok(())
        }
    }

    #[test]
    fn unavailable_storage_degrades_to_allow() {
        let clock = Arc::new(ManualClock::at_date(2026, 10, 15));
        let tracker = DailyQuotaTracker::new("quota_daily_chats", Arc::new(BrokenStore), clock);
        for _ in 0..10 {
            assert!(tracker.check(2));
        }
        assert_eq!(tracker.remaining(2), 2);
    }
}
