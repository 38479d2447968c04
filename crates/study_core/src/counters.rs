//! Study counters written by the focus timer and the streak tracker.
//!
//! Both are plain decimal integers in the key-value store. Anything unreadable
//! counts as zero.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

use crate::storage::KeyValueStore;

pub const FOCUS_SECONDS_KEY: &str = "study_focus_seconds";
pub const STREAK_KEY: &str = "study_streak";

/// Clones share one write guard, so every handle serialises its updates.
#[derive(Clone)]
pub struct StudyCounters {
    store: Arc<dyn KeyValueStore>,
    guard: Arc<Mutex<()>>,
}

impl StudyCounters {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            guard: Arc::new(Mutex::new(())),
        }
    }

    pub fn focus_seconds(&self) -> u64 {
        self.read(FOCUS_SECONDS_KEY)
    }

    pub fn streak(&self) -> u32 {
        u32::try_from(self.read(STREAK_KEY)).unwrap_or(u32::MAX)
    }

    /// Adds tracked focus time. The counter only ever grows.
    pub fn add_focus_seconds(&self, seconds: u64) -> u64 {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let total = self.focus_seconds().saturating_add(seconds);
        self.write(FOCUS_SECONDS_KEY, total);
        total
    }

    pub fn set_streak(&self, days: u32) {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        self.write(STREAK_KEY, u64::from(days));
    }

    fn read(&self, key: &str) -> u64 {
        match self.store.get(key) {
            Ok(Some(raw)) => raw.trim().parse().unwrap_or(0),
            Ok(None) => 0,
            Err(e) => {
                warn!(key, "Counter storage unavailable: {}", e);
                0
            }
        }
    }

    fn write(&self, key: &str, value: u64) {
        if let Err(e) = self.store.set(key, &value.to_string()) {
            warn!(key, "Failed to persist counter: {}", e);
        }
    }
}
