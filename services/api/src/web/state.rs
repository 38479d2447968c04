//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the wiring that builds it.

use crate::config::Config;
use std::sync::Arc;
use study_core::cache::DEFAULT_CACHE_KEY;
use study_core::{
    Clock, DailyQuotaTracker, KeyValueStore, LocalResourceStore, RateLimiter, RemoteResourceStore,
    ResourceCache, StudyAssistantService, StudyCounters, SyncingResourceService, Tier, UsageGate,
    UsageKind,
};

pub const UPLOAD_QUOTA_KEY: &str = "quota_daily_uploads";
pub const CHAT_QUOTA_KEY: &str = "quota_daily_chats";

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub resources: Arc<SyncingResourceService>,
    pub assistant: Option<Arc<dyn StudyAssistantService>>,
    pub uploads: Arc<UsageGate>,
    pub chats: Arc<UsageGate>,
    pub counters: StudyCounters,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Wires the cache, limiters and sync service over a local store and an
    /// optional remote store.
    pub fn build(
        config: Arc<Config>,
        store: Arc<dyn KeyValueStore>,
        remote: Option<Arc<dyn RemoteResourceStore>>,
        assistant: Option<Arc<dyn StudyAssistantService>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = ResourceCache::open(store.clone(), DEFAULT_CACHE_KEY, config.cache_capacity);
        let counters = StudyCounters::new(store.clone());
        let local = Arc::new(LocalResourceStore::new(cache, counters.clone(), clock.clone()));
        let resources = Arc::new(SyncingResourceService::new(
            local,
            remote,
            config.remote_timeout,
        ));

        let uploads = Arc::new(UsageGate::new(
            UsageKind::Upload,
            RateLimiter::new(
                config.upload_burst_limit,
                config.upload_burst_window,
                clock.clone(),
            ),
            DailyQuotaTracker::new(UPLOAD_QUOTA_KEY, store.clone(), clock.clone()),
        ));
        let chats = Arc::new(UsageGate::new(
            UsageKind::Chat,
            RateLimiter::new(config.chat_burst_limit, config.chat_burst_window, clock.clone()),
            DailyQuotaTracker::new(CHAT_QUOTA_KEY, store, clock.clone()),
        ));

        Self {
            config,
            resources,
            assistant,
            uploads,
            chats,
            counters,
            clock,
        }
    }

    /// The tier source; read-only for the lifetime of the process.
    pub fn tier(&self) -> Tier {
        self.config.tier
    }
}
