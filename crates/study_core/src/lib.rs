pub mod cache;
pub mod clock;
pub mod counters;
pub mod domain;
pub mod guard;
pub mod local;
pub mod obfuscation;
pub mod ports;
pub mod quota;
pub mod rate_limit;
pub mod storage;
pub mod sync;
pub mod tier;

pub use cache::ResourceCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use counters::StudyCounters;
pub use domain::{
    Flashcard, FlashcardStatus, ListingOrigin, QuestionType, QuizQuestion, Resource,
    ResourceKind, ResourceListing, ResourceStatus, StatsSource, StudySet, UserStats,
};
pub use guard::{Rejection, UsageGate, UsageKind};
pub use local::LocalResourceStore;
pub use ports::{
    PortError, PortResult, RemoteResourceStore, ResourceStore, StudyAssistantService,
};
pub use quota::{DailyQuotaRecord, DailyQuotaTracker};
pub use rate_limit::RateLimiter;
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
pub use sync::{SyncError, SyncingResourceService};
pub use tier::{limits_for, validate_input, InputContext, Tier, TierLimits, Validation};
