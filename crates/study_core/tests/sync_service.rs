use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use study_core::cache::DEFAULT_CACHE_KEY;
use study_core::{
    Clock, Flashcard, FlashcardStatus, KeyValueStore, ListingOrigin, LocalResourceStore,
    ManualClock, MemoryStore, PortError, PortResult, QuizQuestion, RemoteResourceStore, Resource,
    ResourceCache, ResourceKind, ResourceStatus, ResourceStore, StatsSource, StudyCounters,
    SyncError, SyncingResourceService, UserStats,
};
use uuid::Uuid;

#[derive(Clone, Copy, PartialEq)]
enum Mode {
    Healthy,
    Failing,
    Hanging,
}

struct FakeRemote {
    mode: Mode,
    user: Option<Uuid>,
    rows: Mutex<Vec<Resource>>,
    saves: Mutex<usize>,
}

impl FakeRemote {
    fn new(mode: Mode) -> Self {
        Self {
            mode,
            user: Some(Uuid::new_v4()),
            rows: Mutex::new(Vec::new()),
            saves: Mutex::new(0),
        }
    }

    fn signed_out() -> Self {
        Self {
            user: None,
            ..Self::new(Mode::Healthy)
        }
    }

    async fn gate(&self) -> PortResult<()> {
        match self.mode {
            Mode::Healthy => Ok(()),
            Mode::Failing => Err(PortError::Unexpected("connection refused".to_string())),
            Mode::Hanging => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl ResourceStore for FakeRemote {
    async fn list_resources(&self) -> PortResult<Vec<Resource>> {
        self.gate().await?;
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn get_resource(&self, id: &str) -> PortResult<Resource> {
        self.gate().await?;
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(id.to_string()))
    }

    async fn save_resource(&self, resource: &Resource) -> PortResult<()> {
        self.gate().await?;
        *self.saves.lock().unwrap() += 1;
        self.rows.lock().unwrap().insert(0, resource.clone());
        Ok(())
    }

    async fn delete_resource(&self, id: &str) -> PortResult<()> {
        self.gate().await?;
        self.rows.lock().unwrap().retain(|r| r.id != id);
        Ok(())
    }
}

#[async_trait]
impl RemoteResourceStore for FakeRemote {
    fn user_id(&self) -> Option<Uuid> {
        self.user
    }

    async fn user_stats(&self) -> PortResult<UserStats> {
        self.gate().await?;
        Ok(UserStats {
            streak: 12,
            total_cards: 340,
            retention: 81,
            hours_studied: 22.5,
            source: StatsSource::Remote,
        })
    }
}

fn resource(id: &str) -> Resource {
    Resource {
        id: id.to_string(),
        title: format!("Resource {id}"),
        kind: ResourceKind::Document,
        original_content: "Cells are the basic unit of life.".to_string(),
        summary: "## Cells".to_string(),
        flashcards: vec![
            Flashcard {
                id: format!("{id}-1"),
                front: "Basic unit of life?".to_string(),
                back: "The cell".to_string(),
                status: FlashcardStatus::Mastered,
            },
            Flashcard {
                id: format!("{id}-2"),
                front: "Powerhouse?".to_string(),
                back: "Mitochondria".to_string(),
                status: FlashcardStatus::Learning,
            },
        ],
        quiz: vec![QuizQuestion {
            id: format!("{id}-q1"),
            passage: None,
            question: "What is the basic unit of life?".to_string(),
            options: vec!["Atom".to_string(), "Cell".to_string()],
            correct_answer: 1,
            question_type: None,
            correct_answer_text: None,
            explanation: "Cells make up all living things.".to_string(),
        }],
        created_at: 1_760_000_000_000,
        last_accessed: 1_760_000_000_000,
        status: ResourceStatus::Ready,
        tags: vec!["biology".to_string()],
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
    service: SyncingResourceService,
}

fn harness(remote: Option<Arc<dyn RemoteResourceStore>>) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::at_date(2026, 10, 15));
    let cache = ResourceCache::open(store.clone(), DEFAULT_CACHE_KEY, 50);
    let local = Arc::new(LocalResourceStore::new(
        cache,
        StudyCounters::new(store.clone()),
        clock.clone(),
    ));
    let service = SyncingResourceService::new(local, remote, Duration::from_millis(50));
    Harness {
        store,
        clock,
        service,
    }
}

#[tokio::test]
async fn create_then_get_survives_a_failing_remote() {
    let h = harness(Some(Arc::new(FakeRemote::new(Mode::Failing))));
    h.service.create_resource(resource("r1")).await.unwrap();

    let fetched = h.service.get_resource("r1").await.unwrap();
    assert_eq!(fetched.id, "r1");
    assert_eq!(fetched.last_accessed, h.clock.now_millis());
}

#[tokio::test]
async fn create_then_get_survives_a_hanging_remote() {
    let h = harness(Some(Arc::new(FakeRemote::new(Mode::Hanging))));
    h.service.create_resource(resource("r1")).await.unwrap();
    assert_eq!(h.service.get_resource("r1").await.unwrap().id, "r1");

    let listing = h.service.list_resources().await;
    assert_eq!(listing.origin, ListingOrigin::RemoteUnavailable);
    assert_eq!(listing.resources.len(), 1);
}

#[tokio::test]
async fn create_writes_both_sides_when_healthy() {
    let remote = Arc::new(FakeRemote::new(Mode::Healthy));
    let h = harness(Some(remote.clone()));
    h.service.create_resource(resource("r1")).await.unwrap();

    assert_eq!(*remote.saves.lock().unwrap(), 1);
    assert_eq!(h.service.local().snapshot().len(), 1);
    assert!(h.store.get(DEFAULT_CACHE_KEY).unwrap().is_some());
}

#[tokio::test]
async fn signed_out_remote_reports_but_keeps_local_copy() {
    let remote = Arc::new(FakeRemote::signed_out());
    let h = harness(Some(remote.clone()));

    let err = h.service.create_resource(resource("r1")).await.unwrap_err();
    assert!(matches!(err, SyncError::NotAuthenticated));
    assert_eq!(*remote.saves.lock().unwrap(), 0);
    assert_eq!(h.service.local().snapshot()[0].id, "r1");
}

#[tokio::test]
async fn malformed_quiz_is_rejected_before_any_write() {
    let h = harness(None);
    let mut bad = resource("r1");
    bad.quiz[0].correct_answer = 7;
    let err = h.service.create_resource(bad).await.unwrap_err();
    assert!(matches!(err, SyncError::InvalidResource(_)));
    assert!(h.service.local().is_empty());
}

#[tokio::test]
async fn listing_origins() {
    // Remote has data: remote wins.
    let remote = Arc::new(FakeRemote::new(Mode::Healthy));
    remote.rows.lock().unwrap().push(resource("remote-only"));
    let h = harness(Some(remote));
    let listing = h.service.list_resources().await;
    assert_eq!(listing.origin, ListingOrigin::Remote);
    assert_eq!(listing.resources[0].id, "remote-only");

    // Both empty: the empty remote answer is authoritative.
    let h = harness(Some(Arc::new(FakeRemote::new(Mode::Healthy))));
    let listing = h.service.list_resources().await;
    assert_eq!(listing.origin, ListingOrigin::Remote);
    assert!(listing.resources.is_empty());

    // Remote empty, local populated: local is kept.
    let h = harness(Some(Arc::new(FakeRemote::new(Mode::Healthy))));
    h.service.local().insert(resource("cached"));
    let listing = h.service.list_resources().await;
    assert_eq!(listing.origin, ListingOrigin::RemoteEmpty);
    assert_eq!(listing.resources[0].id, "cached");

    // No remote at all.
    let h = harness(None);
    assert_eq!(h.service.list_resources().await.origin, ListingOrigin::LocalOnly);
}

#[tokio::test]
async fn get_prefers_remote_and_falls_back_on_miss() {
    let remote = Arc::new(FakeRemote::new(Mode::Healthy));
    let mut remote_copy = resource("shared");
    remote_copy.title = "Remote title".to_string();
    remote.rows.lock().unwrap().push(remote_copy);
    let h = harness(Some(remote));

    let mut local_copy = resource("shared");
    local_copy.title = "Local title".to_string();
    h.service.local().insert(local_copy);
    h.service.local().insert(resource("local-only"));

    assert_eq!(
        h.service.get_resource("shared").await.unwrap().title,
        "Remote title"
    );
    assert_eq!(
        h.service.get_resource("local-only").await.unwrap().id,
        "local-only"
    );
    assert!(h.service.get_resource("nowhere").await.is_none());
}

#[tokio::test]
async fn delete_is_local_first_and_tolerates_remote_failure() {
    let h = harness(Some(Arc::new(FakeRemote::new(Mode::Failing))));
    h.service.create_resource(resource("r1")).await.unwrap();
    assert!(h.service.delete_resource("r1").await);
    assert!(!h.service.delete_resource("r1").await);
    assert!(h.service.get_resource("r1").await.is_none());
}

#[tokio::test]
async fn stats_prefer_remote() {
    let h = harness(Some(Arc::new(FakeRemote::new(Mode::Healthy))));
    let stats = h.service.user_stats().await;
    assert_eq!(stats.source, StatsSource::Remote);
    assert_eq!(stats.total_cards, 340);
}

#[tokio::test]
async fn stats_fall_back_to_local_counters() {
    let h = harness(Some(Arc::new(FakeRemote::new(Mode::Hanging))));
    h.service.create_resource(resource("r1")).await.unwrap();
    h.service.create_resource(resource("r2")).await.unwrap();
    let counters = StudyCounters::new(h.store.clone());
    counters.add_focus_seconds(7_200);
    counters.set_streak(3);

    let stats = h.service.user_stats().await;
    assert_eq!(stats.source, StatsSource::Local);
    assert_eq!(stats.total_cards, 4);
    assert_eq!(stats.retention, 50);
    assert_eq!(stats.hours_studied, 2.0);
    assert_eq!(stats.streak, 3);
}
