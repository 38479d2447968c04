//! services/api/src/adapters/db.rs
//!
//! This module contains the remote store adapter, which is the concrete
//! implementation of the `RemoteResourceStore` port from the core crate. It handles
//! all interactions with the PostgreSQL database using `sqlx`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use study_core::domain::round_tenths;
use study_core::{
    Flashcard, FlashcardStatus, PortError, PortResult, QuestionType, QuizQuestion,
    RemoteResourceStore, Resource, ResourceKind, ResourceStatus, ResourceStore, StatsSource,
    UserStats,
};
use tracing::{debug, warn};
use uuid::Uuid;

/// How many recent quiz attempts feed the retention figure.
const RECENT_QUIZ_WINDOW: i64 = 10;

const RESOURCE_COLUMNS: &str = "id, title, type AS kind, original_content, summary, tags, status, created_at, last_accessed";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `RemoteResourceStore` port.
#[derive(Clone)]
pub struct PgResourceStore {
    pool: PgPool,
    user_id: Option<Uuid>,
}

impl PgResourceStore {
    /// Creates a new `PgResourceStore` acting on behalf of `user_id`.
    pub fn new(pool: PgPool, user_id: Option<Uuid>) -> Self {
        Self { pool, user_id }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    fn require_user(&self) -> PortResult<Uuid> {
        self.user_id.ok_or(PortError::Unauthorized)
    }

    /// Loads flashcards and quiz questions for the given resources, grouped by resource id.
    async fn load_children(
        &self,
        ids: &[String],
    ) -> PortResult<(HashMap<String, Vec<Flashcard>>, HashMap<String, Vec<QuizQuestion>>)> {
        let card_records = sqlx::query_as::<_, FlashcardRecord>(
            "SELECT id, resource_id, front, back, status FROM flashcards WHERE resource_id = ANY($1) ORDER BY position ASC",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let quiz_records = sqlx::query_as::<_, QuizRecord>(
            "SELECT id, resource_id, passage, question, options, correct_answer, question_type, correct_answer_text, explanation FROM quizzes WHERE resource_id = ANY($1) ORDER BY position ASC",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let mut cards: HashMap<String, Vec<Flashcard>> = HashMap::new();
        for record in card_records {
            cards
                .entry(record.resource_id.clone())
                .or_default()
                .push(record.to_domain());
        }
        let mut quizzes: HashMap<String, Vec<QuizQuestion>> = HashMap::new();
        for record in quiz_records {
            quizzes
                .entry(record.resource_id.clone())
                .or_default()
                .push(record.to_domain());
        }
        Ok((cards, quizzes))
    }
}

/// Joins resource rows with their children. A row that cannot be converted is
/// logged and left out so the rest of the listing still loads.
fn assemble_listing(
    records: Vec<ResourceRecord>,
    cards: &mut HashMap<String, Vec<Flashcard>>,
    quizzes: &mut HashMap<String, Vec<QuizQuestion>>,
) -> Vec<Resource> {
    records
        .into_iter()
        .filter_map(|record| {
            let flashcards = cards.remove(&record.id).unwrap_or_default();
            let quiz = quizzes.remove(&record.id).unwrap_or_default();
            match record.to_domain(flashcards, quiz) {
                Ok(resource) => Some(resource),
                Err(e) => {
                    warn!("Skipping unreadable resource row: {}", e);
                    None
                }
            }
        })
        .collect()
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(millis: i64) -> PortResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| PortError::Unexpected(format!("Timestamp {} is out of range", millis)))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ResourceRecord {
    id: String,
    title: String,
    kind: String,
    original_content: String,
    summary: String,
    tags: Vec<String>,
    status: String,
    created_at: DateTime<Utc>,
    last_accessed: DateTime<Utc>,
}
impl ResourceRecord {
    fn to_domain(self, flashcards: Vec<Flashcard>, quiz: Vec<QuizQuestion>) -> PortResult<Resource> {
        let kind = ResourceKind::parse(&self.kind).ok_or_else(|| {
            PortError::Unexpected(format!("Resource {} has unknown type '{}'", self.id, self.kind))
        })?;
        let status = ResourceStatus::parse(&self.status).unwrap_or(ResourceStatus::Error);
        Ok(Resource {
            id: self.id,
            title: self.title,
            kind,
            original_content: self.original_content,
            summary: self.summary,
            flashcards,
            quiz,
            created_at: to_millis(self.created_at),
            last_accessed: to_millis(self.last_accessed),
            status,
            tags: self.tags,
        })
    }
}

#[derive(FromRow)]
struct FlashcardRecord {
    id: Uuid,
    resource_id: String,
    front: String,
    back: String,
    status: String,
}
impl FlashcardRecord {
    fn to_domain(self) -> Flashcard {
        Flashcard {
            id: self.id.to_string(),
            front: self.front,
            back: self.back,
            status: FlashcardStatus::parse(&self.status),
        }
    }
}

#[derive(FromRow)]
struct QuizRecord {
    id: Uuid,
    resource_id: String,
    passage: Option<String>,
    question: String,
    options: Vec<String>,
    correct_answer: i32,
    question_type: Option<String>,
    correct_answer_text: Option<String>,
    explanation: String,
}
impl QuizRecord {
    fn to_domain(self) -> QuizQuestion {
        QuizQuestion {
            id: self.id.to_string(),
            passage: self.passage,
            question: self.question,
            options: self.options,
            correct_answer: usize::try_from(self.correct_answer).unwrap_or(0),
            question_type: self.question_type.as_deref().map(QuestionType::parse),
            correct_answer_text: self.correct_answer_text,
            explanation: self.explanation,
        }
    }
}

//=========================================================================================
// `ResourceStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ResourceStore for PgResourceStore {
    async fn list_resources(&self) -> PortResult<Vec<Resource>> {
        let user_id = self.require_user()?;
        let records = sqlx::query_as::<_, ResourceRecord>(&format!(
            "SELECT {RESOURCE_COLUMNS} FROM resources WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        if records.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        let (mut cards, mut quizzes) = self.load_children(&ids).await?;

        Ok(assemble_listing(records, &mut cards, &mut quizzes))
    }

    async fn get_resource(&self, id: &str) -> PortResult<Resource> {
        let user_id = self.require_user()?;
        let record = sqlx::query_as::<_, ResourceRecord>(&format!(
            "UPDATE resources SET last_accessed = GREATEST(last_accessed, NOW()) WHERE id = $1 AND user_id = $2 RETURNING {RESOURCE_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Resource {} not found", id)))?;

        let ids = vec![record.id.clone()];
        let (mut cards, mut quizzes) = self.load_children(&ids).await?;
        let flashcards = cards.remove(&record.id).unwrap_or_default();
        let quiz = quizzes.remove(&record.id).unwrap_or_default();
        record.to_domain(flashcards, quiz)
    }

    async fn save_resource(&self, resource: &Resource) -> PortResult<()> {
        let user_id = self.require_user()?;
        let created_at = from_millis(resource.created_at)?;
        let last_accessed = from_millis(resource.last_accessed)?;

        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let inserted = sqlx::query(
            "INSERT INTO resources (id, user_id, title, type, original_content, summary, tags, status, created_at, last_accessed) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) ON CONFLICT (id) DO NOTHING",
        )
        .bind(&resource.id)
        .bind(user_id)
        .bind(&resource.title)
        .bind(resource.kind.as_str())
        .bind(&resource.original_content)
        .bind(&resource.summary)
        .bind(&resource.tags)
        .bind(resource.status.as_str())
        .bind(created_at)
        .bind(last_accessed)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?
        .rows_affected();

        if inserted == 0 {
            debug!(id = %resource.id, "Resource already stored remotely; leaving it untouched");
            tx.rollback().await.map_err(unexpected)?;
            return Ok(());
        }

        if !resource.flashcards.is_empty() {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO flashcards (resource_id, position, front, back, status) ",
            );
            builder.push_values(
                resource.flashcards.iter().enumerate(),
                |mut row, (position, card)| {
                    row.push_bind(&resource.id)
                        .push_bind(position as i32)
                        .push_bind(&card.front)
                        .push_bind(&card.back)
                        .push_bind(card.status.as_str());
                },
            );
            builder.build().execute(&mut *tx).await.map_err(unexpected)?;
        }

        if !resource.quiz.is_empty() {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO quizzes (resource_id, position, passage, question, options, correct_answer, question_type, correct_answer_text, explanation) ",
            );
            builder.push_values(
                resource.quiz.iter().enumerate(),
                |mut row, (position, question)| {
                    row.push_bind(&resource.id)
                        .push_bind(position as i32)
                        .push_bind(&question.passage)
                        .push_bind(&question.question)
                        .push_bind(&question.options)
                        .push_bind(i32::try_from(question.correct_answer).unwrap_or(i32::MAX))
                        .push_bind(question.question_type.map(|t| t.as_str()))
                        .push_bind(&question.correct_answer_text)
                        .push_bind(&question.explanation);
                },
            );
            builder.build().execute(&mut *tx).await.map_err(unexpected)?;
        }

        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn delete_resource(&self, id: &str) -> PortResult<()> {
        let user_id = self.require_user()?;
        // Flashcards and quiz rows go with it through ON DELETE CASCADE.
        sqlx::query("DELETE FROM resources WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}

//=========================================================================================
// `RemoteResourceStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl RemoteResourceStore for PgResourceStore {
    fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }

    async fn user_stats(&self) -> PortResult<UserStats> {
        let user_id = self.require_user()?;

        let profile = sqlx::query_as::<_, (i32, i32)>(
            "SELECT streak_count, total_study_minutes FROM profiles WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool);

        let cards = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM flashcards f JOIN resources r ON r.id = f.resource_id WHERE r.user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool);

        let quizzes = sqlx::query_as::<_, (Option<i32>, Option<i32>)>(
            "SELECT score, total_questions FROM study_progress \
             WHERE user_id = $1 AND activity_type = 'quiz' AND score IS NOT NULL AND total_questions > 0 \
             ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(RECENT_QUIZ_WINDOW)
        .fetch_all(&self.pool);

        let seconds = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(duration_seconds), 0)::BIGINT FROM study_progress WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool);

        let (profile, cards, quizzes, seconds) =
            futures::try_join!(profile, cards, quizzes, seconds).map_err(unexpected)?;

        let (streak, minutes) = profile.unwrap_or((0, 0));
        let percentages: Vec<f64> = quizzes
            .into_iter()
            .filter_map(|(score, total)| match (score, total) {
                (Some(score), Some(total)) if total > 0 => {
                    Some(f64::from(score) / f64::from(total) * 100.0)
                }
                _ => None,
            })
            .collect();
        let retention = if percentages.is_empty() {
            0
        } else {
            (percentages.iter().sum::<f64>() / percentages.len() as f64)
                .round()
                .clamp(0.0, 100.0) as u32
        };
        let total_seconds = i64::from(minutes.max(0)) * 60 + seconds.max(0);

        Ok(UserStats {
            streak: u32::try_from(streak).unwrap_or(0),
            total_cards: u64::try_from(cards).unwrap_or(0),
            retention,
            hours_studied: round_tenths(total_seconds as f64 / 3600.0),
            source: StatsSource::Remote,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, kind: &str) -> ResourceRecord {
        let at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        ResourceRecord {
            id: id.to_string(),
            title: format!("Title {id}"),
            kind: kind.to_string(),
            original_content: "content".to_string(),
            summary: "summary".to_string(),
            tags: vec![],
            status: "completed".to_string(),
            created_at: at,
            last_accessed: at,
        }
    }

    #[test]
    fn unknown_type_row_is_skipped_not_fatal() {
        let mut cards = HashMap::new();
        cards.insert(
            "b".to_string(),
            vec![Flashcard {
                id: "card-1".to_string(),
                front: "Q".to_string(),
                back: "A".to_string(),
                status: FlashcardStatus::New,
            }],
        );
        let mut quizzes = HashMap::new();

        let listing = assemble_listing(
            vec![row("a", "hologram"), row("b", "document")],
            &mut cards,
            &mut quizzes,
        );

        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].id, "b");
        assert_eq!(listing[0].kind, ResourceKind::Document);
        assert_eq!(listing[0].flashcards.len(), 1);
        assert_eq!(listing[0].created_at, 1_700_000_000_000);
    }
}
