//! crates/study_core/src/domain.rs
//!
//! Defines the core data structures for study content.
//! These are the same shapes that are persisted in the local blob and returned
//! by the REST layer, so they carry camelCase serde names.

use serde::{Deserialize, Serialize};

/// Where a resource's source content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Video,
    Document,
    Text,
    Audio,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Video => "video",
            ResourceKind::Document => "document",
            ResourceKind::Text => "text",
            ResourceKind::Audio => "audio",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "video" => Some(ResourceKind::Video),
            "document" => Some(ResourceKind::Document),
            "text" => Some(ResourceKind::Text),
            "audio" => Some(ResourceKind::Audio),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    Processing,
    Ready,
    Error,
}

impl ResourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceStatus::Processing => "processing",
            ResourceStatus::Ready => "ready",
            ResourceStatus::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "processing" => Some(ResourceStatus::Processing),
            "ready" => Some(ResourceStatus::Ready),
            "error" => Some(ResourceStatus::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashcardStatus {
    #[default]
    New,
    Learning,
    Mastered,
}

impl FlashcardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashcardStatus::New => "new",
            FlashcardStatus::Learning => "learning",
            FlashcardStatus::Mastered => "mastered",
        }
    }

    /// Unknown labels fall back to `New`.
    pub fn parse(value: &str) -> Self {
        match value {
            "learning" => FlashcardStatus::Learning,
            "mastered" => FlashcardStatus::Mastered,
            _ => FlashcardStatus::New,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: String,
    pub front: String,
    pub back: String,
    #[serde(default)]
    pub status: FlashcardStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    #[default]
    MultipleChoice,
    Text,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple-choice",
            QuestionType::Text => "text",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "text" => QuestionType::Text,
            _ => QuestionType::MultipleChoice,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passage: Option<String>,
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub correct_answer: usize,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub question_type: Option<QuestionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer_text: Option<String>,
    #[serde(default)]
    pub explanation: String,
}

impl QuizQuestion {
    /// The effective question type; an absent discriminator means multiple choice.
    pub fn kind(&self) -> QuestionType {
        self.question_type.unwrap_or_default()
    }

    /// Describes why the question is malformed, if it is.
    pub fn problem(&self) -> Option<String> {
        match self.kind() {
            QuestionType::MultipleChoice if self.correct_answer >= self.options.len() => {
                Some(format!(
                    "question '{}' has answer index {} but only {} options",
                    self.id,
                    self.correct_answer,
                    self.options.len()
                ))
            }
            QuestionType::Text
                if self
                    .correct_answer_text
                    .as_deref()
                    .map_or(true, |text| text.trim().is_empty()) =>
            {
                Some(format!("text question '{}' has no expected answer", self.id))
            }
            _ => None,
        }
    }

    pub fn is_well_formed(&self) -> bool {
        self.problem().is_none()
    }
}

/// A unit of study content with its derived summary, flashcards and quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    pub original_content: String,
    pub summary: String,
    #[serde(default)]
    pub flashcards: Vec<Flashcard>,
    #[serde(default)]
    pub quiz: Vec<QuizQuestion>,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
    /// Milliseconds since the Unix epoch; never moves backwards.
    pub last_accessed: i64,
    pub status: ResourceStatus,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Resource {
    /// Records an access at `now_millis` without letting the timestamp go backwards.
    pub fn touch(&mut self, now_millis: i64) {
        self.last_accessed = self.last_accessed.max(now_millis);
    }

    /// Returns the first structural problem found in the resource.
    pub fn problem(&self) -> Option<String> {
        if self.id.trim().is_empty() {
            return Some("resource id must not be empty".to_string());
        }
        self.quiz.iter().find_map(QuizQuestion::problem)
    }

    pub fn mastered_cards(&self) -> usize {
        self.flashcards
            .iter()
            .filter(|card| card.status == FlashcardStatus::Mastered)
            .count()
    }
}

/// Which side produced a set of user statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsSource {
    Remote,
    Local,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub streak: u32,
    pub total_cards: u64,
    /// Percentage in `0..=100`.
    pub retention: u32,
    /// Rounded to one decimal place.
    pub hours_studied: f64,
    pub source: StatsSource,
}

/// Tells the caller which store answered a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ListingOrigin {
    /// The remote answer was used, including a confirmed-empty one.
    Remote,
    /// The remote store answered with nothing while the local cache holds data.
    RemoteEmpty,
    /// The remote store failed or timed out; the local cache was used.
    RemoteUnavailable,
    /// No remote store is configured.
    LocalOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceListing {
    pub resources: Vec<Resource>,
    pub origin: ListingOrigin,
}

/// Content returned by the study assistant for a piece of source material.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudySet {
    pub summary: String,
    pub flashcards: Vec<Flashcard>,
    pub quiz: Vec<QuizQuestion>,
    pub tags: Vec<String>,
}

/// Rounds a value to one decimal place.
pub fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
