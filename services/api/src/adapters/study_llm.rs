//! services/api/src/adapters/study_llm.rs
//!
//! This module contains the adapter for the study assistant LLM.
//! It implements the `StudyAssistantService` port from the core crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use serde::Deserialize;
use study_core::{
    Flashcard, FlashcardStatus, PortError, PortResult, QuizQuestion, StudyAssistantService,
    StudySet,
};
use tracing::{debug, warn};

const STUDY_SET_PROMPT: &str = "You turn study material into a study set. Respond with a single JSON object and nothing else, shaped as {\"summary\": string (markdown), \"tags\": [string], \"flashcards\": [{\"front\": string, \"back\": string}], \"quiz\": [{\"question\": string, \"options\": [string], \"correctAnswer\": number (0-based index into options), \"explanation\": string}]}. Write 8 to 12 flashcards and 5 quiz questions with 4 options each.";

const TUTOR_PROMPT: &str = "You are a patient study tutor. Answer clearly and briefly. When study material is provided, ground your answer in it.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `StudyAssistantService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiStudyAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiStudyAdapter {
    /// Creates a new `OpenAiStudyAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    /// Sends a system + user message pair and returns the first choice's text.
    async fn complete(&self, system: &str, user: String) -> PortResult<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected("Study assistant returned no text content.".to_string())
            })
    }
}

//=========================================================================================
// Model Output Parsing
//=========================================================================================

#[derive(Deserialize)]
struct RawStudySet {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    flashcards: Vec<RawFlashcard>,
    #[serde(default)]
    quiz: Vec<RawQuestion>,
}

#[derive(Deserialize)]
struct RawFlashcard {
    front: String,
    back: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuestion {
    #[serde(default)]
    passage: Option<String>,
    question: String,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default)]
    correct_answer: usize,
    #[serde(default)]
    explanation: String,
}

/// Extracts the outermost JSON object from a model reply, tolerating code fences.
fn json_body(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (start < end).then(|| &reply[start..=end])
}

/// Parses a model reply into a study set, dropping questions whose answer
/// index does not point at an option.
pub fn parse_study_set(reply: &str) -> PortResult<StudySet> {
    let body = json_body(reply).ok_or_else(|| {
        PortError::Unexpected("Study assistant reply contained no JSON object.".to_string())
    })?;
    let raw: RawStudySet = serde_json::from_str(body)
        .map_err(|e| PortError::Unexpected(format!("Unreadable study set: {}", e)))?;

    let flashcards = raw
        .flashcards
        .into_iter()
        .enumerate()
        .map(|(i, card)| Flashcard {
            id: format!("card-{}", i + 1),
            front: card.front,
            back: card.back,
            status: FlashcardStatus::New,
        })
        .collect();

    let total = raw.quiz.len();
    let quiz: Vec<QuizQuestion> = raw
        .quiz
        .into_iter()
        .enumerate()
        .map(|(i, q)| QuizQuestion {
            id: format!("q-{}", i + 1),
            passage: q.passage,
            question: q.question,
            options: q.options,
            correct_answer: q.correct_answer,
            question_type: None,
            correct_answer_text: None,
            explanation: q.explanation,
        })
        .filter(|q| match q.problem() {
            Some(problem) => {
                warn!("Dropping generated question: {}", problem);
                false
            }
            None => true,
        })
        .collect();
    if quiz.len() != total {
        debug!(kept = quiz.len(), total, "Filtered generated quiz");
    }

    Ok(StudySet {
        summary: raw.summary,
        flashcards,
        quiz,
        tags: raw.tags,
    })
}

//=========================================================================================
// `StudyAssistantService` Trait Implementation
//=========================================================================================

#[async_trait]
impl StudyAssistantService for OpenAiStudyAdapter {
    async fn generate_study_set(&self, title: &str, content: &str) -> PortResult<StudySet> {
        let reply = self
            .complete(
                STUDY_SET_PROMPT,
                format!("TITLE: {}\n\nMATERIAL:\n{}", title, content),
            )
            .await?;
        parse_study_set(&reply)
    }

    async fn answer(&self, message: &str, context: Option<&str>) -> PortResult<String> {
        let user = match context {
            Some(context) => format!("STUDY MATERIAL:\n{}\n\nQUESTION: {}", context, message),
            None => message.to_string(),
        };
        self.complete(TUTOR_PROMPT, user).await
    }
}
