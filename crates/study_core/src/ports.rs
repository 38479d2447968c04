//! crates/study_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the study core.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to stay independent of the remote database and the text-generation provider.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Resource, StudySet, UserStats};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// A place resources can be listed from, read from, saved to and deleted from.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Lists resources, most recent first.
    async fn list_resources(&self) -> PortResult<Vec<Resource>>;

    /// Fetches a resource and records the access on it.
    async fn get_resource(&self, id: &str) -> PortResult<Resource>;

    /// Stores a fully-populated resource together with its flashcards and quiz.
    async fn save_resource(&self, resource: &Resource) -> PortResult<()>;

    /// Deletes a resource and its child rows.
    async fn delete_resource(&self, id: &str) -> PortResult<()>;
}

/// The remote, authoritative side of resource storage.
#[async_trait]
pub trait RemoteResourceStore: ResourceStore {
    /// The identity remote writes are attached to, if any.
    fn user_id(&self) -> Option<Uuid>;

    /// Aggregates streak, card count, quiz retention and study hours.
    async fn user_stats(&self) -> PortResult<UserStats>;
}

#[async_trait]
pub trait StudyAssistantService: Send + Sync {
    /// Derives a summary, flashcards and a quiz from source content.
    async fn generate_study_set(&self, title: &str, content: &str) -> PortResult<StudySet>;

    /// Answers a chat message, optionally grounded in study content.
    async fn answer(&self, message: &str, context: Option<&str>) -> PortResult<String>;
}
