//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use study_core::{
    limits_for, validate_input, InputContext, Rejection, Resource, ResourceKind, ResourceStatus,
    SyncError,
};
use tracing::{error, info, warn};
use uuid::Uuid;
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_resources_handler,
        get_resource_handler,
        create_resource_handler,
        delete_resource_handler,
        generate_resource_handler,
        chat_handler,
        stats_handler,
        record_focus_handler,
        limits_handler,
    ),
    components(
        schemas(
            CreateResourceResponse,
            GenerateRequest,
            ChatRequest,
            ChatResponse,
            FocusRequest,
            FocusResponse,
            LimitsResponse
        )
    ),
    tags(
        (name = "Study API", description = "Local-first study resources, limits and stats.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Request and Response Structs
//=========================================================================================

/// Sent after a resource has been stored locally.
#[derive(Serialize, ToSchema)]
pub struct CreateResourceResponse {
    id: String,
    /// Present when the local save succeeded but cloud sync was not possible.
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct GenerateRequest {
    pub title: String,
    pub content: String,
    /// One of `video`, `document`, `text`, `audio`. Defaults to `text`.
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub kind: Option<ResourceKind>,
}

#[derive(Deserialize, ToSchema)]
pub struct ChatRequest {
    pub message: String,
    /// Grounds the answer in a stored resource when given.
    #[serde(default)]
    pub resource_id: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ChatResponse {
    reply: String,
}

#[derive(Deserialize, ToSchema)]
pub struct FocusRequest {
    pub seconds: u64,
}

#[derive(Serialize, ToSchema)]
pub struct FocusResponse {
    total_seconds: u64,
}

#[derive(Serialize, ToSchema)]
pub struct LimitsResponse {
    tier: String,
    max_content_length: usize,
    daily_uploads: u32,
    daily_chats: u32,
    remaining_uploads: u32,
    remaining_chats: u32,
}

type HandlerError = (StatusCode, String);

fn rejected(rejection: Rejection) -> HandlerError {
    (StatusCode::TOO_MANY_REQUESTS, rejection.message().to_string())
}

/// Checks user input, turning a failed validation into a 400 with its reason.
fn validated(state: &AppState, text: &str, context: InputContext) -> Result<(), HandlerError> {
    let validation = validate_input(text, context, state.tier());
    if validation.valid {
        return Ok(());
    }
    Err((
        StatusCode::BAD_REQUEST,
        validation
            .error
            .unwrap_or_else(|| "Invalid input.".to_string()),
    ))
}

/// Stores a resource and shapes the outcome into a response.
async fn store_resource(
    state: &AppState,
    resource: Resource,
) -> Result<(StatusCode, Json<CreateResourceResponse>), HandlerError> {
    let id = resource.id.clone();
    match state.resources.create_resource(resource).await {
        Ok(()) => Ok((
            StatusCode::CREATED,
            Json(CreateResourceResponse { id, warning: None }),
        )),
        Err(e @ SyncError::NotAuthenticated) => Ok((
            StatusCode::ACCEPTED,
            Json(CreateResourceResponse {
                id,
                warning: Some(e.to_string()),
            }),
        )),
        Err(e @ SyncError::InvalidResource(_)) => Err((StatusCode::BAD_REQUEST, e.to_string())),
    }
}

//=========================================================================================
// Resource Handlers
//=========================================================================================

/// List resources, most recent first, with the store that answered.
#[utoipa::path(
    get,
    path = "/resources",
    responses(
        (status = 200, description = "Resources and their origin (remote, remote-empty, remote-unavailable, local-only)")
    )
)]
pub async fn list_resources_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.resources.list_resources().await)
}

/// Fetch one resource and record the access.
#[utoipa::path(
    get,
    path = "/resources/{id}",
    params(("id" = String, Path, description = "Resource id")),
    responses(
        (status = 200, description = "The resource"),
        (status = 404, description = "Not found remotely or locally")
    )
)]
pub async fn get_resource_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    state
        .resources
        .get_resource(&id)
        .await
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Resource {} not found", id)))
}

/// Store a fully-populated resource.
#[utoipa::path(
    post,
    path = "/resources",
    request_body(content_type = "application/json", description = "A complete resource, camelCase fields."),
    responses(
        (status = 201, description = "Stored locally and synced", body = CreateResourceResponse),
        (status = 202, description = "Stored locally; cloud sync not possible", body = CreateResourceResponse),
        (status = 400, description = "Invalid content or malformed quiz")
    )
)]
pub async fn create_resource_handler(
    State(state): State<Arc<AppState>>,
    Json(resource): Json<Resource>,
) -> Result<impl IntoResponse, HandlerError> {
    validated(&state, &resource.original_content, InputContext::Content)?;
    store_resource(&state, resource).await
}

/// Delete a resource locally and, best effort, remotely.
#[utoipa::path(
    delete,
    path = "/resources/{id}",
    params(("id" = String, Path, description = "Resource id")),
    responses((status = 204, description = "Deleted (or already absent)"))
)]
pub async fn delete_resource_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> StatusCode {
    if !state.resources.delete_resource(&id).await {
        info!(%id, "Delete requested for a resource that was not cached");
    }
    StatusCode::NO_CONTENT
}

/// Generate a study set from source content and store it as a new resource.
#[utoipa::path(
    post,
    path = "/resources/generate",
    request_body = GenerateRequest,
    responses(
        (status = 201, description = "The generated resource"),
        (status = 400, description = "Invalid content"),
        (status = 429, description = "Burst or daily upload limit reached"),
        (status = 502, description = "The assistant failed"),
        (status = 503, description = "No assistant configured"),
        (status = 504, description = "The assistant timed out")
    )
)]
pub async fn generate_resource_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let assistant = state.assistant.clone().ok_or_else(|| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "The study assistant is not configured.".to_string(),
        )
    })?;
    validated(&state, &req.content, InputContext::Content)?;
    state.uploads.admit(state.tier()).map_err(rejected)?;

    let title = if req.title.trim().is_empty() {
        "Untitled".to_string()
    } else {
        req.title.trim().to_string()
    };

    let study_set = tokio::time::timeout(
        state.config.generation_timeout,
        assistant.generate_study_set(&title, &req.content),
    )
    .await
    .map_err(|_| {
        warn!(timeout = ?state.config.generation_timeout, "Study set generation timed out");
        (
            StatusCode::GATEWAY_TIMEOUT,
            "The study assistant took too long. Please try again.".to_string(),
        )
    })?
    .map_err(|e| {
        error!("Study set generation failed: {:?}", e);
        (
            StatusCode::BAD_GATEWAY,
            "The study assistant could not process this content.".to_string(),
        )
    })?;

    let now = state.clock.now_millis();
    let resource = Resource {
        id: generated_id(now),
        title,
        kind: req.kind.unwrap_or(ResourceKind::Text),
        original_content: req.content,
        summary: study_set.summary,
        flashcards: study_set.flashcards,
        quiz: study_set.quiz,
        created_at: now,
        last_accessed: now,
        status: ResourceStatus::Ready,
        tags: study_set.tags,
    };

    let (status, _) = store_resource(&state, resource.clone()).await?;
    Ok((status, Json(resource)))
}

/// Millisecond timestamp plus a random suffix, so concurrent generations never
/// share an id.
fn generated_id(now: i64) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("res_{}_{}", now, &suffix[..8])
}

//=========================================================================================
// Chat, Stats and Limits Handlers
//=========================================================================================

/// Ask the study assistant a question.
#[utoipa::path(
    post,
    path = "/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "The assistant's reply", body = ChatResponse),
        (status = 400, description = "Invalid message"),
        (status = 429, description = "Burst or daily chat limit reached"),
        (status = 502, description = "The assistant failed"),
        (status = 503, description = "No assistant configured"),
        (status = 504, description = "The assistant timed out")
    )
)]
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let assistant = state.assistant.clone().ok_or_else(|| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "The study assistant is not configured.".to_string(),
        )
    })?;
    validated(&state, &req.message, InputContext::Chat)?;
    state.chats.admit(state.tier()).map_err(rejected)?;

    let context = match &req.resource_id {
        Some(id) => state.resources.get_resource(id).await.map(|resource| {
            if resource.summary.trim().is_empty() {
                resource.original_content
            } else {
                resource.summary
            }
        }),
        None => None,
    };

    let reply = tokio::time::timeout(
        state.config.generation_timeout,
        assistant.answer(&req.message, context.as_deref()),
    )
    .await
    .map_err(|_| {
        (
            StatusCode::GATEWAY_TIMEOUT,
            "The study assistant took too long. Please try again.".to_string(),
        )
    })?
    .map_err(|e| {
        error!("Chat answer failed: {:?}", e);
        (
            StatusCode::BAD_GATEWAY,
            "The study assistant could not answer right now.".to_string(),
        )
    })?;

    Ok(Json(ChatResponse { reply }))
}

/// Streak, card count, retention and study hours.
#[utoipa::path(
    get,
    path = "/stats",
    responses((status = 200, description = "User statistics, remote when reachable"))
)]
pub async fn stats_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.resources.user_stats().await)
}

/// Add tracked focus time to the local counter.
#[utoipa::path(
    post,
    path = "/stats/focus",
    request_body = FocusRequest,
    responses((status = 200, description = "The new focus total", body = FocusResponse))
)]
pub async fn record_focus_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FocusRequest>,
) -> impl IntoResponse {
    let total_seconds = state.counters.add_focus_seconds(req.seconds);
    Json(FocusResponse { total_seconds })
}

/// The tier's ceilings and what is left of today's quotas.
#[utoipa::path(
    get,
    path = "/limits",
    responses((status = 200, description = "Tier limits and remaining quota", body = LimitsResponse))
)]
pub async fn limits_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let tier = state.tier();
    let limits = limits_for(tier);
    Json(LimitsResponse {
        tier: limits.label,
        max_content_length: limits.max_content_length,
        daily_uploads: limits.daily_uploads,
        daily_chats: limits.daily_chats,
        remaining_uploads: state.uploads.remaining(tier),
        remaining_chats: state.chats.remaining(tier),
    })
}
