//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{OpenAiStudyAdapter, PgResourceStore},
    config::Config,
    error::ApiError,
    web::{
        chat_handler, create_resource_handler, delete_resource_handler, generate_resource_handler,
        get_resource_handler, limits_handler, list_resources_handler, record_focus_handler,
        rest::ApiDoc, state::AppState, stats_handler,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    extract::DefaultBodyLimit,
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use study_core::{
    Clock, FileStore, KeyValueStore, RemoteResourceStore, StudyAssistantService, SystemClock,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Open the Local Store ---
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&config.data_dir)?);
    info!("Local store at {}", config.data_dir.display());

    // --- 3. Connect to the Remote Store, if Configured ---
    let remote: Option<Arc<dyn RemoteResourceStore>> = match &config.database_url {
        Some(database_url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(config.remote_timeout)
                .connect(database_url)
                .await?;
            let db_adapter = PgResourceStore::new(db_pool, config.user_id);
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            if config.user_id.is_none() {
                warn!("STUDY_USER_ID is not set; resources will only be saved locally");
            }
            let remote_store: Arc<dyn RemoteResourceStore> = Arc::new(db_adapter);
            Some(remote_store)
        }
        None => {
            info!("DATABASE_URL not set; running with the local cache only");
            None
        }
    };

    // --- 4. Initialize the Study Assistant ---
    let assistant: Option<Arc<dyn StudyAssistantService>> = match &config.openai_api_key {
        Some(api_key) => {
            let openai_client = Client::with_config(OpenAIConfig::new().with_api_key(api_key));
            let study_adapter: Arc<dyn StudyAssistantService> = Arc::new(
                OpenAiStudyAdapter::new(openai_client, config.generation_model.clone()),
            );
            Some(study_adapter)
        }
        None => {
            warn!("OPENAI_API_KEY not set; generation and chat are disabled");
            None
        }
    };

    // --- 5. Build the Shared AppState ---
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let app_state = Arc::new(AppState::build(
        config.clone(),
        store,
        remote,
        assistant,
        clock,
    ));
    info!(tier = ?app_state.tier(), "Study service ready");

    let cors = CorsLayer::new()
        .allow_origin([
            "http://localhost:3000".parse::<HeaderValue>().map_err(|e| {
                ApiError::Internal(format!("Invalid CORS origin: {}", e))
            })?,
            "http://127.0.0.1:3000".parse::<HeaderValue>().map_err(|e| {
                ApiError::Internal(format!("Invalid CORS origin: {}", e))
            })?,
        ])
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    // --- 6. Create the Web Router ---
    let api_router = Router::new()
        .route(
            "/resources",
            get(list_resources_handler).post(create_resource_handler),
        )
        .route("/resources/generate", post(generate_resource_handler))
        .route(
            "/resources/{id}",
            get(get_resource_handler).delete(delete_resource_handler),
        )
        .route("/chat", post(chat_handler))
        .route("/stats", get(stats_handler))
        .route("/stats/focus", post(record_focus_handler))
        .route("/limits", get(limits_handler))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
