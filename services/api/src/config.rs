//! services/api/src/config.rs
//!
//! Defines the service's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use study_core::Tier;
use tracing::Level;
use uuid::Uuid;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Unset means no remote store; everything stays in the local cache.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub data_dir: PathBuf,
    pub user_id: Option<Uuid>,
    pub tier: Tier,
    pub openai_api_key: Option<String>,
    pub generation_model: String,
    pub remote_timeout: Duration,
    pub generation_timeout: Duration,
    pub cache_capacity: usize,
    pub upload_burst_limit: usize,
    pub upload_burst_window: Duration,
    pub chat_burst_limit: usize,
    pub chat_burst_window: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        // --- Server and Storage Settings ---
        let bind_address = parse_or(&var, "BIND_ADDRESS", "127.0.0.1:3000".parse::<SocketAddr>().ok())?
            .ok_or_else(|| ConfigError::MissingVar("BIND_ADDRESS".to_string()))?;

        let database_url = var("DATABASE_URL");

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let data_dir = var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data"));

        // --- Identity and Tier ---
        let user_id = parse_or(&var, "STUDY_USER_ID", None)?;
        let tier = var("STUDY_TIER")
            .map(|label| Tier::parse(&label))
            .unwrap_or_default();

        // --- Assistant Settings ---
        let openai_api_key = var("OPENAI_API_KEY");
        let generation_model =
            var("GENERATION_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string());

        // --- Timeouts and Limits ---
        let remote_timeout = Duration::from_secs(parse_or(&var, "REMOTE_TIMEOUT_SECS", Some(10))?.unwrap_or(10));
        let generation_timeout =
            Duration::from_secs(parse_or(&var, "GENERATION_TIMEOUT_SECS", Some(60))?.unwrap_or(60));
        let cache_capacity = parse_or(&var, "CACHE_CAPACITY", Some(50))?.unwrap_or(50);
        let upload_burst_limit = parse_or(&var, "UPLOAD_BURST_LIMIT", Some(5))?.unwrap_or(5);
        let upload_burst_window =
            Duration::from_secs(parse_or(&var, "UPLOAD_BURST_WINDOW_SECS", Some(60))?.unwrap_or(60));
        let chat_burst_limit = parse_or(&var, "CHAT_BURST_LIMIT", Some(10))?.unwrap_or(10);
        let chat_burst_window =
            Duration::from_secs(parse_or(&var, "CHAT_BURST_WINDOW_SECS", Some(60))?.unwrap_or(60));

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            data_dir,
            user_id,
            tier,
            openai_api_key,
            generation_model,
            remote_timeout,
            generation_timeout,
            cache_capacity,
            upload_burst_limit,
            upload_burst_window,
            chat_burst_limit,
            chat_burst_window,
        })
    }
}

/// Parses an optional variable, returning `default` when it is unset.
fn parse_or<T, F>(var: &F, name: &str, default: Option<T>) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        None => Ok(default),
    }
}
