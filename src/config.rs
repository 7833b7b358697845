//! Application configuration loaded from environment variables.
//!
//! Everything is read once at startup. For local development a `.env` file
//! is picked up automatically.

use std::env;
use std::str::FromStr;

const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";
const DEFAULT_SCOPES: &str = "read,activity:read_all";
pub const STRAVA_API_BASE: &str = "https://www.strava.com/api/v3";
pub const STRAVA_OAUTH_BASE: &str = "https://www.strava.com/oauth";

/// Where activity data is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Google Firestore (or the emulator when `FIRESTORE_EMULATOR_HOST` is set)
    Firestore,
    /// Process-local maps; data is lost on restart
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(Self::Firestore),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::Invalid {
                name: "STORAGE_BACKEND",
                value: other.to_string(),
            }),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Strava OAuth client ID (public)
    pub strava_client_id: String,
    /// Explicit OAuth callback URL. When unset it is derived from the request host.
    pub strava_redirect_uri: Option<String>,
    /// Comma-separated OAuth scopes requested at login
    pub strava_scopes: String,
    /// Frontend URL used for CORS and as the default post-login redirect
    pub frontend_url: String,
    /// Overrides the post-login redirect target
    pub auth_success_redirect_url: Option<String>,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Storage backend selection
    pub storage_backend: StorageBackend,
    /// Server port
    pub port: u16,
    /// Strava REST API base URL
    pub strava_api_base: String,
    /// Strava OAuth base URL
    pub strava_oauth_base: String,

    // --- Secrets ---
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for the OAuth `state` parameter
    pub oauth_state_key: Vec<u8>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let jwt_signing_key = env::var("JWT_SIGNING_KEY")
            .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
            .into_bytes();
        let oauth_state_key = env::var("OAUTH_STATE_KEY")
            .map(String::into_bytes)
            .unwrap_or_else(|_| jwt_signing_key.clone());

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(raw) => raw.parse()?,
            Err(_) => StorageBackend::Firestore,
        };

        Ok(Self {
            strava_client_id: env::var("STRAVA_CLIENT_ID")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_ID"))?,
            strava_redirect_uri: non_empty_var("STRAVA_REDIRECT_URI"),
            strava_scopes: non_empty_var("STRAVA_SCOPES")
                .unwrap_or_else(|| DEFAULT_SCOPES.to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| DEFAULT_FRONTEND_URL.to_string()),
            auth_success_redirect_url: non_empty_var("AUTH_SUCCESS_REDIRECT_URL"),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            storage_backend,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            strava_api_base: env::var("STRAVA_API_BASE")
                .unwrap_or_else(|_| STRAVA_API_BASE.to_string()),
            strava_oauth_base: env::var("STRAVA_OAUTH_BASE")
                .unwrap_or_else(|_| STRAVA_OAUTH_BASE.to_string()),

            strava_client_secret: env::var("STRAVA_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_SECRET"))?,
            jwt_signing_key,
            oauth_state_key,
        })
    }

    /// Config for tests only: in-memory storage, fixed secrets.
    pub fn test_default() -> Self {
        Self {
            strava_client_id: "test_client_id".to_string(),
            strava_redirect_uri: None,
            strava_scopes: DEFAULT_SCOPES.to_string(),
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            auth_success_redirect_url: None,
            gcp_project_id: "test-project".to_string(),
            storage_backend: StorageBackend::Memory,
            port: 8080,
            strava_api_base: STRAVA_API_BASE.to_string(),
            strava_oauth_base: STRAVA_OAUTH_BASE.to_string(),
            strava_client_secret: "test_secret".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            oauth_state_key: b"test_oauth_state_key".to_vec(),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}
