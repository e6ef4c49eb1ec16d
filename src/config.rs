//! Application configuration loaded from environment variables.
//!
//! Endpoint URLs default to Google's production hosts and can be pointed at a
//! local stand-in for testing.

use std::env;

pub const DEFAULT_GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const DEFAULT_GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
pub const DEFAULT_DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
pub const DEFAULT_DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

const DEFAULT_MAX_UPLOAD_BYTES: usize = 1024 * 1024 * 1024;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Google OAuth client ID (public)
    pub google_client_id: String,
    /// Fixed OAuth callback URL. Derived from the request Host when unset.
    pub google_redirect_uri: Option<String>,
    /// Frontend URL for post-login redirects
    pub frontend_url: String,
    /// GCP project ID. Without one, metadata lives in memory.
    pub gcp_project_id: Option<String>,
    /// Server port
    pub port: u16,
    /// Largest accepted multipart upload body.
    pub max_upload_bytes: usize,

    // --- Endpoints ---
    pub google_auth_url: String,
    pub google_token_url: String,
    pub google_userinfo_url: String,
    pub drive_api_base: String,
    pub drive_upload_base: String,

    // --- Secrets ---
    /// Google OAuth client secret
    pub google_client_secret: String,
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
            .map(|v| v.trim().as_bytes().to_vec())
            .unwrap_or_else(|_| jwt_signing_key.clone());

        Ok(Self {
            google_client_id: env::var("GOOGLE_CLIENT_ID")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("GOOGLE_CLIENT_ID"))?,
            google_redirect_uri: env::var("GOOGLE_REDIRECT_URI").ok(),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").ok(),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),

            google_auth_url: env_or("GOOGLE_AUTH_URL", DEFAULT_GOOGLE_AUTH_URL),
            google_token_url: env_or("GOOGLE_TOKEN_URL", DEFAULT_GOOGLE_TOKEN_URL),
            google_userinfo_url: env_or("GOOGLE_USERINFO_URL", DEFAULT_GOOGLE_USERINFO_URL),
            drive_api_base: env_or("DRIVE_API_BASE", DEFAULT_DRIVE_API_BASE),
            drive_upload_base: env_or("DRIVE_UPLOAD_BASE", DEFAULT_DRIVE_UPLOAD_BASE),

            google_client_secret: env::var("GOOGLE_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("GOOGLE_CLIENT_SECRET"))?,
            jwt_signing_key,
            oauth_state_key,
        })
    }

    /// Config for tests, with every Google endpoint rooted at `base_url`.
    pub fn test_default_with_base(base_url: &str) -> Self {
        Self {
            google_client_id: "test_client_id".to_string(),
            google_redirect_uri: None,
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: None,
            port: 8080,
            max_upload_bytes: 64 * 1024 * 1024,
            google_auth_url: format!("{}/o/oauth2/v2/auth", base_url),
            google_token_url: format!("{}/token", base_url),
            google_userinfo_url: format!("{}/oauth2/v2/userinfo", base_url),
            drive_api_base: format!("{}/drive/v3", base_url),
            drive_upload_base: format!("{}/upload/drive/v3", base_url),
            google_client_secret: "test_secret".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            oauth_state_key: b"test_state_key".to_vec(),
        }
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            google_auth_url: DEFAULT_GOOGLE_AUTH_URL.to_string(),
            google_token_url: DEFAULT_GOOGLE_TOKEN_URL.to_string(),
            google_userinfo_url: DEFAULT_GOOGLE_USERINFO_URL.to_string(),
            drive_api_base: DEFAULT_DRIVE_API_BASE.to_string(),
            drive_upload_base: DEFAULT_DRIVE_UPLOAD_BASE.to_string(),
            ..Self::test_default_with_base("")
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name)
        .map(|v| v.trim_end_matches('/').to_string())
        .unwrap_or_else(|_| default.to_string())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
