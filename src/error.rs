// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// The refresh-token exchange with Google failed.
    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    /// Drive rejected the credential (after the single allowed retry, when
    /// the call went through the retry policy).
    #[error("Drive authorization failed: {0}")]
    ProviderAuth(String),

    #[error("Drive API error: {0}")]
    Drive(String),

    /// The media stream failed before the first byte reached the client.
    #[error("Upstream stream error: {0}")]
    UpstreamStream(String),

    /// The local record was removed but its remote object was already gone.
    #[error("Remote object missing: {0}")]
    RemoteMissing(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// True if Drive rejected the access token (HTTP 401).
    pub fn is_provider_auth_error(&self) -> bool {
        matches!(self, AppError::ProviderAuth(_))
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::TokenRefresh(msg) => {
                tracing::warn!(error = %msg, "Token refresh failed, re-login required");
                (
                    StatusCode::UNAUTHORIZED,
                    "token_refresh_failed",
                    Some("Please sign in again".to_string()),
                )
            }
            AppError::ProviderAuth(msg) => {
                tracing::warn!(error = %msg, "Drive rejected credentials after retry");
                (
                    StatusCode::UNAUTHORIZED,
                    "drive_unauthorized",
                    Some("Please sign in again".to_string()),
                )
            }
            AppError::Drive(msg) => (StatusCode::BAD_GATEWAY, "drive_error", Some(msg.clone())),
            AppError::UpstreamStream(msg) => {
                tracing::error!(error = %msg, "Upstream stream failed before headers were sent");
                return (
                    StatusCode::BAD_GATEWAY,
                    [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                    "Stream error",
                )
                    .into_response();
            }
            AppError::RemoteMissing(msg) => (StatusCode::GONE, "remote_missing", Some(msg.clone())),
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
