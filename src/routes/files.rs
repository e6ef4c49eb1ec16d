// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! File API endpoints.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{Redirect, Response},
    routing::{delete, get},
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{FileRecord, User};
use crate::services::UploadRequest;
use crate::AppState;

/// Routes that need a session.
pub fn routes(max_upload_bytes: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/files",
            get(list_files)
                .post(upload_file)
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/files/{id}", delete(delete_file))
        .route("/files/{id}/preview", get(preview_file))
        .route("/files/{id}/download", get(download_file))
}

/// Public streaming route. Uploaded files are shared by link anyway.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/files/web/{id}", get(stream_file))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export))]
pub struct FileResponse {
    pub id: String,
    pub name: String,
    pub size_bytes: u64,
    pub mime_type: Option<String>,
    pub view_link: Option<String>,
    pub download_link: Option<String>,
    /// Path of the public streaming endpoint
    pub web_link: String,
    pub created_at: String,
}

impl From<FileRecord> for FileResponse {
    fn from(record: FileRecord) -> Self {
        Self {
            name: record.name().to_string(),
            web_link: format!("/files/web/{}", record.id),
            id: record.id,
            size_bytes: record.size_bytes,
            mime_type: record.mime_type,
            view_link: record.view_link,
            download_link: record.download_link,
            created_at: record.created_at,
        }
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export))]
pub struct FilesResponse {
    pub files: Vec<FileResponse>,
}

async fn current_user(state: &AppState, auth: &AuthUser) -> Result<User> {
    state
        .db
        .get_user(&auth.user_id)
        .await?
        .ok_or(AppError::Unauthorized)
}

/// Upload the multipart field `file` to Drive.
async fn upload_file(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<FileResponse>)> {
    let user = current_user(&state, &auth).await?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let request = UploadRequest {
            file_name: field
                .file_name()
                .filter(|n| !n.is_empty())
                .unwrap_or("Untitled")
                .to_string(),
            mime_type: field.content_type().map(|m| m.to_string()),
        };

        tracing::info!(
            user_id = %user.id,
            file_name = %request.file_name,
            "Starting upload"
        );

        let record = state
            .files
            .upload(&user, request, Box::pin(field))
            .await?;

        return Ok((StatusCode::CREATED, Json(record.into())));
    }

    Err(AppError::BadRequest("No file provided".to_string()))
}

/// List the user's files, newest first.
async fn list_files(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<FilesResponse>> {
    let records = state.files.list(&auth.user_id).await?;

    Ok(Json(FilesResponse {
        files: records.into_iter().map(FileResponse::from).collect(),
    }))
}

/// Redirect to the Drive preview page.
async fn preview_file(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(file_id): Path<String>,
) -> Result<Redirect> {
    let record = state.files.get_owned(&auth.user_id, &file_id).await?;
    let link = record
        .view_link
        .ok_or_else(|| AppError::BadRequest("File has no preview link".to_string()))?;
    Ok(Redirect::temporary(&link))
}

/// Redirect to the Drive download URL.
async fn download_file(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(file_id): Path<String>,
) -> Result<Redirect> {
    let record = state.files.get_owned(&auth.user_id, &file_id).await?;
    let link = record
        .download_link
        .ok_or_else(|| AppError::BadRequest("File has no download link".to_string()))?;
    Ok(Redirect::temporary(&link))
}

async fn delete_file(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(file_id): Path<String>,
) -> Result<StatusCode> {
    let user = current_user(&state, &auth).await?;
    state.files.delete(&user, &file_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Stream file content from Drive, honoring a `Range` header.
async fn stream_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response> {
    let record = state.files.get(&file_id).await?;
    let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok());

    state.streaming.stream_to_client(&record, range).await
}
