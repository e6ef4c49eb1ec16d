// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google Drive v3 API client.
//!
//! [`DriveClient`] holds the shared HTTP client and endpoints. A
//! [`DriveHandle`] binds it to one access token; handles are cheap and built
//! per user per request.

use crate::config::Config;
use crate::error::AppError;
use bytes::{Bytes, BytesMut};
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};
use reqwest::{header, StatusCode};
use serde::{Deserialize, Serialize};

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Resumable upload chunk size. Drive requires a multiple of 256 KiB.
pub const UPLOAD_CHUNK_SIZE: usize = 4 * 256 * 1024;

const LIST_FIELDS: &str = "files(id,name)";
const FILE_FIELDS: &str = "id,name,mimeType,size,webViewLink,webContentLink";

/// Drive file metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Size in bytes. Drive encodes int64 as a string.
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub web_view_link: Option<String>,
    #[serde(default)]
    pub web_content_link: Option<String>,
}

impl DriveFile {
    pub fn size_bytes(&self) -> Option<u64> {
        self.size.as_ref().and_then(|s| s.parse().ok())
    }
}

/// Metadata for a file or folder to be created.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDriveFile {
    pub name: String,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
}

/// Permission grant.
#[derive(Debug, Clone, Serialize)]
pub struct Permission {
    pub role: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Permission {
    /// Anyone with the link can read.
    pub fn anyone_reader() -> Self {
        Self {
            role: "reader".to_string(),
            kind: "anyone".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FileListResponse {
    #[serde(default)]
    files: Vec<DriveFile>,
}

/// Result of a completed upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file: DriveFile,
    /// Bytes sent to Drive
    pub size_bytes: u64,
}

/// Reply to one chunk of a resumable upload.
#[derive(Debug)]
enum ChunkOutcome {
    /// 308: Drive wants more. `persisted` is the exclusive end of what it
    /// stored, or `None` when it stored nothing yet.
    Incomplete { persisted: Option<u64> },
    Complete(DriveFile),
}

/// Raw media download, not yet consumed.
pub struct MediaStream {
    /// 200, or 206 when a range was requested and honored
    pub status: StatusCode,
    pub content_length: Option<u64>,
    pub content_range: Option<String>,
    pub body: BoxStream<'static, Result<Bytes, AppError>>,
}

/// Shared Drive API client.
#[derive(Clone)]
pub struct DriveClient {
    http: reqwest::Client,
    api_base: String,
    upload_base: String,
}

impl DriveClient {
    pub fn new(config: &Config) -> Self {
        Self::with_base_urls(&config.drive_api_base, &config.drive_upload_base)
    }

    pub fn with_base_urls(api_base: &str, upload_base: &str) -> Self {
        // 308 is Drive's "resume incomplete", not a redirect.
        let redirect = reqwest::redirect::Policy::custom(|attempt| {
            if attempt.status() == StatusCode::PERMANENT_REDIRECT {
                attempt.stop()
            } else if attempt.previous().len() >= 10 {
                attempt.error("too many redirects")
            } else {
                attempt.follow()
            }
        });

        let http = reqwest::Client::builder()
            .redirect(redirect)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            upload_base: upload_base.trim_end_matches('/').to_string(),
        }
    }

    /// Bind the client to an access token.
    pub fn handle(&self, access_token: &str) -> DriveHandle {
        DriveHandle {
            client: self.clone(),
            access_token: access_token.to_string(),
        }
    }
}

/// Drive client bound to one access token.
#[derive(Clone)]
pub struct DriveHandle {
    client: DriveClient,
    access_token: String,
}

impl DriveHandle {
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Search files with a Drive query expression.
    pub async fn list_files(&self, query: &str) -> Result<Vec<DriveFile>, AppError> {
        let url = format!("{}/files", self.client.api_base);

        let response = self
            .client
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("q", query), ("fields", LIST_FIELDS), ("spaces", "drive")])
            .send()
            .await
            .map_err(|e| AppError::Drive(format!("Failed to list files: {}", e)))?;

        let list: FileListResponse = check_response_json(response).await?;
        Ok(list.files)
    }

    /// Create a folder at the Drive root.
    pub async fn create_folder(&self, name: &str) -> Result<DriveFile, AppError> {
        let url = format!("{}/files", self.client.api_base);
        let metadata = NewDriveFile {
            name: name.to_string(),
            mime_type: FOLDER_MIME_TYPE.to_string(),
            parents: Vec::new(),
        };

        let response = self
            .client
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .query(&[("fields", FILE_FIELDS)])
            .json(&metadata)
            .send()
            .await
            .map_err(|e| AppError::Drive(format!("Failed to create folder: {}", e)))?;

        check_response_json(response).await
    }

    /// Open a resumable upload session and return its URI.
    pub async fn start_upload(&self, metadata: &NewDriveFile) -> Result<String, AppError> {
        let url = format!("{}/files", self.client.upload_base);

        let response = self
            .client
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .header("X-Upload-Content-Type", &metadata.mime_type)
            .query(&[("uploadType", "resumable"), ("fields", FILE_FIELDS)])
            .json(metadata)
            .send()
            .await
            .map_err(|e| AppError::Drive(format!("Failed to start upload: {}", e)))?;

        let response = check_response(response).await?;

        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .ok_or_else(|| AppError::Drive("No upload URI in response".to_string()))
    }

    /// Send `content` to an upload session in fixed-size chunks.
    ///
    /// At most one chunk (plus one incoming piece) is held in memory. The
    /// total size is only declared on the final request. When Drive persists
    /// only part of a chunk, the rest is sent again from where it stopped.
    pub async fn upload_content<S, E>(
        &self,
        session_uri: &str,
        mut content: S,
    ) -> Result<UploadedFile, AppError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        let mut buffer = BytesMut::with_capacity(UPLOAD_CHUNK_SIZE);
        let mut offset = 0u64;

        while let Some(piece) = content.next().await {
            let piece =
                piece.map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?;
            buffer.extend_from_slice(&piece);

            // Hold back the tail so the last request can carry the total.
            while buffer.len() > UPLOAD_CHUNK_SIZE {
                let chunk = buffer.split_to(UPLOAD_CHUNK_SIZE).freeze();
                let range = format!("bytes {}-{}/*", offset, offset + chunk.len() as u64 - 1);

                let persisted = match self.put_chunk(session_uri, chunk.clone(), range).await? {
                    ChunkOutcome::Incomplete { persisted } => persisted,
                    ChunkOutcome::Complete(_) => {
                        return Err(AppError::Drive(
                            "Upload completed before all content was sent".to_string(),
                        ));
                    }
                };

                let accepted = accepted_len(offset, persisted, chunk.len())?;
                if accepted < chunk.len() {
                    tracing::debug!(
                        offset,
                        accepted,
                        sent = chunk.len(),
                        "Drive persisted part of a chunk, resending the rest"
                    );
                    let mut rest = BytesMut::from(&chunk[accepted..]);
                    rest.extend_from_slice(&buffer);
                    buffer = rest;
                }
                offset += accepted as u64;
            }
        }

        let mut last = buffer.freeze();
        let total = offset + last.len() as u64;

        let file = loop {
            let range = if last.is_empty() {
                format!("bytes */{}", total)
            } else {
                format!("bytes {}-{}/{}", offset, total - 1, total)
            };

            match self.put_chunk(session_uri, last.clone(), range).await? {
                ChunkOutcome::Complete(file) => break file,
                ChunkOutcome::Incomplete { persisted } => {
                    if last.is_empty() {
                        return Err(AppError::Drive("Upload did not complete".to_string()));
                    }
                    let accepted = accepted_len(offset, persisted, last.len())?;
                    if accepted == last.len() {
                        return Err(AppError::Drive("Upload did not complete".to_string()));
                    }
                    last = last.slice(accepted..);
                    offset += accepted as u64;
                }
            }
        };

        tracing::debug!(file_id = %file.id, size_bytes = total, "Upload complete");

        Ok(UploadedFile {
            file,
            size_bytes: total,
        })
    }

    /// PUT one chunk.
    async fn put_chunk(
        &self,
        session_uri: &str,
        chunk: Bytes,
        content_range: String,
    ) -> Result<ChunkOutcome, AppError> {
        let response = self
            .client
            .http
            .put(session_uri)
            .bearer_auth(&self.access_token)
            .header(header::CONTENT_RANGE, content_range)
            .body(chunk)
            .send()
            .await
            .map_err(|e| AppError::Drive(format!("Failed to upload chunk: {}", e)))?;

        if response.status() == StatusCode::PERMANENT_REDIRECT {
            let persisted = response
                .headers()
                .get(header::RANGE)
                .and_then(|v| v.to_str().ok())
                .map(parse_persisted_range)
                .transpose()?;
            return Ok(ChunkOutcome::Incomplete { persisted });
        }

        check_response_json(response).await.map(ChunkOutcome::Complete)
    }

    /// Request the raw content of a file, optionally a byte range.
    pub async fn get_media(
        &self,
        file_id: &str,
        range: Option<&str>,
    ) -> Result<MediaStream, AppError> {
        let url = format!("{}/files/{}", self.client.api_base, file_id);

        let mut request = self
            .client
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("alt", "media")]);
        if let Some(range) = range {
            request = request.header(header::RANGE, range);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::UpstreamStream(format!("Failed to start download: {}", e)))?;

        let response = check_response(response).await?;

        let status = response.status();
        let content_length = response.content_length();
        let content_range = response
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| AppError::UpstreamStream(e.to_string())))
            .boxed();

        Ok(MediaStream {
            status,
            content_length,
            content_range,
            body,
        })
    }

    /// Permanently delete a file.
    pub async fn delete_file(&self, file_id: &str) -> Result<(), AppError> {
        let url = format!("{}/files/{}", self.client.api_base, file_id);

        let response = self
            .client
            .http
            .delete(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| AppError::Drive(format!("Failed to delete file: {}", e)))?;

        check_response(response).await?;
        Ok(())
    }

    /// Grant a permission on a file.
    pub async fn create_permission(
        &self,
        file_id: &str,
        permission: &Permission,
    ) -> Result<(), AppError> {
        let url = format!("{}/files/{}/permissions", self.client.api_base, file_id);

        let response = self
            .client
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(permission)
            .send()
            .await
            .map_err(|e| AppError::Drive(format!("Failed to create permission: {}", e)))?;

        check_response(response).await?;
        Ok(())
    }
}

/// Parse the `Range: bytes=0-N` header of a 308 into the exclusive end `N + 1`.
fn parse_persisted_range(value: &str) -> Result<u64, AppError> {
    value
        .strip_prefix("bytes=0-")
        .and_then(|end| end.trim().parse::<u64>().ok())
        .map(|end| end + 1)
        .ok_or_else(|| AppError::Drive(format!("Bad Range in upload reply: {}", value)))
}

/// Bytes of a chunk starting at `offset` that Drive stored.
fn accepted_len(offset: u64, persisted: Option<u64>, sent: usize) -> Result<usize, AppError> {
    let persisted = persisted.unwrap_or(0);
    if persisted < offset || persisted > offset + sent as u64 {
        return Err(AppError::Drive(format!(
            "Upload out of sync: Drive has {} bytes, sent {}-{}",
            persisted,
            offset,
            offset + sent as u64
        )));
    }
    let accepted = (persisted - offset) as usize;
    if accepted == 0 && sent > 0 {
        return Err(AppError::Drive("Drive stored none of the chunk".to_string()));
    }
    Ok(accepted)
}

/// Check response status and return error if not successful.
async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();

    match status {
        // Token expired or revoked
        StatusCode::UNAUTHORIZED => Err(AppError::ProviderAuth(format!("HTTP 401: {}", body))),
        StatusCode::NOT_FOUND => Err(AppError::NotFound("Drive file".to_string())),
        StatusCode::TOO_MANY_REQUESTS => {
            tracing::warn!("Drive rate limit hit (429)");
            Err(AppError::Drive(format!("HTTP {}: {}", status, body)))
        }
        _ => Err(AppError::Drive(format!("HTTP {}: {}", status, body))),
    }
}

/// Check response and parse JSON body.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, AppError> {
    check_response(response)
        .await?
        .json()
        .await
        .map_err(|e| AppError::Drive(format!("JSON parse error: {}", e)))
}
