// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Relay of Drive file content to HTTP clients.
//!
//! Bytes are pulled from Drive only as fast as the client consumes them. The
//! first chunk is awaited before any header is committed so that an upstream
//! failure at the start still becomes an ordinary error response.

use crate::db::MetadataStore;
use crate::error::AppError;
use crate::models::FileRecord;
use crate::services::authorized_client::AuthorizedClientFactory;
use axum::body::Body;
use axum::http::{header, HeaderValue};
use axum::response::Response;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream};
use futures_util::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
const CACHE_CONTROL: &str = "public, max-age=31536000";

#[derive(Clone)]
pub struct StreamingProxy {
    db: Arc<dyn MetadataStore>,
    clients: AuthorizedClientFactory,
}

impl StreamingProxy {
    pub fn new(db: Arc<dyn MetadataStore>, clients: AuthorizedClientFactory) -> Self {
        Self { db, clients }
    }

    /// Build a streaming response for `record`, optionally for a byte range.
    ///
    /// Drive's status (200 or 206) and `Content-Range` are passed through.
    pub async fn stream_to_client(
        &self,
        record: &FileRecord,
        range: Option<&str>,
    ) -> Result<Response, AppError> {
        let owner = self
            .db
            .get_user(&record.owner_id)
            .await?
            .ok_or_else(|| AppError::NotFound("File owner".to_string()))?;

        let drive = self.clients.for_user(&owner).await?;

        let media = drive
            .get_media(&record.remote_id, range)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) | AppError::UpstreamStream(_) => e,
                // The viewer is not the owner and cannot fix the owner's
                // Drive authorization, so auth failures are reported as a
                // gateway failure rather than 401.
                other => {
                    tracing::error!(
                        file_id = %record.id,
                        error = %other,
                        "Drive refused media request"
                    );
                    AppError::UpstreamStream(other.to_string())
                }
            })?;

        let relay = RelayStream::open(record.id.clone(), media.body).await?;

        let content_type = record
            .mime_type
            .as_deref()
            .and_then(|m| HeaderValue::from_str(m).ok())
            .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));

        let mut builder = Response::builder()
            .status(media.status)
            .header(header::CONTENT_TYPE, content_type)
            .header(
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", urlencoding::encode(record.name())),
            )
            .header(header::ACCEPT_RANGES, "bytes")
            .header(header::CACHE_CONTROL, CACHE_CONTROL)
            // Served from our origin, so never let user content run scripts
            .header(header::CONTENT_SECURITY_POLICY, "sandbox");

        if let Some(length) = media.content_length {
            builder = builder.header(header::CONTENT_LENGTH, length);
        }
        if let Some(content_range) = media.content_range {
            builder = builder.header(header::CONTENT_RANGE, content_range);
        }

        builder
            .body(Body::from_stream(relay))
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build response: {}", e)))
    }
}

/// Byte stream handed to the response body.
///
/// Dropping it (client went away) drops the upstream response with it.
pub struct RelayStream {
    file_id: String,
    inner: BoxStream<'static, Result<Bytes, AppError>>,
    bytes_sent: u64,
    finished: bool,
}

impl RelayStream {
    /// Wait for the first upstream chunk. An error here is returned rather
    /// than relayed, since nothing has been sent yet.
    pub async fn open(
        file_id: String,
        mut upstream: BoxStream<'static, Result<Bytes, AppError>>,
    ) -> Result<Self, AppError> {
        let inner = match upstream.next().await {
            Some(Ok(first)) => stream::once(async move { Ok(first) }).chain(upstream).boxed(),
            Some(Err(e)) => {
                tracing::error!(file_id = %file_id, error = %e, "Upstream failed before first byte");
                return Err(e);
            }
            None => stream::empty().boxed(),
        };

        Ok(Self {
            file_id,
            inner,
            bytes_sent: 0,
            finished: false,
        })
    }
}

impl Stream for RelayStream {
    type Item = Result<Bytes, AppError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }

        let polled = self.inner.as_mut().poll_next(cx);
        match &polled {
            Poll::Ready(Some(Ok(chunk))) => {
                self.bytes_sent += chunk.len() as u64;
            }
            Poll::Ready(Some(Err(e))) => {
                // Headers are gone already; the body error aborts the connection.
                tracing::error!(
                    file_id = %self.file_id,
                    bytes_sent = self.bytes_sent,
                    error = %e,
                    "Upstream failed mid-stream"
                );
                self.finished = true;
            }
            Poll::Ready(None) => {
                tracing::debug!(
                    file_id = %self.file_id,
                    bytes_sent = self.bytes_sent,
                    "Stream complete"
                );
                self.finished = true;
            }
            Poll::Pending => {}
        }
        polled
    }
}

impl Drop for RelayStream {
    fn drop(&mut self) {
        if !self.finished {
            tracing::info!(
                file_id = %self.file_id,
                bytes_sent = self.bytes_sent,
                "Client disconnected, closing upstream"
            );
        }
    }
}
