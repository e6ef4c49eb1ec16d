// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user Drive access with a single retry on authorization failure.
//!
//! Flow for each wrapped call:
//! 1. Issue the call with the current handle
//! 2. On 401, force one token refresh (a refresh failure is returned as is)
//! 3. Rebuild the handle and reissue the call once
//! 4. A second 401 is returned to the caller; there is no third attempt

use crate::error::AppError;
use crate::models::{Credential, User};
use crate::services::drive::{
    DriveClient, DriveFile, DriveHandle, MediaStream, NewDriveFile, Permission, UploadedFile,
};
use crate::services::token_refresher::TokenRefresher;
use bytes::Bytes;
use futures_util::Stream;
use std::future::Future;
use std::sync::Mutex;

/// Builds [`AuthorizedDrive`] handles for users.
#[derive(Clone)]
pub struct AuthorizedClientFactory {
    drive: DriveClient,
    refresher: TokenRefresher,
}

impl AuthorizedClientFactory {
    pub fn new(drive: DriveClient, refresher: TokenRefresher) -> Self {
        Self { drive, refresher }
    }

    /// Drive access for `user`, refreshing the stored credential first if it
    /// is stale. A failed refresh here is not fatal; the first Drive call
    /// will hit 401 and go through the retry path.
    pub async fn for_user(&self, user: &User) -> Result<AuthorizedDrive, AppError> {
        let credential = self
            .refresher
            .ensure_fresh(&user.id, user.credential.clone(), true)
            .await?;
        let handle = self.drive.handle(&credential.access_token);

        Ok(AuthorizedDrive {
            user_id: user.id.clone(),
            drive: self.drive.clone(),
            refresher: self.refresher.clone(),
            current: Mutex::new(Current { credential, handle }),
        })
    }
}

struct Current {
    credential: Credential,
    handle: DriveHandle,
}

/// Drive operations for one user. After a retry, later calls reuse the
/// refreshed handle.
pub struct AuthorizedDrive {
    user_id: String,
    drive: DriveClient,
    refresher: TokenRefresher,
    current: Mutex<Current>,
}

impl AuthorizedDrive {
    /// The credential currently in use.
    pub fn credential(&self) -> Credential {
        self.lock().credential.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Current> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn snapshot(&self) -> (Credential, DriveHandle) {
        let current = self.lock();
        (current.credential.clone(), current.handle.clone())
    }

    async fn with_auth_retry<T, F, Fut>(&self, operation: &'static str, call: F) -> Result<T, AppError>
    where
        F: Fn(DriveHandle) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let (credential, handle) = self.snapshot();

        match call(handle).await {
            Err(e) if e.is_provider_auth_error() => {
                tracing::info!(
                    user_id = %self.user_id,
                    operation,
                    "Drive returned 401, forcing token refresh"
                );
            }
            result => return result,
        }

        let refreshed = self
            .refresher
            .force_refresh(&self.user_id, &credential)
            .await?;
        let handle = self.drive.handle(&refreshed.access_token);
        {
            let mut current = self.lock();
            current.credential = refreshed;
            current.handle = handle.clone();
        }

        let result = call(handle).await;
        if let Err(e) = &result {
            if e.is_provider_auth_error() {
                tracing::warn!(
                    user_id = %self.user_id,
                    operation,
                    "Drive still unauthorized after refresh"
                );
            }
        }
        result
    }

    pub async fn list_files(&self, query: &str) -> Result<Vec<DriveFile>, AppError> {
        self.with_auth_retry("list_files", |h| async move { h.list_files(query).await })
            .await
    }

    pub async fn create_folder(&self, name: &str) -> Result<DriveFile, AppError> {
        self.with_auth_retry("create_folder", |h| async move { h.create_folder(name).await })
            .await
    }

    /// Create a file with content. Opening the session is retried on 401;
    /// the content stream is consumed once and never replayed.
    pub async fn upload_file<S, E>(
        &self,
        metadata: &NewDriveFile,
        content: S,
    ) -> Result<UploadedFile, AppError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        let session_uri = self
            .with_auth_retry("start_upload", |h| async move { h.start_upload(metadata).await })
            .await?;

        let (_, handle) = self.snapshot();
        handle.upload_content(&session_uri, content).await
    }

    pub async fn get_media(
        &self,
        file_id: &str,
        range: Option<&str>,
    ) -> Result<MediaStream, AppError> {
        self.with_auth_retry("get_media", |h| async move { h.get_media(file_id, range).await })
            .await
    }

    pub async fn delete_file(&self, file_id: &str) -> Result<(), AppError> {
        self.with_auth_retry("delete_file", |h| async move { h.delete_file(file_id).await })
            .await
    }

    pub async fn create_permission(
        &self,
        file_id: &str,
        permission: &Permission,
    ) -> Result<(), AppError> {
        self.with_auth_retry("create_permission", |h| async move {
            h.create_permission(file_id, permission).await
        })
        .await
    }
}
