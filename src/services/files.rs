// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! File operations: upload, list, lookup and delete.
//!
//! Content lives in the owner's Drive under the Cloud folder; the metadata
//! store keeps one [`FileRecord`] per Drive object.

use crate::db::MetadataStore;
use crate::error::AppError;
use crate::models::{FileRecord, User};
use crate::services::authorized_client::{AuthorizedClientFactory, AuthorizedDrive};
use crate::services::drive::{DriveFile, NewDriveFile, Permission};
use crate::services::folder::resolve_cloud_folder;
use crate::time_utils::now_utc_rfc3339;
use bytes::Bytes;
use futures_util::Stream;
use std::sync::Arc;

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Direct download URL for a Drive file that has no `webContentLink`.
pub fn fallback_download_link(remote_id: &str) -> String {
    format!("https://drive.google.com/uc?export=download&id={}", remote_id)
}

/// Client-supplied details of an upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub mime_type: Option<String>,
}

#[derive(Clone)]
pub struct FileService {
    db: Arc<dyn MetadataStore>,
    clients: AuthorizedClientFactory,
}

impl FileService {
    pub fn new(db: Arc<dyn MetadataStore>, clients: AuthorizedClientFactory) -> Self {
        Self { db, clients }
    }

    /// Stream `content` into the user's Cloud folder, share it by link, and
    /// record it.
    ///
    /// If sharing or recording fails after Drive accepted the content, the
    /// Drive object is deleted again (best effort).
    pub async fn upload<S, E>(
        &self,
        user: &User,
        request: UploadRequest,
        content: S,
    ) -> Result<FileRecord, AppError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        let drive = self.clients.for_user(user).await?;
        let folder_id = resolve_cloud_folder(&drive).await?;

        let mime_type = request
            .mime_type
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());

        let metadata = NewDriveFile {
            name: request.file_name.clone(),
            mime_type: mime_type.clone(),
            parents: vec![folder_id],
        };

        let uploaded = drive.upload_file(&metadata, content).await?;
        let remote_id = uploaded.file.id.clone();

        tracing::info!(
            user_id = %user.id,
            remote_id = %remote_id,
            size_bytes = uploaded.size_bytes,
            "Uploaded file to Drive"
        );

        let record = build_record(user, &request, mime_type, uploaded.file, uploaded.size_bytes);

        if let Err(e) = self.finish_upload(&drive, &record).await {
            tracing::error!(
                user_id = %user.id,
                remote_id = %remote_id,
                error = %e,
                "Upload failed after content was stored, removing Drive file"
            );
            if let Err(cleanup) = drive.delete_file(&remote_id).await {
                tracing::warn!(
                    remote_id = %remote_id,
                    error = %cleanup,
                    "Failed to remove Drive file after upload failure"
                );
            }
            return Err(e);
        }

        Ok(record)
    }

    async fn finish_upload(&self, drive: &AuthorizedDrive, record: &FileRecord) -> Result<(), AppError> {
        drive
            .create_permission(&record.remote_id, &Permission::anyone_reader())
            .await?;
        self.db.insert_file(record).await
    }

    /// The user's files, newest first.
    pub async fn list(&self, user_id: &str) -> Result<Vec<FileRecord>, AppError> {
        self.db.list_files_for_owner(user_id).await
    }

    /// Look up a record, treating records of other users as missing.
    pub async fn get_owned(&self, user_id: &str, file_id: &str) -> Result<FileRecord, AppError> {
        match self.db.get_file(file_id).await? {
            Some(record) if record.owner_id == user_id => Ok(record),
            _ => Err(AppError::NotFound(format!("File {}", file_id))),
        }
    }

    /// Look up a record regardless of owner.
    pub async fn get(&self, file_id: &str) -> Result<FileRecord, AppError> {
        self.db
            .get_file(file_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File {}", file_id)))
    }

    /// Delete the Drive object, then the record.
    ///
    /// If Drive no longer has the object, the record is removed anyway and
    /// [`AppError::RemoteMissing`] is returned. Any other Drive failure
    /// leaves the record in place.
    pub async fn delete(&self, user: &User, file_id: &str) -> Result<(), AppError> {
        let record = self.get_owned(&user.id, file_id).await?;
        let drive = self.clients.for_user(user).await?;

        match drive.delete_file(&record.remote_id).await {
            Ok(()) => {
                self.db.delete_file(&record.id).await?;
                tracing::info!(user_id = %user.id, file_id, "Deleted file");
                Ok(())
            }
            Err(AppError::NotFound(_)) => {
                tracing::warn!(
                    user_id = %user.id,
                    file_id,
                    remote_id = %record.remote_id,
                    "Drive file already gone, removing record"
                );
                self.db.delete_file(&record.id).await?;
                Err(AppError::RemoteMissing(record.remote_id))
            }
            Err(e) => Err(e),
        }
    }
}

fn build_record(
    user: &User,
    request: &UploadRequest,
    mime_type: String,
    file: DriveFile,
    bytes_sent: u64,
) -> FileRecord {
    let download_link = file
        .web_content_link
        .clone()
        .unwrap_or_else(|| fallback_download_link(&file.id));

    FileRecord {
        id: uuid::Uuid::new_v4().to_string(),
        owner_id: user.id.clone(),
        size_bytes: file.size_bytes().unwrap_or(bytes_sent),
        mime_type: Some(file.mime_type.unwrap_or(mime_type)),
        view_link: file.web_view_link,
        download_link: Some(download_link),
        display_name: Some(file.name),
        original_name: Some(request.file_name.clone()),
        remote_id: file.id,
        created_at: now_utc_rfc3339(),
    }
}
