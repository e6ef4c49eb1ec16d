// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Lookup of the folder that holds uploaded files.

use crate::error::AppError;
use crate::services::authorized_client::AuthorizedDrive;
use crate::services::drive::FOLDER_MIME_TYPE;

/// Name of the Drive folder uploads go into.
pub const CLOUD_FOLDER_NAME: &str = "Cloud";

/// Find the user's Cloud folder, creating it if there is none.
///
/// Not atomic: two first uploads racing each other can each create a folder.
/// Later lookups then see both and use whichever Drive lists first.
pub async fn resolve_cloud_folder(drive: &AuthorizedDrive) -> Result<String, AppError> {
    let query = folder_query(CLOUD_FOLDER_NAME);
    let folders = drive.list_files(&query).await?;

    if folders.len() > 1 {
        tracing::warn!(
            event = "FolderRaceWarning",
            count = folders.len(),
            folder = CLOUD_FOLDER_NAME,
            "Multiple folders found, using the first"
        );
    }

    if let Some(folder) = folders.into_iter().next() {
        tracing::debug!(folder_id = %folder.id, "Using existing folder");
        return Ok(folder.id);
    }

    let folder = drive.create_folder(CLOUD_FOLDER_NAME).await?;
    tracing::info!(folder_id = %folder.id, folder = CLOUD_FOLDER_NAME, "Created folder");
    Ok(folder.id)
}

/// Drive search query for a non-trashed folder with exactly this name.
fn folder_query(name: &str) -> String {
    format!(
        "mimeType = '{}' and name = '{}' and trashed = false",
        FOLDER_MIME_TYPE,
        escape_query_value(name)
    )
}

fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
