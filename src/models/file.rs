// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! File metadata mirrored from Drive.

use serde::{Deserialize, Serialize};

/// Stored file record. One per uploaded Drive object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// Local record ID (also used as document ID)
    pub id: String,
    /// Owning user ID
    pub owner_id: String,
    /// Drive file ID
    pub remote_id: String,
    /// Name as stored in Drive
    pub display_name: Option<String>,
    /// Name of the uploaded file
    pub original_name: Option<String>,
    /// Size in bytes
    pub size_bytes: u64,
    pub mime_type: Option<String>,
    /// Drive preview link
    pub view_link: Option<String>,
    /// Direct download link
    pub download_link: Option<String>,
    /// Upload timestamp (RFC3339, `Z` suffix)
    pub created_at: String,
}

impl FileRecord {
    /// Best available name for display.
    pub fn name(&self) -> &str {
        self.original_name
            .as_deref()
            .or(self.display_name.as_deref())
            .unwrap_or("Untitled")
    }
}
