// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod accounts;
pub mod authorized_client;
pub mod drive;
pub mod files;
pub mod folder;
pub mod google_oauth;
pub mod streaming;
pub mod token_refresher;

pub use accounts::AccountService;
pub use authorized_client::{AuthorizedClientFactory, AuthorizedDrive};
pub use drive::DriveClient;
pub use files::{FileService, UploadRequest};
pub use folder::resolve_cloud_folder;
pub use google_oauth::GoogleOAuthClient;
pub use streaming::StreamingProxy;
pub use token_refresher::TokenRefresher;
