// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Cloud Files: personal file storage backed by Google Drive
//!
//! This crate provides the backend API for uploading, listing, streaming and
//! deleting files kept in each user's own Drive, with file metadata held in
//! Firestore.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::MetadataStore;
use services::{
    AccountService, AuthorizedClientFactory, DriveClient, FileService, GoogleOAuthClient,
    StreamingProxy, TokenRefresher,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Arc<dyn MetadataStore>,
    pub oauth: GoogleOAuthClient,
    pub accounts: AccountService,
    pub files: FileService,
    pub streaming: StreamingProxy,
}

impl AppState {
    /// Wire up the services against `db`.
    pub fn new(config: Config, db: Arc<dyn MetadataStore>) -> Self {
        let oauth = GoogleOAuthClient::new(&config);
        let refresher = TokenRefresher::new(oauth.clone(), db.clone());
        let clients = AuthorizedClientFactory::new(DriveClient::new(&config), refresher);

        Self {
            accounts: AccountService::new(db.clone(), oauth.clone()),
            files: FileService::new(db.clone(), clients.clone()),
            streaming: StreamingProxy::new(db.clone(), clients),
            oauth,
            db,
            config,
        }
    }
}
