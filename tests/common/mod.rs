// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request};
use chrono::{DateTime, Duration, Utc};
use cloud_files::config::Config;
use cloud_files::db::{MemoryDb, MetadataStore};
use cloud_files::middleware::auth::create_jwt;
use cloud_files::models::{Credential, FileRecord, User};
use cloud_files::routes::create_router;
use cloud_files::services::{
    AuthorizedClientFactory, DriveClient, GoogleOAuthClient, TokenRefresher,
};
use cloud_files::AppState;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

/// App wired against an in-memory store and a mock Google server.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub db: MemoryDb,
    pub google: MockServer,
    pub config: Config,
}

#[allow(dead_code)]
pub async fn create_test_app() -> TestApp {
    let google = MockServer::start().await;
    let config = Config::test_default_with_base(&google.uri());
    let db = MemoryDb::new();

    let state = Arc::new(AppState::new(config.clone(), Arc::new(db.clone())));
    let router = create_router(state.clone());

    TestApp {
        router,
        state,
        db,
        google,
        config,
    }
}

/// Client factory against `google`, sharing `db`.
#[allow(dead_code)]
pub fn client_factory(google: &MockServer, db: &MemoryDb) -> AuthorizedClientFactory {
    let config = Config::test_default_with_base(&google.uri());
    AuthorizedClientFactory::new(DriveClient::new(&config), refresher(google, db))
}

#[allow(dead_code)]
pub fn refresher(google: &MockServer, db: &MemoryDb) -> TokenRefresher {
    let config = Config::test_default_with_base(&google.uri());
    TokenRefresher::new(GoogleOAuthClient::new(&config), Arc::new(db.clone()))
}

#[allow(dead_code)]
pub fn credential(access_token: &str, expiry: Option<DateTime<Utc>>) -> Credential {
    Credential {
        access_token: access_token.to_string(),
        refresh_token: Some("R1".to_string()),
        expiry,
    }
}

/// Credential that is good for another hour.
#[allow(dead_code)]
pub fn fresh_credential(access_token: &str) -> Credential {
    credential(access_token, Some(Utc::now() + Duration::hours(1)))
}

#[allow(dead_code)]
pub async fn seed_user(db: &MemoryDb, id: &str, credential: Credential) -> User {
    let user = User {
        id: id.to_string(),
        external_id: format!("google-{}", id),
        email: Some(format!("{}@example.com", id)),
        display_name: Some("Test User".to_string()),
        credential,
        created_at: "2026-01-15T10:00:00Z".to_string(),
        last_login: "2026-01-15T10:00:00Z".to_string(),
    };
    db.upsert_user(&user).await.unwrap();
    user
}

#[allow(dead_code)]
pub async fn seed_file(db: &MemoryDb, id: &str, owner_id: &str, created_at: &str) -> FileRecord {
    let record = FileRecord {
        id: id.to_string(),
        owner_id: owner_id.to_string(),
        remote_id: format!("drive-{}", id),
        display_name: Some(format!("{}.txt", id)),
        original_name: Some(format!("{}.txt", id)),
        size_bytes: 11,
        mime_type: Some("text/plain".to_string()),
        view_link: Some(format!("https://drive.google.com/file/d/drive-{}/view", id)),
        download_link: Some(format!(
            "https://drive.google.com/uc?export=download&id=drive-{}",
            id
        )),
        created_at: created_at.to_string(),
    };
    db.insert_file(&record).await.unwrap();
    record
}

/// Request carrying a session for `user_id`.
#[allow(dead_code)]
pub fn authed_request(
    config: &Config,
    method: &str,
    uri: &str,
    user_id: &str,
) -> axum::http::request::Builder {
    let jwt = create_jwt(user_id, &config.jwt_signing_key).unwrap();
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", jwt))
}

#[allow(dead_code)]
pub fn empty_body() -> Body {
    Body::empty()
}

/// Token endpoint answering refresh requests with `access_token`.
#[allow(dead_code)]
pub async fn mock_refresh(google: &MockServer, access_token: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access_token,
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(expected_calls)
        .mount(google)
        .await;
}

/// Folder lookup returning the given folder IDs.
#[allow(dead_code)]
pub async fn mock_folder_list(google: &MockServer, folder_ids: &[&str]) {
    let files: Vec<_> = folder_ids
        .iter()
        .map(|id| json!({"id": id, "name": "Cloud"}))
        .collect();

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": files })))
        .mount(google)
        .await;
}

#[allow(dead_code)]
pub async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
