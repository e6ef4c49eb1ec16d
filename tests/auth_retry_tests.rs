// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Retry-on-401 tests for per-user Drive access.
//!
//! These tests verify that:
//! 1. A single 401 triggers one refresh and one reissue
//! 2. A second 401 is surfaced without a third attempt
//! 3. The refreshed credential is persisted and reused

use chrono::{Duration, Utc};
use cloud_files::db::{CredentialStore, MemoryDb};
use cloud_files::error::AppError;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

async fn mock_list(google: &MockServer, token: &str, status: u16, expected_calls: u64) {
    let response = if status == 200 {
        ResponseTemplate::new(200)
            .set_body_json(json!({"files": [{"id": "folder-1", "name": "Cloud"}]}))
    } else {
        ResponseTemplate::new(status).set_body_json(json!({"error": {"code": status}}))
    };

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(header("authorization", format!("Bearer {}", token).as_str()))
        .respond_with(response)
        .expect(expected_calls)
        .mount(google)
        .await;
}

#[tokio::test]
async fn test_single_401_retried_transparently() {
    let google = MockServer::start().await;
    let db = MemoryDb::new();

    mock_list(&google, "A1", 401, 1).await;
    mock_list(&google, "A2", 200, 1).await;
    common::mock_refresh(&google, "A2", 1).await;

    let user = common::seed_user(&db, "u1", common::fresh_credential("A1")).await;
    let drive = common::client_factory(&google, &db)
        .for_user(&user)
        .await
        .unwrap();

    let files = drive.list_files("name = 'Cloud'").await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].id, "folder-1");

    assert_eq!(drive.credential().access_token, "A2");
    let stored = db.load_credential("u1").await.unwrap().unwrap();
    assert_eq!(stored.access_token, "A2");
    assert_eq!(stored.refresh_token.as_deref(), Some("R1"));
}

#[tokio::test]
async fn test_second_401_is_not_retried() {
    let google = MockServer::start().await;
    let db = MemoryDb::new();

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&google)
        .await;
    common::mock_refresh(&google, "A2", 1).await;

    let user = common::seed_user(&db, "u1", common::fresh_credential("A1")).await;
    let drive = common::client_factory(&google, &db)
        .for_user(&user)
        .await
        .unwrap();

    let result = drive.list_files("name = 'Cloud'").await;
    assert!(matches!(result, Err(AppError::ProviderAuth(_))));
}

#[tokio::test]
async fn test_refresh_failure_during_retry_surfaces() {
    let google = MockServer::start().await;
    let db = MemoryDb::new();

    mock_list(&google, "A1", 401, 1).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})))
        .expect(1)
        .mount(&google)
        .await;

    let user = common::seed_user(&db, "u1", common::fresh_credential("A1")).await;
    let drive = common::client_factory(&google, &db)
        .for_user(&user)
        .await
        .unwrap();

    let result = drive.list_files("name = 'Cloud'").await;
    assert!(matches!(result, Err(AppError::TokenRefresh(_))));
}

#[tokio::test]
async fn test_refreshed_handle_reused() {
    let google = MockServer::start().await;
    let db = MemoryDb::new();

    mock_list(&google, "A1", 401, 1).await;
    mock_list(&google, "A2", 200, 2).await;
    common::mock_refresh(&google, "A2", 1).await;

    let user = common::seed_user(&db, "u1", common::fresh_credential("A1")).await;
    let drive = common::client_factory(&google, &db)
        .for_user(&user)
        .await
        .unwrap();

    drive.list_files("name = 'Cloud'").await.unwrap();
    drive.list_files("name = 'Cloud'").await.unwrap();
}

#[tokio::test]
async fn test_non_auth_errors_not_retried() {
    let google = MockServer::start().await;
    let db = MemoryDb::new();

    Mock::given(method("DELETE"))
        .and(path("/drive/v3/files/d1"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&google)
        .await;
    common::mock_refresh(&google, "A2", 0).await;

    let user = common::seed_user(&db, "u1", common::fresh_credential("A1")).await;
    let drive = common::client_factory(&google, &db)
        .for_user(&user)
        .await
        .unwrap();

    let result = drive.delete_file("d1").await;
    assert!(matches!(result, Err(AppError::Drive(_))));
}

#[tokio::test]
async fn test_stale_credential_refreshed_before_first_call() {
    let google = MockServer::start().await;
    let db = MemoryDb::new();

    mock_list(&google, "A2", 200, 1).await;
    common::mock_refresh(&google, "A2", 1).await;

    let stale = common::credential("A1", Some(Utc::now() - Duration::minutes(5)));
    let user = common::seed_user(&db, "u1", stale).await;

    let drive = common::client_factory(&google, &db)
        .for_user(&user)
        .await
        .unwrap();
    assert_eq!(drive.credential().access_token, "A2");

    drive.list_files("name = 'Cloud'").await.unwrap();
}

#[tokio::test]
async fn test_failed_upfront_refresh_falls_back_to_retry() {
    let google = MockServer::start().await;
    let db = MemoryDb::new();

    // Refresh endpoint fails on every call; the stale token is tried once.
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&google)
        .await;
    mock_list(&google, "A1", 401, 1).await;

    let stale = common::credential("A1", Some(Utc::now() - Duration::minutes(5)));
    let user = common::seed_user(&db, "u1", stale).await;

    let drive = common::client_factory(&google, &db)
        .for_user(&user)
        .await
        .unwrap();
    assert_eq!(drive.credential().access_token, "A1");

    let result = drive.list_files("name = 'Cloud'").await;
    assert!(matches!(result, Err(AppError::TokenRefresh(_))));
}
