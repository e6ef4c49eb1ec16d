// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google sign-in flow tests.
//!
//! These tests verify that:
//! 1. Sign-in redirects to Google with a signed state
//! 2. The callback rejects forged state
//! 3. A successful callback stores the user and sets the session cookie
//! 4. Re-login keeps the stored refresh token

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use cloud_files::db::{CredentialStore, MetadataStore};
use cloud_files::middleware::auth::verify_jwt;
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, header as header_eq, method, path};
use wiremock::{Mock, ResponseTemplate};

mod common;

/// Value of query parameter `name` in `url`.
fn query_value(url: &str, name: &str) -> Option<String> {
    let query = url.split_once('?')?.1;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| urlencoding::decode(value).ok().map(|v| v.into_owned()))?
    })
}

async fn start_sign_in(router: axum::Router) -> String {
    let response = router
        .oneshot(
            Request::builder()
                .uri("/auth/google")
                .header(header::HOST, "localhost:8080")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    query_value(&location, "state").unwrap()
}

async fn mock_google_sign_in(app: &common::TestApp, refresh_token: Option<&str>) {
    let mut token = json!({
        "access_token": "A-login",
        "expires_in": 3599,
        "token_type": "Bearer"
    });
    if let Some(rt) = refresh_token {
        token["refresh_token"] = json!(rt);
    }

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=good-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token))
        .expect(1)
        .mount(&app.google)
        .await;

    Mock::given(method("GET"))
        .and(path("/oauth2/v2/userinfo"))
        .and(header_eq("authorization", "Bearer A-login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "google-42",
            "email": "ada@example.com",
            "name": "Ada"
        })))
        .expect(1)
        .mount(&app.google)
        .await;
}

#[tokio::test]
async fn test_sign_in_redirects_to_google() {
    let app = common::create_test_app().await;

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/auth/google")
                .header(header::HOST, "localhost:8080")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();

    assert!(location.starts_with(&app.config.google_auth_url));
    assert_eq!(
        query_value(location, "redirect_uri").as_deref(),
        Some("http://localhost:8080/auth/google/callback")
    );
    assert_eq!(query_value(location, "access_type").as_deref(), Some("offline"));
    assert!(query_value(location, "state").is_some());
}

#[tokio::test]
async fn test_callback_rejects_forged_state() {
    let app = common::create_test_app().await;

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/auth/google/callback?code=good-code&state=Zm9yZ2Vk")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_callback_creates_user_and_session() {
    let app = common::create_test_app().await;
    mock_google_sign_in(&app, Some("R-login")).await;

    let state = start_sign_in(app.router.clone()).await;
    let uri = format!(
        "/auth/google/callback?code=good-code&state={}",
        urlencoding::encode(&state)
    );

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri(uri)
                .header(header::HOST, "localhost:8080")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        app.config.frontend_url.as_str()
    );

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(cookie.contains("HttpOnly"));
    let jwt = cookie
        .strip_prefix("session=")
        .and_then(|rest| rest.split(';').next())
        .unwrap();

    let user_id = verify_jwt(jwt, &app.config.jwt_signing_key).unwrap();
    let user = app.db.get_user(&user_id).await.unwrap().unwrap();
    assert_eq!(user.external_id, "google-42");
    assert_eq!(user.email.as_deref(), Some("ada@example.com"));
    assert_eq!(user.credential.access_token, "A-login");
    assert_eq!(user.credential.refresh_token.as_deref(), Some("R-login"));
}

#[tokio::test]
async fn test_relogin_keeps_refresh_token() {
    let app = common::create_test_app().await;
    mock_google_sign_in(&app, None).await;

    let mut existing = common::seed_user(&app.db, "u1", common::fresh_credential("A1")).await;
    existing.external_id = "google-42".to_string();
    app.db.upsert_user(&existing).await.unwrap();

    let state = start_sign_in(app.router.clone()).await;
    let uri = format!(
        "/auth/google/callback?code=good-code&state={}",
        urlencoding::encode(&state)
    );

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri(uri)
                .header(header::HOST, "localhost:8080")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let credential = app.db.load_credential("u1").await.unwrap().unwrap();
    assert_eq!(credential.access_token, "A-login");
    assert_eq!(credential.refresh_token.as_deref(), Some("R1"));
}

#[tokio::test]
async fn test_callback_with_provider_error() {
    let app = common::create_test_app().await;

    let state = start_sign_in(app.router.clone()).await;
    let uri = format!(
        "/auth/google/callback?error=access_denied&state={}",
        urlencoding::encode(&state)
    );

    let response = app
        .router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "http://localhost:5173?error=access_denied"
    );
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let app = common::create_test_app().await;

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/auth/logout")
                .header(header::COOKIE, "session=abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(cookie.starts_with("session="));
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_health() {
    let app = common::create_test_app().await;

    let response = app
        .router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_json(response).await;
    assert_eq!(body["status"], "ok");
}
