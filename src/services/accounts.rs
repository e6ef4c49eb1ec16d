// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google sign-in: code exchange and user upsert.

use crate::db::MetadataStore;
use crate::error::AppError;
use crate::models::User;
use crate::services::google_oauth::{GoogleOAuthClient, GoogleUserInfo, TokenResponse};
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(Clone)]
pub struct AccountService {
    db: Arc<dyn MetadataStore>,
    oauth: GoogleOAuthClient,
}

impl AccountService {
    pub fn new(db: Arc<dyn MetadataStore>, oauth: GoogleOAuthClient) -> Self {
        Self { db, oauth }
    }

    /// Complete a Google sign-in and return the stored user.
    ///
    /// Returning users keep their stored refresh token if Google did not
    /// send a new one.
    pub async fn sign_in_with_google(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<User, AppError> {
        let tokens = self.oauth.exchange_code(code, redirect_uri).await?;
        let profile = self.oauth.get_userinfo(&tokens.access_token).await?;

        let existing = self.db.find_user_by_external_id(&profile.id).await?;
        let is_new = existing.is_none();
        let user = apply_sign_in(existing, profile, tokens, Utc::now());

        if user.credential.refresh_token.is_none() {
            tracing::warn!(user_id = %user.id, "Signed in without a refresh token");
        }

        self.db.upsert_user(&user).await?;

        tracing::info!(user_id = %user.id, is_new, "User signed in");
        Ok(user)
    }
}

fn apply_sign_in(
    existing: Option<User>,
    profile: GoogleUserInfo,
    tokens: TokenResponse,
    now: DateTime<Utc>,
) -> User {
    let timestamp = format_utc_rfc3339(now);

    match existing {
        Some(mut user) => {
            let expiry = tokens.expiry(now);
            user.credential
                .merge(tokens.access_token, expiry, tokens.refresh_token);
            user.email = profile.email.or(user.email);
            user.display_name = profile.name.or(user.display_name);
            user.last_login = timestamp;
            user
        }
        None => User {
            id: uuid::Uuid::new_v4().to_string(),
            external_id: profile.id,
            email: profile.email,
            display_name: profile.name,
            credential: tokens.into_credential(now),
            created_at: timestamp.clone(),
            last_login: timestamp,
        },
    }
}
