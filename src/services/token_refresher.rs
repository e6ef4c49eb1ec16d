// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access token refresh.
//!
//! The refreshed credential is returned to the caller and persisted here
//! before returning. Concurrent refreshes for the same user are not
//! deduplicated; the store is last-write-wins and every writer holds the same
//! refresh token lineage.

use crate::db::CredentialStore;
use crate::error::AppError;
use crate::models::Credential;
use crate::services::google_oauth::GoogleOAuthClient;
use chrono::Utc;
use std::sync::Arc;

#[derive(Clone)]
pub struct TokenRefresher {
    oauth: GoogleOAuthClient,
    store: Arc<dyn CredentialStore>,
}

impl TokenRefresher {
    pub fn new(oauth: GoogleOAuthClient, store: Arc<dyn CredentialStore>) -> Self {
        Self { oauth, store }
    }

    /// Return a credential whose access token is not stale, refreshing if
    /// needed.
    ///
    /// With `allow_retry`, a failed refresh is logged and the existing
    /// credential is returned so the Drive call itself decides. Without it,
    /// the failure is returned as [`AppError::TokenRefresh`].
    pub async fn ensure_fresh(
        &self,
        user_id: &str,
        credential: Credential,
        allow_retry: bool,
    ) -> Result<Credential, AppError> {
        if !credential.is_stale(Utc::now()) {
            return Ok(credential);
        }

        tracing::info!(user_id, "Access token stale, refreshing");

        match self.refresh(user_id, &credential).await {
            Ok(refreshed) => Ok(refreshed),
            Err(e) if allow_retry => {
                tracing::warn!(
                    user_id,
                    error = %e,
                    "Access token not refreshed, continuing with stored token"
                );
                Ok(credential)
            }
            Err(e) => Err(e),
        }
    }

    /// Replace an access token Drive rejected. Used after a 401 on a token
    /// that looked fresh.
    ///
    /// If the store already holds a different, fresh access token (another
    /// request refreshed in the meantime), that one is returned without
    /// calling the token endpoint. Otherwise the token is refreshed.
    pub async fn force_refresh(
        &self,
        user_id: &str,
        rejected: &Credential,
    ) -> Result<Credential, AppError> {
        let stored = match self.store.load_credential(user_id).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Failed to reload stored credential");
                None
            }
        };

        match stored {
            Some(stored)
                if stored.access_token != rejected.access_token
                    && !stored.is_stale(Utc::now()) =>
            {
                tracing::info!(user_id, "Using access token refreshed by another request");
                Ok(stored)
            }
            Some(stored) => {
                let base = Credential {
                    refresh_token: stored.refresh_token.or_else(|| rejected.refresh_token.clone()),
                    ..rejected.clone()
                };
                self.refresh(user_id, &base).await
            }
            None => self.refresh(user_id, rejected).await,
        }
    }

    async fn refresh(&self, user_id: &str, credential: &Credential) -> Result<Credential, AppError> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::TokenRefresh("No refresh token stored".to_string()))?;

        let response = self.oauth.exchange_refresh_token(refresh_token).await?;

        let mut updated = credential.clone();
        let expiry = response.expiry(Utc::now());
        updated.merge(response.access_token, expiry, response.refresh_token);

        // The new token is valid whether or not it was stored; a failed write
        // only means the next request refreshes again.
        if let Err(e) = self.store.save_credential(user_id, &updated).await {
            tracing::error!(user_id, error = %e, "Failed to persist refreshed credential");
        } else {
            tracing::info!(user_id, "Access token refreshed and stored");
        }

        Ok(updated)
    }
}
