//! User model and the OAuth credential it owns.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Refresh this long before the recorded expiry to absorb clock skew and
/// in-flight latency.
pub const STALENESS_MARGIN_SECS: i64 = 60;

/// User profile stored in the metadata store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Local user ID (also used as document ID)
    pub id: String,
    /// Google account ID
    pub external_id: String,
    /// Email address (may be None if not shared)
    pub email: Option<String>,
    /// Display name from the Google profile
    pub display_name: Option<String>,
    /// Delegated Drive credential
    pub credential: Credential,
    /// When the user first signed in
    pub created_at: String,
    /// Most recent sign-in
    pub last_login: String,
}

/// Google OAuth token pair plus expiry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    /// Google only returns this on consent; later refreshes may omit it.
    pub refresh_token: Option<String>,
    /// When the access token expires. Unknown expiry counts as stale.
    pub expiry: Option<DateTime<Utc>>,
}

impl Credential {
    /// True if the access token is expired or within the staleness margin.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            None => true,
            Some(expiry) => expiry <= now + Duration::seconds(STALENESS_MARGIN_SECS),
        }
    }

    /// Merge a token response into this credential.
    ///
    /// A missing or empty refresh token never replaces the stored one.
    pub fn merge(
        &mut self,
        access_token: String,
        expiry: DateTime<Utc>,
        refresh_token: Option<String>,
    ) {
        self.access_token = access_token;
        self.expiry = Some(expiry);
        if let Some(token) = refresh_token.filter(|t| !t.is_empty()) {
            self.refresh_token = Some(token);
        }
    }
}
