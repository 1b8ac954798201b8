//! OAuth credential snapshot
//!
//! A [`Credential`] is a plain value: the token manager builds a new one on
//! every successful exchange or refresh and replaces the previous one as a
//! whole. Nothing mutates a credential in place.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// OAuth tokens plus the instants that bound their usefulness
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Bearer token for authenticating API requests
    pub access_token: String,
    /// Token for refreshing the access token without user interaction
    pub refresh_token: String,
    /// Nominal expiry of the access token as reported by the server
    pub access_token_expires_at: DateTime<Utc>,
    /// Hard ceiling after which the refresh token is treated as stale and
    /// the user has to consent again
    pub force_reauth_at: DateTime<Utc>,
}

impl Credential {
    /// Creates a credential from freshly granted tokens
    ///
    /// # Arguments
    /// * `access_token` - Bearer token
    /// * `refresh_token` - Refresh token (may be empty if none was granted)
    /// * `expires_in` - Access token lifetime reported by the server
    /// * `reauth_ceiling` - How long the refresh token may be used before
    ///   re-consent is forced
    /// * `now` - Issue instant
    pub fn issued(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_in: Duration,
        reauth_ceiling: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            access_token_expires_at: now + expires_in,
            force_reauth_at: now + reauth_ceiling,
        }
    }

    /// Returns true if both token fields are non-empty
    pub fn is_usable(&self) -> bool {
        !self.access_token.is_empty() && !self.refresh_token.is_empty()
    }

    /// Returns true if the access token can still be sent at `now`
    ///
    /// The token is considered invalid from `access_token_expires_at -
    /// safety_margin` onwards so that it never expires mid-request.
    pub fn is_access_token_valid(&self, now: DateTime<Utc>, safety_margin: Duration) -> bool {
        !self.access_token.is_empty() && now < self.access_token_expires_at - safety_margin
    }

    /// Returns true if a refresh token is available
    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }

    /// Returns true once the hard re-authentication ceiling has passed
    pub fn requires_reauth(&self, now: DateTime<Utc>) -> bool {
        now >= self.force_reauth_at
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("access_token_expires_at", &self.access_token_expires_at)
            .field("force_reauth_at", &self.force_reauth_at)
            .finish()
    }
}
