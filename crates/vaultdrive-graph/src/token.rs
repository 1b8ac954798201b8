//! Credential lifecycle manager
//!
//! [`TokenManager`] owns the process-wide [`Credential`] and hands out a
//! valid access token on demand. It never performs interactive sign-in:
//! when the refresh token is missing, rejected, or older than the
//! re-authentication ceiling, callers receive [`DriveError::Auth`] and the
//! host has to run the consent flow again.
//!
//! ## Refresh protocol
//!
//! The cached access token is used until `expires_at - safety_margin`. After
//! that the manager posts `grant_type=refresh_token` to the token endpoint
//! while holding the credential lock, so concurrent callers see at most one
//! refresh per expiry. A successful response replaces the credential as a
//! whole and is persisted through [`ICredentialStore::save`].

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use vaultdrive_core::config::AuthConfig;
use vaultdrive_core::domain::{Credential, DriveError};
use vaultdrive_core::ports::ICredentialStore;

use crate::transport_error;

/// Access token lifetime assumed when the server omits `expires_in`
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Upper bound on a server-reported access token lifetime
const MAX_EXPIRES_IN_SECS: i64 = 24 * 60 * 60;

/// Static parameters of the token endpoint conversation
#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub client_id: String,
    /// Full token endpoint URL, e.g. `{authority}/oauth2/v2.0/token`
    pub token_url: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// Buffer subtracted from the nominal access token expiry
    pub safety_margin: Duration,
    /// Maximum age of a refresh token before re-consent is forced
    pub reauth_ceiling: Duration,
}

impl TokenSettings {
    /// Builds settings from the `auth` config section
    ///
    /// Fails when no `client_id` is configured.
    pub fn from_config(config: &AuthConfig) -> anyhow::Result<Self> {
        let client_id = config
            .client_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("auth.client_id is not configured"))?;

        Ok(Self {
            client_id,
            token_url: config.token_url(),
            redirect_uri: config.redirect_uri.clone(),
            scopes: config.scopes.clone(),
            safety_margin: Duration::seconds(config.safety_margin_secs as i64),
            reauth_ceiling: Duration::days(config.reauth_ceiling_days as i64),
        })
    }

    /// Scopes joined with spaces, as the token endpoint expects them
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }
}

/// Body of a token endpoint response, success or failure
#[derive(Debug, Default, Deserialize)]
pub struct TokenEndpointResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Builds the credential that results from a token endpoint response
///
/// A response carrying `error` yields [`DriveError::Auth`]. When the server
/// does not rotate the refresh token, `previous_refresh_token` is kept.
pub fn credential_from_grant(
    response: TokenEndpointResponse,
    previous_refresh_token: Option<&str>,
    now: DateTime<Utc>,
    reauth_ceiling: Duration,
) -> Result<Credential, DriveError> {
    if let Some(error) = response.error {
        let description = response.error_description.unwrap_or_default();
        return Err(DriveError::Auth(format!("{}: {}", error, description)));
    }

    let access_token = response
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| DriveError::protocol("token response is missing access_token"))?;

    let refresh_token = response
        .refresh_token
        .filter(|t| !t.is_empty())
        .or_else(|| previous_refresh_token.map(|t| t.to_string()))
        .unwrap_or_default();

    let expires_in = Duration::seconds(
        response
            .expires_in
            .unwrap_or(DEFAULT_EXPIRES_IN_SECS)
            .clamp(0, MAX_EXPIRES_IN_SECS),
    );

    Ok(Credential::issued(
        access_token,
        refresh_token,
        expires_in,
        reauth_ceiling,
        now,
    ))
}

/// Keeps an access token valid for unattended remote calls
pub struct TokenManager {
    http: Client,
    settings: TokenSettings,
    store: Arc<dyn ICredentialStore>,
    credential: Mutex<Option<Credential>>,
}

impl TokenManager {
    /// Creates a manager and loads any persisted credential from `store`
    pub fn new(settings: TokenSettings, store: Arc<dyn ICredentialStore>) -> Self {
        let credential = match store.load() {
            Ok(credential) => credential,
            Err(e) => {
                warn!(error = %e, "Failed to load persisted credential");
                None
            }
        };
        debug!(
            has_credential = credential.is_some(),
            "Token manager initialized"
        );

        Self {
            http: Client::new(),
            settings,
            store,
            credential: Mutex::new(credential),
        }
    }

    /// Replaces the HTTP client used to reach the token endpoint
    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn settings(&self) -> &TokenSettings {
        &self.settings
    }

    /// Returns a copy of the current credential
    pub async fn credential(&self) -> Option<Credential> {
        self.credential.lock().await.clone()
    }

    /// True if both an access and a refresh token are held
    pub async fn has_usable_credential(&self) -> bool {
        self.credential
            .lock()
            .await
            .as_ref()
            .is_some_and(Credential::is_usable)
    }

    /// Installs a credential obtained elsewhere and persists it
    pub async fn restore(&self, credential: Credential) {
        let mut guard = self.credential.lock().await;
        self.persist(&credential);
        *guard = Some(credential);
    }

    /// Returns an access token that is valid for at least the safety margin
    ///
    /// Refreshes through the token endpoint when the cached token is expired
    /// or about to expire. Never blocks on user interaction.
    pub async fn get_valid_access_token(&self) -> Result<String, DriveError> {
        let mut guard = self.credential.lock().await;
        let now = Utc::now();

        let current = match guard.as_ref() {
            Some(current) if current.is_access_token_valid(now, self.settings.safety_margin) => {
                return Ok(current.access_token.clone());
            }
            Some(current) if current.has_refresh_token() => current,
            _ => {
                return Err(DriveError::Auth(
                    "no refresh token, re-authentication required".to_string(),
                ))
            }
        };

        if current.requires_reauth(now) {
            warn!(
                force_reauth_at = %current.force_reauth_at,
                "Refresh token exceeded its maximum age"
            );
            return Err(DriveError::Auth(
                "refresh token expired, re-authentication required".to_string(),
            ));
        }

        debug!(
            expires_at = %current.access_token_expires_at,
            "Access token expired or near expiry, refreshing"
        );

        let scope = self.settings.scope_string();
        let previous_refresh = current.refresh_token.clone();
        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", self.settings.client_id.as_str()),
            ("scope", scope.as_str()),
            ("refresh_token", previous_refresh.as_str()),
        ];
        let refreshed = self.request_token(&form, Some(&previous_refresh)).await?;

        self.persist(&refreshed);
        let access_token = refreshed.access_token.clone();
        *guard = Some(refreshed);

        info!("Access token refreshed");
        Ok(access_token)
    }

    /// Exchanges an authorization code (plus PKCE verifier) for a credential
    pub async fn initial_exchange(
        &self,
        auth_code: &str,
        pkce_verifier: &str,
    ) -> Result<Credential, DriveError> {
        info!("Exchanging authorization code for tokens");

        let scope = self.settings.scope_string();
        let form = [
            ("grant_type", "authorization_code"),
            ("code", auth_code),
            ("code_verifier", pkce_verifier),
            ("redirect_uri", self.settings.redirect_uri.as_str()),
            ("client_id", self.settings.client_id.as_str()),
            ("scope", scope.as_str()),
        ];

        let mut guard = self.credential.lock().await;
        let credential = self.request_token(&form, None).await?;
        self.persist(&credential);
        *guard = Some(credential.clone());

        info!("Obtained OAuth tokens");
        Ok(credential)
    }

    /// Forgets the credential in memory and in the store
    pub async fn disconnect(&self) {
        let mut guard = self.credential.lock().await;
        *guard = None;
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear persisted credential");
        }
        info!("Disconnected, credential cleared");
    }

    /// Posts `form` to the token endpoint and parses the outcome
    async fn request_token(
        &self,
        form: &[(&str, &str)],
        previous_refresh_token: Option<&str>,
    ) -> Result<Credential, DriveError> {
        let response = self
            .http
            .post(&self.settings.token_url)
            .form(form)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        let parsed = serde_json::from_str::<TokenEndpointResponse>(&body);

        match parsed {
            Ok(parsed) if parsed.error.is_some() || status.is_success() => {
                if let Some(error) = &parsed.error {
                    warn!(
                        status = status.as_u16(),
                        error = %error,
                        "Token endpoint rejected the request"
                    );
                }
                credential_from_grant(
                    parsed,
                    previous_refresh_token,
                    Utc::now(),
                    self.settings.reauth_ceiling,
                )
            }
            _ if !status.is_success() => Err(DriveError::Auth(format!(
                "token endpoint returned HTTP {}",
                status.as_u16()
            ))),
            _ => Err(DriveError::protocol("malformed token endpoint response")),
        }
    }

    fn persist(&self, credential: &Credential) {
        if let Err(e) = self.store.save(credential) {
            warn!(error = %e, "Failed to persist credential");
        }
    }
}
