//! VaultDrive Graph - Microsoft Graph adapter
//!
//! Provides the OneDrive side of VaultDrive:
//! - OAuth2 Authorization Code with PKCE (consent helper and token lifecycle)
//! - Folder listing, download, delete via Microsoft Graph
//! - Chunked, resumable upload sessions
//!
//! ## Modules
//!
//! - [`auth`] - PKCE consent helper, local callback server, keyring store
//! - [`token`] - [`token::TokenManager`], keeps an access token valid
//! - [`client`] - Microsoft Graph HTTP client
//! - [`upload`] - Chunk planning and the upload session state machine
//! - [`retry`] - Bounded exponential backoff for transient failures
//! - [`provider`] - [`provider::GraphRemoteDrive`], the `IRemoteDrive` implementation

pub mod auth;
pub mod client;
pub mod provider;
pub mod retry;
pub mod token;
pub mod upload;

use reqwest::{Response, StatusCode};
use vaultdrive_core::domain::DriveError;

use crate::retry::{parse_retry_after, AttemptError};

/// Maps a transport-level `reqwest` failure to [`DriveError::Network`]
pub(crate) fn transport_error(err: reqwest::Error) -> DriveError {
    DriveError::Network(err.to_string())
}

/// Turns a non-success response into an [`AttemptError`]
///
/// `401` becomes [`DriveError::Auth`]; any other status becomes a protocol
/// error carrying the status and the Graph error message when the body has
/// one. A `Retry-After` header is preserved for the retry loop.
pub(crate) async fn error_from_response(response: Response) -> AttemptError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);
    let body = response.text().await.unwrap_or_default();
    let message = graph_error_message(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string()
    });

    let error = if status == StatusCode::UNAUTHORIZED {
        DriveError::Auth(format!("remote rejected credentials: {}", message))
    } else {
        DriveError::http_status(status.as_u16(), message)
    };

    AttemptError { error, retry_after }
}

/// Extracts `error.message` (or `error.code`) from a Graph error body
fn graph_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    error
        .get("message")
        .or_else(|| error.get("code"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}
