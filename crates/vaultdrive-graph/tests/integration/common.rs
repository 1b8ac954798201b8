//! Shared test helpers for Graph API integration tests
//!
//! Builds a token manager, Graph client and remote drive that all point at a
//! wiremock server, plus canned JSON payloads.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use vaultdrive_core::domain::Credential;
use vaultdrive_core::ports::InMemoryCredentialStore;
use vaultdrive_graph::client::GraphClient;
use vaultdrive_graph::provider::GraphRemoteDrive;
use vaultdrive_graph::retry::RetryPolicy;
use vaultdrive_graph::token::{TokenManager, TokenSettings};
use wiremock::MockServer;

pub const ACCESS_TOKEN: &str = "test-access-token";
pub const REFRESH_TOKEN: &str = "test-refresh-token";
pub const CLIENT_ID: &str = "test-client-id";
pub const TOKEN_PATH: &str = "/consumers/oauth2/v2.0/token";

pub fn settings(server: &MockServer) -> TokenSettings {
    TokenSettings {
        client_id: CLIENT_ID.to_string(),
        token_url: format!("{}{}", server.uri(), TOKEN_PATH),
        redirect_uri: "http://127.0.0.1:8400/callback".to_string(),
        scopes: vec!["Files.ReadWrite".to_string(), "offline_access".to_string()],
        safety_margin: chrono::Duration::minutes(2),
        reauth_ceiling: chrono::Duration::days(80),
    }
}

/// Credential whose access token is valid for another hour
pub fn fresh_credential() -> Credential {
    Credential::issued(
        ACCESS_TOKEN,
        REFRESH_TOKEN,
        chrono::Duration::hours(1),
        chrono::Duration::days(80),
        Utc::now(),
    )
}

/// Credential whose access token sits inside the safety margin
pub fn expiring_credential() -> Credential {
    Credential::issued(
        "stale-access-token",
        REFRESH_TOKEN,
        chrono::Duration::seconds(60),
        chrono::Duration::days(80),
        Utc::now(),
    )
}

pub fn token_manager(
    server: &MockServer,
    credential: Option<Credential>,
) -> (Arc<TokenManager>, Arc<InMemoryCredentialStore>) {
    let store = Arc::new(match credential {
        Some(credential) => InMemoryCredentialStore::with_credential(credential),
        None => InMemoryCredentialStore::new(),
    });
    let manager = Arc::new(TokenManager::new(settings(server), store.clone()));
    (manager, store)
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        backoff_multiplier: 2.0,
    }
}

pub fn graph_client(server: &MockServer, tokens: Arc<TokenManager>) -> GraphClient {
    GraphClient::new(tokens, format!("{}/me", server.uri())).with_retry_policy(fast_retry())
}

/// Remote drive rooted at `Vault` with a fresh credential
pub fn remote_drive(server: &MockServer) -> GraphRemoteDrive {
    let (tokens, _store) = token_manager(server, Some(fresh_credential()));
    GraphRemoteDrive::new(graph_client(server, tokens), "Vault")
}

/// A `driveItem` JSON body for a file under `/drive/root:{parent}`
pub fn file_item_json(id: &str, name: &str, parent: &str, size: u64) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "size": size,
        "lastModifiedDateTime": "2026-01-15T10:00:00Z",
        "parentReference": {
            "driveId": "drive-test-001",
            "path": format!("/drive/root:{}", parent)
        },
        "file": { "mimeType": "application/octet-stream" }
    })
}

pub fn folder_item_json(id: &str, name: &str, parent: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "size": 0,
        "parentReference": { "path": format!("/drive/root:{}", parent) },
        "folder": { "childCount": 1 }
    })
}

/// Intermediate chunk acknowledgement (no item id)
pub fn accepted_json(next: u64) -> serde_json::Value {
    serde_json::json!({
        "expirationDateTime": "2026-01-15T12:00:00Z",
        "nextExpectedRanges": [format!("{}-", next)]
    })
}
