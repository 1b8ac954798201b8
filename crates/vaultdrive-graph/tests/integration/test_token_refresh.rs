//! Integration tests for the token manager against a mock token endpoint

use std::sync::Arc;

use vaultdrive_core::domain::DriveError;
use wiremock::{
    matchers::{body_string_contains, method, path},
    Mock, MockServer, ResponseTemplate,
};

use crate::common::{self, REFRESH_TOKEN, TOKEN_PATH};

fn refreshed_body(refresh_token: Option<&str>) -> serde_json::Value {
    let mut body = serde_json::json!({
        "token_type": "Bearer",
        "expires_in": 3600,
        "scope": "Files.ReadWrite offline_access",
        "access_token": "new-access-token"
    });
    if let Some(refresh_token) = refresh_token {
        body["refresh_token"] = serde_json::json!(refresh_token);
    }
    body
}

#[tokio::test]
async fn test_valid_token_makes_no_refresh_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(refreshed_body(None)))
        .expect(0)
        .mount(&server)
        .await;

    let (tokens, _store) = common::token_manager(&server, Some(common::fresh_credential()));

    for _ in 0..3 {
        let token = tokens.get_valid_access_token().await.unwrap();
        assert_eq!(token, common::ACCESS_TOKEN);
    }
}

#[tokio::test]
async fn test_expiring_token_refreshes_exactly_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains(format!("refresh_token={}", REFRESH_TOKEN)))
        .and(body_string_contains(format!("client_id={}", common::CLIENT_ID)))
        .and(body_string_contains("scope=Files.ReadWrite+offline_access"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(refreshed_body(Some("rotated-refresh"))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (tokens, store) = common::token_manager(&server, Some(common::expiring_credential()));

    assert_eq!(
        tokens.get_valid_access_token().await.unwrap(),
        "new-access-token"
    );
    // Second call is served from the refreshed credential
    assert_eq!(
        tokens.get_valid_access_token().await.unwrap(),
        "new-access-token"
    );

    let persisted = store.current().expect("credential persisted");
    assert_eq!(persisted.access_token, "new-access-token");
    assert_eq!(persisted.refresh_token, "rotated-refresh");
    assert!(persisted.access_token_expires_at > chrono::Utc::now() + chrono::Duration::minutes(55));
}

#[tokio::test]
async fn test_concurrent_callers_share_one_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(refreshed_body(None))
                .set_delay(std::time::Duration::from_millis(50)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (tokens, _store) = common::token_manager(&server, Some(common::expiring_credential()));

    let mut handles = Vec::new();
    for _ in 0..5 {
        let tokens = Arc::clone(&tokens);
        handles.push(tokio::spawn(async move {
            tokens.get_valid_access_token().await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), "new-access-token");
    }
}

#[tokio::test]
async fn test_missing_refresh_token_in_response_keeps_previous() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(refreshed_body(None)))
        .expect(1)
        .mount(&server)
        .await;

    let (tokens, _store) = common::token_manager(&server, Some(common::expiring_credential()));
    tokens.get_valid_access_token().await.unwrap();

    let credential = tokens.credential().await.unwrap();
    assert_eq!(credential.access_token, "new-access-token");
    assert_eq!(credential.refresh_token, REFRESH_TOKEN);
}

#[tokio::test]
async fn test_error_response_is_auth_and_leaves_credential_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "AADSTS70008: The refresh token has expired.",
            "error_codes": [70008],
            "timestamp": "2026-01-15 10:00:00Z",
            "trace_id": "trace",
            "correlation_id": "corr"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let original = common::expiring_credential();
    let (tokens, store) = common::token_manager(&server, Some(original.clone()));

    let err = tokens.get_valid_access_token().await.unwrap_err();
    assert_eq!(
        err,
        DriveError::Auth(
            "invalid_grant: AADSTS70008: The refresh token has expired.".to_string()
        )
    );
    assert_eq!(tokens.credential().await, Some(original.clone()));
    assert_eq!(store.current(), Some(original));
}

#[tokio::test]
async fn test_error_field_with_success_status_is_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "error": "interaction_required",
            "error_description": "consent revoked"
        })))
        .mount(&server)
        .await;

    let original = common::expiring_credential();
    let (tokens, _store) = common::token_manager(&server, Some(original.clone()));

    assert!(tokens.get_valid_access_token().await.unwrap_err().is_auth());
    assert_eq!(tokens.credential().await, Some(original));
}

#[tokio::test]
async fn test_server_error_without_error_field_is_auth_with_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let (tokens, _store) = common::token_manager(&server, Some(common::expiring_credential()));

    let err = tokens.get_valid_access_token().await.unwrap_err();
    assert_eq!(
        err,
        DriveError::Auth("token endpoint returned HTTP 503".to_string())
    );
}

#[tokio::test]
async fn test_no_credential_fails_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(refreshed_body(None)))
        .expect(0)
        .mount(&server)
        .await;

    let (tokens, _store) = common::token_manager(&server, None);
    assert!(tokens.get_valid_access_token().await.unwrap_err().is_auth());
}

#[tokio::test]
async fn test_initial_exchange_posts_code_and_verifier() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=auth-code-123"))
        .and(body_string_contains("code_verifier=verifier-xyz"))
        .and(body_string_contains(
            "redirect_uri=http%3A%2F%2F127.0.0.1%3A8400%2Fcallback",
        ))
        .and(body_string_contains(format!("client_id={}", common::CLIENT_ID)))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(refreshed_body(Some("first-refresh"))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (tokens, store) = common::token_manager(&server, None);
    let credential = tokens
        .initial_exchange("auth-code-123", "verifier-xyz")
        .await
        .unwrap();

    assert_eq!(credential.access_token, "new-access-token");
    assert_eq!(credential.refresh_token, "first-refresh");
    assert!(tokens.has_usable_credential().await);
    assert_eq!(store.current(), Some(credential));
}

#[tokio::test]
async fn test_initial_exchange_rejected_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "code already redeemed"
        })))
        .mount(&server)
        .await;

    let (tokens, store) = common::token_manager(&server, None);
    let err = tokens
        .initial_exchange("used-code", "verifier")
        .await
        .unwrap_err();

    assert!(err.is_auth());
    assert!(tokens.credential().await.is_none());
    assert!(store.current().is_none());
}
