//! Integration tests for chunked uploads through upload sessions

use vaultdrive_core::domain::DriveError;
use vaultdrive_core::ports::IRemoteDrive;
use wiremock::{
    matchers::{body_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use crate::common;

const MIB: usize = 1024 * 1024;

/// Mounts the createUploadSession endpoint for `Vault/{relative}` and returns
/// the session path the chunks must be PUT to
async fn mount_session(server: &MockServer, relative: &str) -> String {
    let session_path = "/upload/session-001".to_string();
    Mock::given(method("POST"))
        .and(path(format!(
            "/me/drive/root:/Vault/{}:/createUploadSession",
            relative
        )))
        .and(header(
            "authorization",
            format!("Bearer {}", common::ACCESS_TOKEN).as_str(),
        ))
        .and(body_json(serde_json::json!({
            "item": { "@microsoft.graph.conflictBehavior": "replace" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "uploadUrl": format!("{}{}", server.uri(), session_path),
            "expirationDateTime": "2026-01-15T12:00:00Z"
        })))
        .expect(1)
        .mount(server)
        .await;
    session_path
}

#[tokio::test]
async fn test_twelve_mib_upload_sends_three_exact_ranges() {
    let server = MockServer::start().await;
    let session = mount_session(&server, "big.bin").await;

    for range in ["bytes 0-5242879/12582912", "bytes 5242880-10485759/12582912"] {
        Mock::given(method("PUT"))
            .and(path(session.as_str()))
            .and(header("content-range", range))
            .respond_with(ResponseTemplate::new(202).set_body_json(common::accepted_json(0)))
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("PUT"))
        .and(path(session.as_str()))
        .and(header("content-range", "bytes 10485760-12582911/12582912"))
        .respond_with(ResponseTemplate::new(201).set_body_json(common::file_item_json(
            "item-big",
            "big.bin",
            "/Vault",
            12 * MIB as u64,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let data: Vec<u8> = (0..12 * MIB).map(|i| (i % 251) as u8).collect();
    let item = common::remote_drive(&server)
        .upload("big.bin", &data)
        .await
        .expect("upload failed");

    assert_eq!(item.id, "item-big");
    assert_eq!(item.path, Some("/Vault/big.bin".to_string()));
    assert_eq!(item.size, 12 * MIB as u64);

    // Chunks go to the pre-authenticated session URL without a bearer token
    let requests = server.received_requests().await.unwrap();
    let puts: Vec<_> = requests
        .iter()
        .filter(|r| r.method.as_str() == "PUT")
        .collect();
    assert_eq!(puts.len(), 3);
    assert!(puts.iter().all(|r| !r.headers.contains_key("authorization")));

    let mut reassembled = Vec::new();
    for put in &puts {
        reassembled.extend_from_slice(&put.body);
    }
    assert_eq!(reassembled, data);
}

#[tokio::test]
async fn test_small_chunk_size_splits_accordingly() {
    let server = MockServer::start().await;
    let session = mount_session(&server, "notes/a.md").await;

    Mock::given(method("PUT"))
        .and(path(session.as_str()))
        .and(header("content-range", "bytes 655360-716799/716800"))
        .respond_with(ResponseTemplate::new(201).set_body_json(common::file_item_json(
            "item-a",
            "a.md",
            "/Vault/notes",
            716_800,
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(session.as_str()))
        .respond_with(ResponseTemplate::new(202).set_body_json(common::accepted_json(0)))
        .expect(2)
        .mount(&server)
        .await;

    let drive = common::remote_drive(&server).with_chunk_size(320 * 1024);
    let item = drive.upload("notes/a.md", &vec![7u8; 716_800]).await.unwrap();
    assert_eq!(item.path, Some("/Vault/notes/a.md".to_string()));
}

#[tokio::test]
async fn test_empty_file_sends_single_star_range() {
    let server = MockServer::start().await;
    let session = mount_session(&server, "empty.md").await;

    Mock::given(method("PUT"))
        .and(path(session.as_str()))
        .and(header("content-range", "bytes */0"))
        .respond_with(ResponseTemplate::new(201).set_body_json(common::file_item_json(
            "item-empty",
            "empty.md",
            "/Vault",
            0,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let item = common::remote_drive(&server)
        .upload("empty.md", &[])
        .await
        .unwrap();
    assert_eq!(item.id, "item-empty");
    assert_eq!(item.size, 0);
}

#[tokio::test]
async fn test_final_chunk_without_item_is_not_finalized() {
    let server = MockServer::start().await;
    let session = mount_session(&server, "a.md").await;

    Mock::given(method("PUT"))
        .and(path(session.as_str()))
        .respond_with(ResponseTemplate::new(202).set_body_json(common::accepted_json(10)))
        .expect(1)
        .mount(&server)
        .await;

    let err = common::remote_drive(&server)
        .upload("a.md", b"0123456789")
        .await
        .unwrap_err();
    assert_eq!(err, DriveError::protocol("upload did not finalize"));
}

#[tokio::test]
async fn test_transient_chunk_failure_is_retried() {
    let server = MockServer::start().await;
    let session = mount_session(&server, "a.md").await;

    Mock::given(method("PUT"))
        .and(path(session.as_str()))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(session.as_str()))
        .and(header("content-range", "bytes 0-9/10"))
        .respond_with(ResponseTemplate::new(201).set_body_json(common::file_item_json(
            "item-a", "a.md", "/Vault", 10,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let item = common::remote_drive(&server)
        .upload("a.md", b"0123456789")
        .await
        .unwrap();
    assert_eq!(item.id, "item-a");
}

#[tokio::test]
async fn test_throttled_chunk_honours_retry_after() {
    let server = MockServer::start().await;
    let session = mount_session(&server, "a.md").await;

    Mock::given(method("PUT"))
        .and(path(session.as_str()))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(session.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::file_item_json(
            "item-a", "a.md", "/Vault", 3,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let item = common::remote_drive(&server)
        .upload("a.md", b"abc")
        .await
        .unwrap();
    assert_eq!(item.id, "item-a");
}

#[tokio::test]
async fn test_persistent_server_error_gives_up() {
    let server = MockServer::start().await;
    let session = mount_session(&server, "a.md").await;

    // first attempt + 2 retries from the fast retry policy
    Mock::given(method("PUT"))
        .and(path(session.as_str()))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let err = common::remote_drive(&server)
        .upload("a.md", b"abc")
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(500));
}

#[tokio::test]
async fn test_unauthorized_chunk_is_auth_and_not_retried() {
    let server = MockServer::start().await;
    let session = mount_session(&server, "a.md").await;

    Mock::given(method("PUT"))
        .and(path(session.as_str()))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": { "code": "unauthenticated", "message": "session expired" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = common::remote_drive(&server)
        .upload("a.md", b"abc")
        .await
        .unwrap_err();
    assert!(err.is_auth());
}

#[tokio::test]
async fn test_client_error_chunk_aborts_with_status() {
    let server = MockServer::start().await;
    let session = mount_session(&server, "a.md").await;

    Mock::given(method("PUT"))
        .and(path(session.as_str()))
        .respond_with(ResponseTemplate::new(416).set_body_json(serde_json::json!({
            "error": { "code": "invalidRange", "message": "range not satisfiable" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = common::remote_drive(&server)
        .upload("a.md", b"abc")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        DriveError::http_status(416, "range not satisfiable")
    );
}

#[tokio::test]
async fn test_session_creation_failure_sends_no_chunks() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/me/drive/root:/Vault/a.md:/createUploadSession"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "error": { "code": "accessDenied", "message": "Access denied" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let err = common::remote_drive(&server)
        .upload("a.md", b"abc")
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(403));
}

#[tokio::test]
async fn test_upload_refreshes_expiring_token_first() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(common::TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token_type": "Bearer",
            "expires_in": 3600,
            "access_token": common::ACCESS_TOKEN
        })))
        .expect(1)
        .mount(&server)
        .await;
    let session = mount_session(&server, "a.md").await;
    Mock::given(method("PUT"))
        .and(path(session.as_str()))
        .respond_with(ResponseTemplate::new(201).set_body_json(common::file_item_json(
            "item-a", "a.md", "/Vault", 3,
        )))
        .mount(&server)
        .await;

    let (tokens, _store) = common::token_manager(&server, Some(common::expiring_credential()));
    let drive = vaultdrive_graph::provider::GraphRemoteDrive::new(
        common::graph_client(&server, tokens),
        "Vault",
    );

    let item = drive.upload("a.md", b"abc").await.unwrap();
    assert_eq!(item.id, "item-a");
}
