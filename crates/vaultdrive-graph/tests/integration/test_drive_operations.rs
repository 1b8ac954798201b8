//! Integration tests for listing, deleting and reading remote items

use std::sync::{Arc, Mutex};

use vaultdrive_core::domain::DriveError;
use vaultdrive_core::ports::IRemoteDrive;
use wiremock::{
    matchers::{header, method, path, query_param},
    Mock, MockServer, Request, Respond, ResponseTemplate,
};

use crate::common;

const SELECT: &str = "id,name,size,@microsoft.graph.downloadUrl";

// ============================================================================
// list_folder
// ============================================================================

#[tokio::test]
async fn test_list_root_folder() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/drive/root/children"))
        .and(header(
            "authorization",
            format!("Bearer {}", common::ACCESS_TOKEN).as_str(),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [
                common::folder_item_json("folder-vault", "Vault", ""),
                common::file_item_json("file-readme", "readme.md", "", 512)
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let items = common::remote_drive(&server).list_folder("").await.unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].name, "Vault");
    assert!(items[0].is_folder);
    assert_eq!(items[0].path, Some("/Vault".to_string()));
    assert_eq!(items[1].name, "readme.md");
    assert_eq!(items[1].size, 512);
    assert!(items[1].is_file());
}

#[tokio::test]
async fn test_list_nested_folder() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/drive/root:/Vault/Notas:/children"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [common::file_item_json("file-1", "test.md", "/Vault/Notas", 42)]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let items = common::remote_drive(&server)
        .list_folder("/Vault/Notas/")
        .await
        .unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].path, Some("/Vault/Notas/test.md".to_string()));
}

#[tokio::test]
async fn test_list_follows_next_link() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/drive/root:/Vault:/children"))
        .and(query_param("$skiptoken", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [common::file_item_json("file-2", "b.md", "/Vault", 2)]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me/drive/root:/Vault:/children"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [common::file_item_json("file-1", "a.md", "/Vault", 1)],
            "@odata.nextLink": format!(
                "{}/me/drive/root:/Vault:/children?$skiptoken=page2",
                server.uri()
            )
        })))
        .expect(1)
        .mount(&server)
        .await;

    let items = common::remote_drive(&server)
        .list_folder("Vault")
        .await
        .unwrap();
    let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["a.md", "b.md"]);
}

#[tokio::test]
async fn test_list_missing_folder_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/drive/root:/Nope:/children"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": { "code": "itemNotFound", "message": "Item not found" }
        })))
        .mount(&server)
        .await;

    let err = common::remote_drive(&server)
        .list_folder("Nope")
        .await
        .unwrap_err();
    assert_eq!(err, DriveError::http_status(404, "Item not found"));
}

#[tokio::test]
async fn test_list_unauthorized_is_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/drive/root/children"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": {
                "code": "InvalidAuthenticationToken",
                "message": "Access token has expired"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = common::remote_drive(&server)
        .list_folder("")
        .await
        .unwrap_err();
    assert!(err.is_auth());
}

#[tokio::test]
async fn test_operations_without_credential_make_no_calls() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (tokens, _store) = common::token_manager(&server, None);
    let drive = vaultdrive_graph::provider::GraphRemoteDrive::new(
        common::graph_client(&server, tokens),
        "Vault",
    );

    assert!(!drive.has_credentials().await);
    assert!(drive.list_folder("").await.unwrap_err().is_auth());
    assert!(drive.read_file("a.md").await.unwrap_err().is_auth());
}

// ============================================================================
// delete
// ============================================================================

#[tokio::test]
async fn test_delete_item() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/me/drive/root:/Vault/Notas/test.md"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    common::remote_drive(&server)
        .delete("Notas/test.md")
        .await
        .expect("delete failed");
}

#[tokio::test]
async fn test_delete_missing_item_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/me/drive/root:/Vault/gone.md"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = common::remote_drive(&server)
        .delete("gone.md")
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn test_delete_never_targets_base_folder() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let drive = common::remote_drive(&server);
    for target in ["", "/", "//"] {
        let err = drive.delete(target).await.unwrap_err();
        assert!(matches!(err, DriveError::Protocol { .. }), "{target:?}");
    }
    assert!(server.received_requests().await.unwrap().is_empty());
}

// ============================================================================
// read_file
// ============================================================================

#[tokio::test]
async fn test_read_file_follows_download_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/drive/root:/Vault/Notas/test.md"))
        .and(query_param("select", SELECT))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "file-1",
            "name": "test.md",
            "size": 13,
            "@microsoft.graph.downloadUrl": format!("{}/download/file-1", server.uri())
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/download/file-1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"# Hello vault".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let data = common::remote_drive(&server)
        .read_file("Notas/test.md")
        .await
        .unwrap();
    assert_eq!(data, b"# Hello vault");

    let requests = server.received_requests().await.unwrap();
    let download = requests
        .iter()
        .find(|r| r.url.path() == "/download/file-1")
        .unwrap();
    assert!(!download.headers.contains_key("authorization"));
}

#[tokio::test]
async fn test_read_file_accepts_plain_download_url_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/drive/root:/Vault/a.md"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "file-a",
            "downloadUrl": format!("{}/download/a", server.uri())
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/download/a"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"a".to_vec()))
        .mount(&server)
        .await;

    let data = common::remote_drive(&server).read_file("a.md").await.unwrap();
    assert_eq!(data, b"a");
}

#[tokio::test]
async fn test_read_file_without_download_url_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/drive/root:/Vault/folder"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "folder-1",
            "name": "folder"
        })))
        .mount(&server)
        .await;

    let err = common::remote_drive(&server)
        .read_file("folder")
        .await
        .unwrap_err();
    assert_eq!(err, DriveError::protocol("item metadata has no download URL"));
}

// ============================================================================
// upload → read_file round trip
// ============================================================================

/// In-memory stand-in for one remote file, fed by upload chunks
#[derive(Clone, Default)]
struct FakeRemoteFile {
    content: Arc<Mutex<Vec<u8>>>,
}

/// Appends each chunk and finalizes when the last byte arrives
struct ChunkSink(FakeRemoteFile);

impl Respond for ChunkSink {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let range = request
            .headers
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let mut content = self.0.content.lock().unwrap();
        content.extend_from_slice(&request.body);

        let total: usize = range
            .rsplit('/')
            .next()
            .and_then(|t| t.parse().ok())
            .unwrap_or(0);
        if content.len() >= total {
            ResponseTemplate::new(201).set_body_json(common::file_item_json(
                "round-trip",
                "data.bin",
                "/Vault/deep",
                total as u64,
            ))
        } else {
            ResponseTemplate::new(202).set_body_json(common::accepted_json(content.len() as u64))
        }
    }
}

/// Serves whatever the sink collected
struct ContentSource(FakeRemoteFile);

impl Respond for ContentSource {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let content = self.0.content.lock().unwrap().clone();
        ResponseTemplate::new(200).set_body_bytes(content)
    }
}

#[tokio::test]
async fn test_upload_then_read_returns_identical_bytes() {
    let server = MockServer::start().await;
    let remote = FakeRemoteFile::default();

    Mock::given(method("POST"))
        .and(path("/me/drive/root:/Vault/deep/data.bin:/createUploadSession"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "uploadUrl": format!("{}/upload/rt", server.uri())
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload/rt"))
        .respond_with(ChunkSink(remote.clone()))
        .expect(4)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me/drive/root:/Vault/deep/data.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "@microsoft.graph.downloadUrl": format!("{}/download/rt", server.uri())
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/download/rt"))
        .respond_with(ContentSource(remote.clone()))
        .mount(&server)
        .await;

    let drive = common::remote_drive(&server).with_chunk_size(320 * 1024);
    let data: Vec<u8> = (0..1_000_000u32).map(|i| (i * 31 % 256) as u8).collect();

    let item = drive.upload("deep/data.bin", &data).await.unwrap();
    assert_eq!(item.id, "round-trip");

    let read_back = drive.read_file("deep/data.bin").await.unwrap();
    assert_eq!(read_back, data);
}
