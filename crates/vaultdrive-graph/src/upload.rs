//! Chunked upload sessions for Microsoft Graph (OneDrive)
//!
//! Every file goes through a resumable upload session, whatever its size:
//! - [`create_upload_session`] - `POST …:/createUploadSession`, returns the session URL
//! - [`upload_chunk`] - `PUT` one byte range to the session URL
//! - [`upload_file`] - drives a whole buffer through a session
//!
//! The buffer is split with [`chunk_ranges`] into consecutive ranges of at
//! most `chunk_size` bytes. Each chunk carries a `Content-Range` header built
//! by [`content_range`]. A response containing an item `id` completes the
//! upload; the response to the last range must contain one.
//!
//! ## Microsoft Graph API References
//!
//! - [Upload large files](https://learn.microsoft.com/en-us/graph/api/driveitem-createuploadsession)

use std::ops::Range;

use reqwest::{Client, Method};
use serde::Deserialize;
use tracing::{debug, info, warn};
use vaultdrive_core::domain::{DomainError, DriveError, RemoteItem};

use crate::client::{DriveItem, GraphClient};
use crate::retry::{with_retry, AttemptError};
use crate::{error_from_response, transport_error};

/// Default chunk size: 5 MiB (16 x 320 KiB)
///
/// Graph requires chunk sizes that are multiples of 320 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 5 * 1024 * 1024;

/// Body sent when creating a session: overwrite an existing item
const CONFLICT_REPLACE_BODY: &str = r#"{"item":{"@microsoft.graph.conflictBehavior":"replace"}}"#;

/// Response from creating an upload session
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadSessionResponse {
    upload_url: String,
}

// ============================================================================
// Chunk planning
// ============================================================================

/// Splits `total` bytes into consecutive ranges of at most `chunk_size`
///
/// The last range may be shorter. An empty buffer yields a single empty
/// range so that exactly one request is sent.
pub fn chunk_ranges(total: u64, chunk_size: u64) -> Vec<Range<u64>> {
    if total == 0 {
        return vec![0..0];
    }
    let chunk_size = chunk_size.max(1);

    let mut ranges = Vec::with_capacity(total.div_ceil(chunk_size) as usize);
    let mut start = 0;
    while start < total {
        let end = (start + chunk_size).min(total);
        ranges.push(start..end);
        start = end;
    }
    ranges
}

/// `Content-Range` header value for `range` out of `total` bytes
///
/// `bytes {start}-{end-1}/{total}`, or `bytes */0` for an empty file.
pub fn content_range(range: &Range<u64>, total: u64) -> String {
    if range.is_empty() {
        format!("bytes */{}", total)
    } else {
        format!("bytes {}-{}/{}", range.start, range.end - 1, total)
    }
}

// ============================================================================
// UploadSession state machine
// ============================================================================

/// Progress of one upload session
///
/// `SessionPending → Uploading → … → Completed`; `Failed` is reachable from
/// any non-terminal state. There are no backward transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadState {
    /// Session URL obtained, no chunk accepted yet
    SessionPending,
    /// Bytes `[0, next_offset)` accepted by the server
    Uploading { next_offset: u64 },
    Completed,
    Failed(String),
}

impl UploadState {
    fn label(&self) -> &'static str {
        match self {
            Self::SessionPending => "SessionPending",
            Self::Uploading { .. } => "Uploading",
            Self::Completed => "Completed",
            Self::Failed(_) => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }
}

/// One resumable upload, bound to a single file
#[derive(Debug)]
pub struct UploadSession {
    session_url: String,
    total_size: u64,
    state: UploadState,
}

impl UploadSession {
    pub fn new(session_url: impl Into<String>, total_size: u64) -> Self {
        Self {
            session_url: session_url.into(),
            total_size,
            state: UploadState::SessionPending,
        }
    }

    pub fn session_url(&self) -> &str {
        &self.session_url
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn state(&self) -> &UploadState {
        &self.state
    }

    /// Offset of the first byte not yet accepted by the server
    pub fn next_offset(&self) -> u64 {
        match self.state {
            UploadState::Uploading { next_offset } => next_offset,
            UploadState::Completed => self.total_size,
            _ => 0,
        }
    }

    /// Records that the server accepted `range`
    ///
    /// The range must start at [`next_offset`](Self::next_offset), stay
    /// within the file, and be non-empty unless the file itself is empty.
    pub fn record_chunk(&mut self, range: &Range<u64>) -> Result<(), DomainError> {
        if self.state.is_terminal() {
            return Err(self.invalid("Uploading"));
        }
        let expected = self.next_offset();
        let empty_ok = self.total_size == 0 && range.is_empty();
        if range.start != expected
            || range.end > self.total_size
            || (range.is_empty() && !empty_ok)
            || (empty_ok && matches!(self.state, UploadState::Uploading { .. }))
        {
            return Err(DomainError::ValidationFailed(format!(
                "chunk {}..{} does not continue at offset {} of {}",
                range.start, range.end, expected, self.total_size
            )));
        }

        self.state = UploadState::Uploading {
            next_offset: range.end,
        };
        Ok(())
    }

    /// Marks the session completed; every byte must have been accepted
    pub fn complete(&mut self) -> Result<(), DomainError> {
        match self.state {
            UploadState::Uploading { next_offset } if next_offset == self.total_size => {
                self.state = UploadState::Completed;
                Ok(())
            }
            _ => Err(self.invalid("Completed")),
        }
    }

    /// Marks the session failed
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), DomainError> {
        if self.state.is_terminal() {
            return Err(self.invalid("Failed"));
        }
        self.state = UploadState::Failed(reason.into());
        Ok(())
    }

    fn invalid(&self, to: &str) -> DomainError {
        DomainError::InvalidState {
            from: self.state.label().to_string(),
            to: to.to_string(),
        }
    }
}

// ============================================================================
// Protocol operations
// ============================================================================

/// Server verdict on one chunk
#[derive(Debug)]
pub enum ChunkOutcome {
    /// More bytes expected
    Accepted,
    /// The upload is complete and the item was created or replaced
    Completed(RemoteItem),
}

/// Creates an upload session for the item at `segments`, replacing any
/// existing item with the same name
///
/// Returns the pre-authenticated session URL.
pub async fn create_upload_session(
    client: &GraphClient,
    segments: &[&str],
) -> Result<String, DriveError> {
    let url = client.item_url(segments, Some("createUploadSession"))?;
    debug!(url = %url, "Creating upload session");

    let response = client
        .authorized(Method::POST, url)
        .await?
        .header("Content-Type", "application/json")
        .body(CONFLICT_REPLACE_BODY)
        .send()
        .await
        .map_err(transport_error)?;

    if !response.status().is_success() {
        return Err(error_from_response(response).await.error);
    }

    let session: UploadSessionResponse = response
        .json()
        .await
        .map_err(|e| DriveError::protocol(format!("malformed upload session response: {}", e)))?;

    Ok(session.upload_url)
}

/// Uploads one byte range to a session URL
///
/// The session URL is pre-authenticated, so no bearer header is sent.
/// `data` holds exactly the bytes of `range`.
pub async fn upload_chunk(
    http: &Client,
    session_url: &str,
    data: &[u8],
    range: &Range<u64>,
    total: u64,
) -> Result<ChunkOutcome, AttemptError> {
    let header = content_range(range, total);
    debug!(content_range = %header, bytes = data.len(), "Uploading chunk");

    let response = http
        .put(session_url)
        .header("Content-Range", &header)
        .body(data.to_vec())
        .send()
        .await
        .map_err(transport_error)?;

    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }

    let body = response.text().await.map_err(transport_error)?;
    let value: serde_json::Value = match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(_) if body.trim().is_empty() => return Ok(ChunkOutcome::Accepted),
        Err(e) => {
            return Err(DriveError::protocol(format!("malformed chunk response: {}", e)).into())
        }
    };

    if value.get("id").and_then(|id| id.as_str()).is_none() {
        return Ok(ChunkOutcome::Accepted);
    }

    let item: DriveItem = serde_json::from_value(value)
        .map_err(|e| DriveError::protocol(format!("malformed completed item: {}", e)))?;
    Ok(ChunkOutcome::Completed(item.into_remote_item()))
}

/// Uploads `data` to the item at `segments` through a fresh upload session
///
/// Transient chunk failures are retried with the client's retry policy;
/// authentication failures and other errors abort the upload.
pub async fn upload_file(
    client: &GraphClient,
    segments: &[&str],
    data: &[u8],
    chunk_size: usize,
) -> Result<RemoteItem, DriveError> {
    let total = data.len() as u64;
    let ranges = chunk_ranges(total, chunk_size as u64);
    let session_url = create_upload_session(client, segments).await?;
    let mut session = UploadSession::new(session_url, total);

    info!(
        bytes = total,
        chunks = ranges.len(),
        "Starting upload session"
    );

    let last = ranges.len() - 1;
    for (index, range) in ranges.iter().enumerate() {
        let chunk = &data[range.start as usize..range.end as usize];
        let outcome = with_retry(client.retry_policy(), "upload_chunk", || {
            upload_chunk(
                client.http_client(),
                session.session_url(),
                chunk,
                range,
                total,
            )
        })
        .await;

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(offset = range.start, error = %err, "Chunk upload failed");
                let _ = session.fail(err.to_string());
                return Err(err);
            }
        };

        session
            .record_chunk(range)
            .map_err(|e| DriveError::protocol(e.to_string()))?;

        match outcome {
            ChunkOutcome::Completed(item) => {
                if session.complete().is_err() {
                    let _ = session.fail("finalized early");
                    return Err(DriveError::protocol(format!(
                        "upload finalized early at offset {} of {}",
                        range.end, total
                    )));
                }
                info!(id = %item.id, bytes = total, "Upload completed");
                return Ok(item);
            }
            ChunkOutcome::Accepted if index == last => {
                let _ = session.fail("upload did not finalize");
                return Err(DriveError::protocol("upload did not finalize"));
            }
            ChunkOutcome::Accepted => {}
        }
    }

    Err(DriveError::protocol("upload did not finalize"))
}

// ============================================================================
// Tests
// ============================================================================
