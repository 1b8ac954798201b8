//! Microsoft Graph API client
//!
//! Builds drive item URLs, attaches a bearer token obtained from the
//! [`TokenManager`] to every API call, and parses `driveItem` payloads into
//! [`RemoteItem`]s.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vaultdrive_graph::client::GraphClient;
//! use vaultdrive_graph::token::TokenManager;
//!
//! # async fn example(tokens: Arc<TokenManager>) -> Result<(), vaultdrive_core::domain::DriveError> {
//! let client = GraphClient::new(tokens, "https://graph.microsoft.com/v1.0/me");
//! for item in client.list_children(&["Vault"]).await? {
//!     println!("{}", item.name);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Upload session and download URLs returned by Graph are pre-authenticated;
//! requests to them go through [`GraphClient::http_client`] without a bearer
//! header.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use tracing::debug;
use url::Url;
use vaultdrive_core::config::{RemoteConfig, RetryConfig};
use vaultdrive_core::domain::{DriveError, RemoteItem};

use crate::retry::RetryPolicy;
use crate::token::TokenManager;
use crate::{error_from_response, transport_error};

/// Default Microsoft Graph drive API root
pub const GRAPH_API_ROOT: &str = "https://graph.microsoft.com/v1.0/me";

// ============================================================================
// Graph API response types
// ============================================================================

/// A `driveItem` as returned by listing, upload completion and metadata calls
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DriveItem {
    pub id: String,
    pub name: String,
    pub size: Option<u64>,
    pub parent_reference: Option<ParentReference>,
    /// Present if the item is a folder
    pub folder: Option<serde_json::Value>,
}

/// Parent folder reference in a `driveItem`
#[derive(Debug, Deserialize)]
pub(crate) struct ParentReference {
    /// Full path of the parent folder (e.g., "/drive/root:/Vault")
    pub path: Option<String>,
}

/// Page of children returned by `GET .../children`
#[derive(Debug, Deserialize)]
struct ChildrenResponse {
    value: Vec<DriveItem>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

/// Metadata selected for downloads
#[derive(Debug, Deserialize)]
struct DownloadMetadata {
    #[serde(rename = "@microsoft.graph.downloadUrl")]
    graph_download_url: Option<String>,
    #[serde(rename = "downloadUrl")]
    download_url: Option<String>,
}

impl DriveItem {
    /// Converts into the provider-agnostic [`RemoteItem`]
    ///
    /// The path is built from `parentReference.path` with the
    /// `/drive/root:` prefix stripped, joined with the item name.
    pub(crate) fn into_remote_item(self) -> RemoteItem {
        let path = self
            .parent_reference
            .as_ref()
            .and_then(|pr| pr.path.as_deref())
            .map(|p| {
                let parent = p
                    .find("root:")
                    .map(|idx| &p[idx + "root:".len()..])
                    .unwrap_or(p)
                    .trim_end_matches('/');
                format!("{}/{}", parent, self.name)
            });

        RemoteItem {
            id: self.id,
            name: self.name,
            path,
            size: self.size.unwrap_or(0),
            is_folder: self.folder.is_some(),
        }
    }
}

// ============================================================================
// Path helpers
// ============================================================================

/// Splits a `/`-separated drive path into its non-empty segments
pub fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

// ============================================================================
// GraphClient
// ============================================================================

/// HTTP client for Microsoft Graph drive calls
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct GraphClient {
    http: Client,
    api_root: String,
    tokens: Arc<TokenManager>,
    retry: RetryPolicy,
}

impl GraphClient {
    /// Creates a client rooted at `api_root` (e.g. `https://graph.microsoft.com/v1.0/me`)
    pub fn new(tokens: Arc<TokenManager>, api_root: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_root: api_root.into(),
            tokens,
            retry: RetryPolicy::default(),
        }
    }

    /// Creates a client from the `remote` and `retry` config sections
    pub fn from_config(
        tokens: Arc<TokenManager>,
        remote: &RemoteConfig,
        retry: &RetryConfig,
    ) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(remote.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            api_root: remote.api_root.clone(),
            tokens,
            retry: RetryPolicy::from_config(retry),
        })
    }

    /// Replaces the retry policy used for chunk uploads
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    /// The raw HTTP client, for pre-authenticated URLs
    pub(crate) fn http_client(&self) -> &Client {
        &self.http
    }

    /// Builds `{api_root}/drive/root…` for the item at `segments`
    ///
    /// - no segments, no suffix: `/drive/root`
    /// - no segments, suffix: `/drive/root/{suffix}`
    /// - segments, no suffix: `/drive/root:/{a}/{b}`
    /// - segments, suffix: `/drive/root:/{a}/{b}:/{suffix}`
    ///
    /// Each segment is percent-encoded on its own.
    pub fn item_url(&self, segments: &[&str], suffix: Option<&str>) -> Result<Url, DriveError> {
        let mut url = Url::parse(&self.api_root)
            .map_err(|e| DriveError::protocol(format!("invalid api root {}: {}", self.api_root, e)))?;

        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| DriveError::protocol("api root cannot carry a path"))?;
            path.pop_if_empty().push("drive");

            match segments.split_last() {
                None => {
                    path.push("root");
                }
                Some((last, init)) => {
                    path.push("root:");
                    path.extend(init.iter().copied());
                    match suffix {
                        Some(_) => path.push(&format!("{}:", last)),
                        None => path.push(last),
                    };
                }
            }
            if let Some(suffix) = suffix {
                path.push(suffix);
            }
        }

        Ok(url)
    }

    /// Creates a request to `url` carrying a valid bearer token
    pub async fn authorized(&self, method: Method, url: Url) -> Result<RequestBuilder, DriveError> {
        let token = self.tokens.get_valid_access_token().await?;
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    /// Lists the children of the folder at `segments` (empty = drive root)
    ///
    /// Follows `@odata.nextLink` until all pages are read.
    pub async fn list_children(&self, segments: &[&str]) -> Result<Vec<RemoteItem>, DriveError> {
        let mut url = self.item_url(segments, Some("children"))?;
        let mut items = Vec::new();

        loop {
            debug!(url = %url, "Listing folder");
            let response = self
                .authorized(Method::GET, url)
                .await?
                .send()
                .await
                .map_err(transport_error)?;

            if !response.status().is_success() {
                return Err(error_from_response(response).await.error);
            }

            let page: ChildrenResponse = response
                .json()
                .await
                .map_err(|e| DriveError::protocol(format!("malformed children listing: {}", e)))?;

            items.extend(page.value.into_iter().map(DriveItem::into_remote_item));

            match page.next_link {
                Some(next) => {
                    url = Url::parse(&next).map_err(|e| {
                        DriveError::protocol(format!("invalid nextLink {}: {}", next, e))
                    })?;
                }
                None => break,
            }
        }

        debug!(count = items.len(), "Folder listed");
        Ok(items)
    }

    /// Deletes the item at `segments`
    pub async fn delete_item(&self, segments: &[&str]) -> Result<(), DriveError> {
        let url = self.item_url(segments, None)?;
        debug!(url = %url, "Deleting item");

        let response = self
            .authorized(Method::DELETE, url)
            .await?
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await.error);
        }
        Ok(())
    }

    /// Resolves the short-lived download URL of the file at `segments`
    pub async fn download_url(&self, segments: &[&str]) -> Result<String, DriveError> {
        let mut url = self.item_url(segments, None)?;
        url.query_pairs_mut()
            .append_pair("select", "id,name,size,@microsoft.graph.downloadUrl");

        let response = self
            .authorized(Method::GET, url)
            .await?
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await.error);
        }

        let metadata: DownloadMetadata = response
            .json()
            .await
            .map_err(|e| DriveError::protocol(format!("malformed item metadata: {}", e)))?;

        metadata
            .graph_download_url
            .or(metadata.download_url)
            .ok_or_else(|| DriveError::protocol("item metadata has no download URL"))
    }

    /// Fetches the bytes behind a pre-authenticated download URL
    pub async fn download(&self, download_url: &str) -> Result<Vec<u8>, DriveError> {
        let response = self
            .http
            .get(download_url)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await.error);
        }

        let bytes = response.bytes().await.map_err(transport_error)?;
        debug!(bytes = bytes.len(), "Downloaded file content");
        Ok(bytes.to_vec())
    }
}
