//! Interactive OAuth2 PKCE consent for Microsoft identity platform
//!
//! Produces the authorization code that [`TokenManager::initial_exchange`]
//! turns into a credential. Only the CLI uses this module; an embedding host
//! may run its own consent UI instead.
//!
//! ## Components
//!
//! - [`PKCEFlow`] - Authorization URL with PKCE challenge and CSRF state
//! - [`LocalCallbackServer`] - Minimal HTTP server for the OAuth redirect
//! - [`KeyringCredentialStore`] - Credential persistence in the system keyring
//! - [`interactive_login`] - Browser + callback + code exchange in one call
//!
//! [`TokenManager::initial_exchange`]: crate::token::TokenManager::initial_exchange

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use oauth2::{
    basic::BasicClient, AuthUrl, ClientId, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, RedirectUrl, Scope,
};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};
use vaultdrive_core::config::AuthConfig;
use vaultdrive_core::domain::Credential;
use vaultdrive_core::ports::ICredentialStore;

use crate::token::TokenManager;

/// Keyring service name for storing credentials
const KEYRING_SERVICE: &str = "vaultdrive";

/// Keyring account used when none is configured
const DEFAULT_KEYRING_ACCOUNT: &str = "default";

// ============================================================================
// KeyringCredentialStore
// ============================================================================

/// Stores the credential as JSON in the OS credential store
///
/// Uses the `keyring` crate (GNOME Keyring, KDE Wallet, macOS Keychain),
/// service name `vaultdrive`.
pub struct KeyringCredentialStore {
    account: String,
}

impl KeyringCredentialStore {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry> {
        keyring::Entry::new(KEYRING_SERVICE, &self.account)
            .context("Failed to create keyring entry")
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new(DEFAULT_KEYRING_ACCOUNT)
    }
}

impl ICredentialStore for KeyringCredentialStore {
    fn load(&self) -> Result<Option<Credential>> {
        match self.entry()?.get_password() {
            Ok(json) => {
                let credential: Credential = serde_json::from_str(&json)
                    .context("Failed to deserialize credential from keyring")?;
                debug!(account = %self.account, "Loaded credential from keyring");
                Ok(Some(credential))
            }
            Err(keyring::Error::NoEntry) => {
                debug!(account = %self.account, "No credential in keyring");
                Ok(None)
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to read from keyring")),
        }
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        let json = serde_json::to_string(credential).context("Failed to serialize credential")?;
        self.entry()?
            .set_password(&json)
            .context("Failed to store credential in keyring")?;
        debug!(account = %self.account, "Stored credential in keyring");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) => {
                info!(account = %self.account, "Cleared credential from keyring");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(anyhow::Error::new(e).context("Failed to delete from keyring")),
        }
    }
}

// ============================================================================
// PKCEFlow
// ============================================================================

/// A consent URL plus the secrets needed to finish the exchange
#[derive(Debug)]
pub struct ConsentRequest {
    /// URL to open in the user's browser
    pub url: String,
    /// CSRF state that the callback must echo back
    pub state: String,
    /// PKCE verifier for the code exchange
    pub pkce_verifier: String,
}

/// Builds PKCE authorization URLs with the `oauth2` crate
pub struct PKCEFlow {
    client: BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet>,
    scopes: Vec<String>,
}

impl PKCEFlow {
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        let client_id = config
            .client_id
            .clone()
            .context("auth.client_id is not configured")?;

        let client = BasicClient::new(ClientId::new(client_id))
            .set_auth_uri(AuthUrl::new(config.authorize_url()).context("Invalid authorization URL")?)
            .set_redirect_uri(
                RedirectUrl::new(config.redirect_uri.clone()).context("Invalid redirect URI")?,
            );

        Ok(Self {
            client,
            scopes: config.scopes.clone(),
        })
    }

    /// Generates an authorization URL with a fresh PKCE challenge
    pub fn consent_request(&self) -> ConsentRequest {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let (url, csrf_token) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(self.scopes.iter().cloned().map(Scope::new))
            .set_pkce_challenge(pkce_challenge)
            .url();

        debug!("Generated authorization URL");
        ConsentRequest {
            url: url.to_string(),
            state: csrf_token.secret().clone(),
            pkce_verifier: pkce_verifier.secret().clone(),
        }
    }
}

// ============================================================================
// LocalCallbackServer
// ============================================================================

/// Parameters extracted from the OAuth2 callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackParams {
    /// Consent granted
    Code { code: String, state: String },
    /// Consent denied or failed at the identity provider
    Error {
        error: String,
        description: Option<String>,
    },
}

/// Minimal HTTP server that waits for the OAuth2 redirect on localhost
///
/// Serves connections until one request carries either `code` or `error`
/// in its query string, answers it with a small HTML page and stops.
pub struct LocalCallbackServer {
    listener: TcpListener,
}

impl LocalCallbackServer {
    /// Binds to the host and port of `redirect_uri`
    pub async fn bind(redirect_uri: &str) -> Result<Self> {
        let url = url::Url::parse(redirect_uri).context("Invalid redirect URI")?;
        let host = url.host_str().unwrap_or("127.0.0.1");
        let port = url.port_or_known_default().unwrap_or(8400);
        Self::bind_addr(&format!("{}:{}", host, port)).await
    }

    /// Binds to an explicit address such as `127.0.0.1:0`
    pub async fn bind_addr(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind callback server to {}", addr))?;
        info!(addr, "OAuth callback server listening");
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Callback server has no local address")
    }

    /// Waits for the redirect and returns its parameters
    pub async fn wait(self) -> Result<CallbackParams> {
        use hyper::server::conn::http1;
        use hyper::service::service_fn;
        use hyper::Request;
        use hyper_util::rt::TokioIo;

        let (tx, mut rx) = oneshot::channel::<CallbackParams>();
        let tx = Arc::new(Mutex::new(Some(tx)));

        loop {
            let (stream, _addr) = tokio::select! {
                params = &mut rx => {
                    let params = params
                        .context("Callback server channel closed without receiving parameters")?;
                    info!("Received OAuth callback");
                    return Ok(params);
                }
                accepted = self.listener.accept() => {
                    accepted.context("Failed to accept connection on callback server")?
                }
            };

            let io = TokioIo::new(stream);
            let tx = tx.clone();
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let tx = tx.clone();
                async move {
                    let uri = req.uri().to_string();
                    debug!(uri = %req.uri().path(), "Callback server received request");

                    let response = match parse_callback_params(&uri) {
                        Some(params) => {
                            let page = match &params {
                                CallbackParams::Code { .. } => {
                                    html_response(StatusCode::OK, success_html())
                                }
                                CallbackParams::Error { error, .. } => {
                                    warn!(%error, "Authorization server returned an error");
                                    html_response(StatusCode::BAD_REQUEST, error_html(error))
                                }
                            };
                            if let Some(sender) = tx.lock().await.take() {
                                let _ = sender.send(params);
                            }
                            page
                        }
                        None => html_response(
                            StatusCode::NOT_FOUND,
                            error_html("Missing authorization code in callback"),
                        ),
                    };
                    Ok::<_, hyper::Error>(response)
                }
            });

            tokio::spawn(async move {
                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    warn!(error = %e, "Callback server connection error");
                }
            });
        }
    }
}

/// Parses the callback query; `None` when it carries neither code nor error
fn parse_callback_params(uri: &str) -> Option<CallbackParams> {
    let url = url::Url::parse(&format!("http://localhost{}", uri)).ok()?;
    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut description = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.to_string()),
            "state" => state = Some(value.to_string()),
            "error" => error = Some(value.to_string()),
            "error_description" => description = Some(value.to_string()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Some(CallbackParams::Error { error, description });
    }
    Some(CallbackParams::Code {
        code: code?,
        state: state.unwrap_or_default(),
    })
}

fn html_response(status: StatusCode, html: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(html)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("text/html; charset=utf-8"),
    );
    response
}

fn success_html() -> String {
    r#"<!DOCTYPE html>
<html>
<head><title>VaultDrive - Signed in</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>Signed in</h1>
    <p>VaultDrive can now sync your vault to OneDrive.</p>
    <p>You can close this window.</p>
</body>
</html>"#
        .to_string()
}

/// Escapes text for interpolation into an HTML element
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn error_html(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>VaultDrive - Sign-in failed</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>Sign-in failed</h1>
    <p>{}</p>
    <p>Please close this window and try again.</p>
</body>
</html>"#,
        escape_html(message)
    )
}

// ============================================================================
// interactive_login
// ============================================================================

/// Runs the full consent flow and stores the resulting credential
///
/// 1. Builds a PKCE authorization URL
/// 2. Opens it in the user's browser (printing it if no browser starts)
/// 3. Waits for the redirect on the local callback server
/// 4. Checks the CSRF state and exchanges the code through `tokens`
pub async fn interactive_login(tokens: &TokenManager, config: &AuthConfig) -> Result<Credential> {
    info!("Starting OAuth2 PKCE login flow");

    let flow = PKCEFlow::from_config(config)?;
    let request = flow.consent_request();
    let server = LocalCallbackServer::bind(&config.redirect_uri).await?;

    if let Err(e) = webbrowser::open(&request.url) {
        warn!(error = %e, "Failed to open browser");
        eprintln!("Open this URL in your browser to sign in:\n\n  {}\n", request.url);
    }

    match server.wait().await? {
        CallbackParams::Code { code, state } => {
            if state != request.state {
                anyhow::bail!("OAuth state mismatch, possible CSRF attempt");
            }
            let credential = tokens
                .initial_exchange(&code, &request.pkce_verifier)
                .await
                .context("Failed to exchange authorization code")?;
            info!("OAuth2 PKCE login completed");
            Ok(credential)
        }
        CallbackParams::Error { error, description } => {
            anyhow::bail!(
                "Sign-in was not completed: {} {}",
                error,
                description.unwrap_or_default()
            )
        }
    }
}
