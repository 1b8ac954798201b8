//! Auth commands - Login, Logout, and Status for OneDrive authentication
//!
//! Provides the `vaultdrive auth` CLI subcommands which:
//! 1. `login`  - Runs the OAuth2 PKCE consent flow and stores the resulting
//!    credential in the system keyring.
//! 2. `logout` - Clears the credential from the keyring.
//! 3. `status` - Shows whether a credential is stored and when it expires.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::Subcommand;
use tracing::info;
use vaultdrive_core::domain::Credential;
use vaultdrive_core::ports::ICredentialStore;
use vaultdrive_graph::auth::{interactive_login, KeyringCredentialStore};

use crate::context::AppContext;
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Sign in to OneDrive in the browser
    Login {
        /// Azure application (client) ID, overrides auth.client_id
        #[arg(long)]
        client_id: Option<String>,
    },
    /// Remove the stored credential
    Logout,
    /// Check authentication status
    Status,
}

impl AuthCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format);
        match self {
            AuthCommand::Login { client_id } => {
                self.execute_login(ctx, client_id.as_deref(), &*fmt).await
            }
            AuthCommand::Logout => self.execute_logout(&*fmt),
            AuthCommand::Status => self.execute_status(ctx, &*fmt, format),
        }
    }

    async fn execute_login(
        &self,
        ctx: &AppContext,
        cli_client_id: Option<&str>,
        fmt: &dyn OutputFormatter,
    ) -> Result<()> {
        let mut auth = ctx.config.auth.clone();
        if let Some(id) = cli_client_id {
            auth.client_id = Some(id.to_string());
        }

        let tokens = ctx.token_manager_with(&auth)?;
        info!(redirect_uri = %auth.redirect_uri, "Starting OAuth2 login");

        fmt.info("Opening browser for Microsoft login...");
        let credential = interactive_login(&tokens, &auth)
            .await
            .context("OAuth2 login failed")?;

        fmt.success("Signed in to OneDrive");
        fmt.info(&format!(
            "Access token valid until {}",
            credential.access_token_expires_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        fmt.info(&format!(
            "Sign in again before {}",
            credential.force_reauth_at.format("%Y-%m-%d")
        ));
        Ok(())
    }

    fn execute_logout(&self, fmt: &dyn OutputFormatter) -> Result<()> {
        let store = KeyringCredentialStore::default();
        store
            .clear()
            .context("Failed to clear credential from keyring")?;

        info!("Logged out");
        fmt.success("Logged out successfully");
        fmt.info("Credential removed from keyring");
        Ok(())
    }

    fn execute_status(
        &self,
        ctx: &AppContext,
        fmt: &dyn OutputFormatter,
        format: OutputFormat,
    ) -> Result<()> {
        let stored = KeyringCredentialStore::default()
            .load()
            .context("Failed to read credential from keyring")?;

        let margin = Duration::seconds(ctx.config.auth.safety_margin_secs as i64);
        let status = AuthStatus::from_credential(stored.as_ref(), Utc::now(), margin);

        if format.is_json() {
            fmt.print_json(&status.to_json());
            return Ok(());
        }

        match stored {
            None => {
                fmt.info("Authentication status: Not signed in");
                fmt.info("Run 'vaultdrive auth login' to authenticate");
            }
            Some(credential) => {
                if status.requires_reauth {
                    fmt.warn("Stored credential has expired, sign in again");
                } else {
                    fmt.success("Signed in to OneDrive");
                }
                fmt.info(&format!("Access token:  {}", status.access_token_label()));
                fmt.info(&format!(
                    "Expires:       {}",
                    credential
                        .access_token_expires_at
                        .format("%Y-%m-%d %H:%M:%S UTC")
                ));
                fmt.info(&format!(
                    "Re-auth by:    {}",
                    credential.force_reauth_at.format("%Y-%m-%d")
                ));
            }
        }
        Ok(())
    }
}

/// Snapshot of the stored credential as shown by `auth status`
#[derive(Debug, PartialEq)]
struct AuthStatus {
    authenticated: bool,
    access_token_valid: bool,
    requires_reauth: bool,
    access_token_expires_at: Option<DateTime<Utc>>,
    force_reauth_at: Option<DateTime<Utc>>,
}

impl AuthStatus {
    fn from_credential(credential: Option<&Credential>, now: DateTime<Utc>, margin: Duration) -> Self {
        match credential {
            None => Self {
                authenticated: false,
                access_token_valid: false,
                requires_reauth: true,
                access_token_expires_at: None,
                force_reauth_at: None,
            },
            Some(c) => {
                let requires_reauth = !c.has_refresh_token() || c.requires_reauth(now);
                Self {
                    authenticated: c.is_usable() && !requires_reauth,
                    access_token_valid: c.is_access_token_valid(now, margin),
                    requires_reauth,
                    access_token_expires_at: Some(c.access_token_expires_at),
                    force_reauth_at: Some(c.force_reauth_at),
                }
            }
        }
    }

    fn access_token_label(&self) -> &'static str {
        if self.access_token_valid {
            "Valid"
        } else if self.requires_reauth {
            "Expired (sign-in required)"
        } else {
            "Expired (will refresh on next use)"
        }
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "authenticated": self.authenticated,
            "access_token_valid": self.access_token_valid,
            "requires_reauth": self.requires_reauth,
            "access_token_expires_at": self.access_token_expires_at.map(|t| t.to_rfc3339()),
            "force_reauth_at": self.force_reauth_at.map(|t| t.to_rfc3339()),
        })
    }
}
