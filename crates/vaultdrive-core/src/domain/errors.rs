//! Domain error types
//!
//! [`DriveError`] is the error taxonomy shared by every remote and local
//! operation the sync orchestrator drives. [`DomainError`] covers validation
//! and state-machine violations inside domain values.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

/// Errors surfaced by the token manager, the remote drive client and the
/// local tree walker.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DriveError {
    /// Missing, expired or revoked credentials. Requires user re-consent and
    /// is never retried automatically.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The remote returned a well-formed error or an unexpected status/shape
    #[error("Protocol error: {message}")]
    Protocol {
        /// HTTP status code, when the failure came from a response
        status: Option<u16>,
        /// Human-readable description
        message: String,
    },

    /// Transport-level failure (connection, DNS, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Missing or unreadable local path
    #[error("Local filesystem error at {}: {message}", path.display())]
    LocalFs {
        /// The offending path
        path: PathBuf,
        /// Human-readable description
        message: String,
    },
}

impl DriveError {
    /// Builds a [`DriveError::Protocol`] without an HTTP status
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            status: None,
            message: message.into(),
        }
    }

    /// Builds a [`DriveError::Protocol`] carrying the HTTP status
    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        Self::Protocol {
            status: Some(status),
            message: format!("HTTP {}: {}", status, message.into()),
        }
    }

    /// Builds a [`DriveError::LocalFs`]
    pub fn local_fs(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::LocalFs {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns the HTTP status attached to a protocol error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Protocol { status, .. } => *status,
            _ => None,
        }
    }

    /// Returns true if retrying the same request may succeed
    ///
    /// Transport failures, request timeouts (408), throttling (429) and
    /// server errors (5xx) are transient. Authentication failures never are.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Protocol {
                status: Some(status),
                ..
            } => *status == 408 || *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }

    /// Returns true if the error requires the user to re-authenticate
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}
