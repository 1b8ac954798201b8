//! Credential persistence port
//!
//! The embedding host owns settings storage. The token manager calls
//! [`ICredentialStore::save`] after every successful exchange or refresh and
//! [`ICredentialStore::clear`] on disconnect.
//!
//! ## Design Notes
//!
//! - Synchronous methods: keyring and settings backends are blocking and the
//!   calls are short.
//! - Uses `anyhow::Result` because storage errors are adapter-specific; the
//!   token manager only logs them.

use std::sync::Mutex;

use anyhow::Result;

use crate::domain::Credential;

/// Persistence hook for the process-wide credential
pub trait ICredentialStore: Send + Sync {
    /// Loads the persisted credential, if any
    fn load(&self) -> Result<Option<Credential>>;

    /// Persists the given credential, replacing any previous one
    fn save(&self, credential: &Credential) -> Result<()>;

    /// Removes the persisted credential
    fn clear(&self) -> Result<()>;
}

/// Process-local credential store
///
/// Useful for hosts that persist settings themselves and for tests.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    inner: Mutex<Option<Credential>>,
}

impl InMemoryCredentialStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `credential`
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            inner: Mutex::new(Some(credential)),
        }
    }

    /// Returns a copy of the stored credential
    pub fn current(&self) -> Option<Credential> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl ICredentialStore for InMemoryCredentialStore {
    fn load(&self) -> Result<Option<Credential>> {
        Ok(self.current())
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        *self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(credential.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        Ok(())
    }
}
