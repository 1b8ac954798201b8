//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the interfaces the sync core depends on; their
//! implementations live in adapter crates or in the embedding host.
//!
//! ## Ports Overview
//!
//! - [`IRemoteDrive`] - Remote drive operations (OneDrive via Microsoft Graph)
//! - [`ICredentialStore`] - Persistence hook for OAuth credentials

pub mod credential_store;
pub mod remote_drive;

pub use credential_store::{ICredentialStore, InMemoryCredentialStore};
pub use remote_drive::IRemoteDrive;
