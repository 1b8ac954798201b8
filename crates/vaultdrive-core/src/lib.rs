//! VaultDrive Core - Domain types, ports and configuration
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain values** - `Credential`, `RemoteItem`, `SyncJob`, `SyncStatus`
//! - **Error taxonomy** - `DriveError` (auth / protocol / network / local fs)
//! - **Port definitions** - Traits for adapters: `IRemoteDrive`, `ICredentialStore`
//! - **Configuration** - YAML-backed settings with validation
//!
//! # Architecture
//!
//! The domain module holds plain values with no I/O. Ports define the trait
//! interfaces the sync orchestrator depends on; adapter crates
//! (`vaultdrive-graph`) implement them.

pub mod config;
pub mod domain;
pub mod ports;
