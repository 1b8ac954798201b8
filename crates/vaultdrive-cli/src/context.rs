//! Shared wiring for commands
//!
//! Loads the configuration once and builds the Graph adapters on demand.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use vaultdrive_core::config::{AuthConfig, Config};
use vaultdrive_graph::{
    auth::KeyringCredentialStore,
    client::GraphClient,
    provider::GraphRemoteDrive,
    token::{TokenManager, TokenSettings},
};

pub struct AppContext {
    pub config: Config,
    pub config_path: PathBuf,
    /// True when `config_path` was given on the command line
    pub explicit_path: bool,
}

impl AppContext {
    /// Loads the config from `path`, or from the default location
    ///
    /// An explicit path must exist and parse; the default location falls
    /// back to built-in defaults.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        match path {
            Some(path) => {
                let config = Config::load(&path)
                    .with_context(|| format!("Failed to load config from {}", path.display()))?;
                Ok(Self {
                    config,
                    config_path: path,
                    explicit_path: true,
                })
            }
            None => {
                let config_path = Config::default_path();
                Ok(Self {
                    config: Config::load_or_default(&config_path),
                    config_path,
                    explicit_path: false,
                })
            }
        }
    }

    /// Token manager backed by the system keyring
    pub fn token_manager(&self) -> Result<Arc<TokenManager>> {
        self.token_manager_with(&self.config.auth)
    }

    /// Token manager for an `auth` section overridden on the command line
    pub fn token_manager_with(&self, auth: &AuthConfig) -> Result<Arc<TokenManager>> {
        let settings = TokenSettings::from_config(auth).context(
            "No client_id configured. Set auth.client_id in config.yaml or pass --client-id",
        )?;
        Ok(Arc::new(TokenManager::new(
            settings,
            Arc::new(KeyringCredentialStore::default()),
        )))
    }

    /// Remote drive rooted at the configured base folder
    pub fn remote_drive(&self, tokens: Arc<TokenManager>) -> Result<GraphRemoteDrive> {
        let client = GraphClient::from_config(tokens, &self.config.remote, &self.config.retry)?;
        info!(
            api_root = %self.config.remote.api_root,
            base_folder = %self.config.remote.base_folder,
            "Remote drive configured"
        );
        Ok(GraphRemoteDrive::new(client, self.config.remote.base_folder.clone())
            .with_chunk_size(self.config.upload.chunk_size_bytes()))
    }
}
