//! Configuration module for VaultDrive.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.
//!
//! Tokens are not part of the configuration; they live in the credential
//! store (see [`crate::ports::ICredentialStore`]).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default Microsoft identity authority (consumers tenant)
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com/consumers";

/// Default Microsoft Graph drive API root
pub const DEFAULT_API_ROOT: &str = "https://graph.microsoft.com/v1.0/me";

/// Default redirect URI for the local callback server
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8400/callback";

/// Default OAuth scopes for OneDrive access
pub const DEFAULT_SCOPES: &[&str] = &["Files.ReadWrite", "offline_access"];

/// Upload chunks must be multiples of this many KiB
pub const CHUNK_ALIGNMENT_KIB: u64 = 320;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for VaultDrive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub auth: AuthConfig,
    pub remote: RemoteConfig,
    pub sync: SyncConfig,
    pub upload: UploadConfig,
    pub retry: RetryConfig,
    pub logging: LoggingConfig,
}

/// Authentication / OAuth settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Azure AD Application (client) ID. `None` until the user configures one.
    pub client_id: Option<String>,
    /// Identity authority base URL; the token endpoint is
    /// `{authority}/oauth2/v2.0/token`.
    pub authority: String,
    /// Redirect target registered for the application.
    pub redirect_uri: String,
    /// OAuth scopes to request.
    pub scopes: Vec<String>,
    /// Seconds before nominal expiry at which the access token is refreshed.
    pub safety_margin_secs: u64,
    /// Days after the last exchange/refresh at which re-consent is forced.
    pub reauth_ceiling_days: u32,
}

/// Remote drive settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Drive API root, e.g. `https://graph.microsoft.com/v1.0/me`.
    pub api_root: String,
    /// Remote folder (relative to the drive root) that mirrors the local root.
    pub base_folder: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Local directory tree that is pushed to the remote base folder.
    pub root: PathBuf,
    /// Seconds between periodic sync passes in watch mode.
    pub interval_secs: u64,
}

/// Chunked upload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Size of each upload chunk in KiB (must be a multiple of 320).
    pub chunk_size_kib: u64,
}

/// Retry policy for transient failures of individual requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt (0 disables retrying).
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub initial_delay_ms: u64,
    /// Cap for the exponential delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Factor applied to the delay after every attempt.
    pub backoff_multiplier: f64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Write the configuration as YAML to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/vaultdrive/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("vaultdrive")
            .join("config.yaml")
    }
}

impl AuthConfig {
    /// Token endpoint derived from the authority.
    pub fn token_url(&self) -> String {
        format!("{}/oauth2/v2.0/token", self.authority.trim_end_matches('/'))
    }

    /// Authorization endpoint derived from the authority.
    pub fn authorize_url(&self) -> String {
        format!(
            "{}/oauth2/v2.0/authorize",
            self.authority.trim_end_matches('/')
        )
    }
}

impl SyncConfig {
    /// The sync root with a leading `~` expanded to the home directory.
    pub fn resolved_root(&self) -> PathBuf {
        expand_tilde(&self.root)
    }
}

/// Expands a leading `~` or `~/` to the user's home directory.
///
/// Paths without a leading tilde, and every path when no home directory is
/// known, are returned unchanged.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Some(raw) = path.to_str() else {
        return path.to_path_buf();
    };
    if let Some(stripped) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    } else if raw == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    path.to_path_buf()
}

impl UploadConfig {
    /// Chunk size in bytes.
    pub fn chunk_size_bytes(&self) -> usize {
        (self.chunk_size_kib * 1024) as usize
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

// Config derives Default because all its fields implement Default.

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            authority: DEFAULT_AUTHORITY.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            safety_margin_secs: 120,
            reauth_ceiling_days: 80,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_root: DEFAULT_API_ROOT.to_string(),
            base_folder: "Vault".to_string(),
            request_timeout_secs: 60,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            root: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("~"))
                .join("Vault"),
            interval_secs: 300,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size_kib: 5 * 1024,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.interval_secs"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- auth ---
        if self.auth.authority.trim().is_empty() {
            errors.push(ValidationError {
                field: "auth.authority".into(),
                message: "must not be empty".into(),
            });
        }
        if self.auth.scopes.is_empty() {
            errors.push(ValidationError {
                field: "auth.scopes".into(),
                message: "at least one scope is required".into(),
            });
        }
        if self.auth.reauth_ceiling_days == 0 {
            errors.push(ValidationError {
                field: "auth.reauth_ceiling_days".into(),
                message: "must be greater than 0".into(),
            });
        }
        if matches!(&self.auth.client_id, Some(id) if id.trim().is_empty()) {
            errors.push(ValidationError {
                field: "auth.client_id".into(),
                message: "must not be empty when set".into(),
            });
        }

        // --- remote ---
        if self.remote.api_root.trim().is_empty() {
            errors.push(ValidationError {
                field: "remote.api_root".into(),
                message: "must not be empty".into(),
            });
        }
        if self.remote.request_timeout_secs == 0 {
            errors.push(ValidationError {
                field: "remote.request_timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- sync ---
        if self.sync.interval_secs == 0 {
            errors.push(ValidationError {
                field: "sync.interval_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        let root = self.sync.resolved_root();
        if !root.is_dir() {
            errors.push(ValidationError {
                field: "sync.root".into(),
                message: format!("directory does not exist: {}", root.display()),
            });
        }

        // --- upload ---
        if self.upload.chunk_size_kib == 0 {
            errors.push(ValidationError {
                field: "upload.chunk_size_kib".into(),
                message: "must be greater than 0".into(),
            });
        } else if self.upload.chunk_size_kib % CHUNK_ALIGNMENT_KIB != 0 {
            errors.push(ValidationError {
                field: "upload.chunk_size_kib".into(),
                message: format!(
                    "must be a multiple of {} KiB (got {})",
                    CHUNK_ALIGNMENT_KIB, self.upload.chunk_size_kib
                ),
            });
        }

        // --- retry ---
        if self.retry.backoff_multiplier < 1.0 {
            errors.push(ValidationError {
                field: "retry.backoff_multiplier".into(),
                message: "must be at least 1.0".into(),
            });
        }
        if self.retry.max_delay_ms < self.retry.initial_delay_ms {
            errors.push(ValidationError {
                field: "retry.max_delay_ms".into(),
                message: format!(
                    "max_delay_ms ({}) must not be below initial_delay_ms ({})",
                    self.retry.max_delay_ms, self.retry.initial_delay_ms
                ),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use vaultdrive_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .sync_root(PathBuf::from("/home/user/Vault"))
///     .remote_base_folder("Notes")
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- auth ---

    pub fn auth_client_id(mut self, id: impl Into<String>) -> Self {
        self.config.auth.client_id = Some(id.into());
        self
    }

    pub fn auth_authority(mut self, authority: impl Into<String>) -> Self {
        self.config.auth.authority = authority.into();
        self
    }

    pub fn auth_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.config.auth.redirect_uri = uri.into();
        self
    }

    pub fn auth_scopes(mut self, scopes: Vec<String>) -> Self {
        self.config.auth.scopes = scopes;
        self
    }

    pub fn auth_safety_margin_secs(mut self, secs: u64) -> Self {
        self.config.auth.safety_margin_secs = secs;
        self
    }

    pub fn auth_reauth_ceiling_days(mut self, days: u32) -> Self {
        self.config.auth.reauth_ceiling_days = days;
        self
    }

    // --- remote ---

    pub fn remote_api_root(mut self, root: impl Into<String>) -> Self {
        self.config.remote.api_root = root.into();
        self
    }

    pub fn remote_base_folder(mut self, folder: impl Into<String>) -> Self {
        self.config.remote.base_folder = folder.into();
        self
    }

    pub fn remote_request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.remote.request_timeout_secs = secs;
        self
    }

    // --- sync ---

    pub fn sync_root(mut self, root: PathBuf) -> Self {
        self.config.sync.root = root;
        self
    }

    pub fn sync_interval_secs(mut self, secs: u64) -> Self {
        self.config.sync.interval_secs = secs;
        self
    }

    // --- upload ---

    pub fn upload_chunk_size_kib(mut self, kib: u64) -> Self {
        self.config.upload.chunk_size_kib = kib;
        self
    }

    // --- retry ---

    pub fn retry_max_retries(mut self, n: u32) -> Self {
        self.config.retry.max_retries = n;
        self
    }

    pub fn retry_initial_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry.initial_delay_ms = ms;
        self
    }

    pub fn retry_max_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry.max_delay_ms = ms;
        self
    }

    pub fn retry_backoff_multiplier(mut self, factor: f64) -> Self {
        self.config.retry.backoff_multiplier = factor;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
