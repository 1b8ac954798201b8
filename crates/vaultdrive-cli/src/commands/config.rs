//! Config command - View and manage VaultDrive configuration
//!
//! Provides the `vaultdrive config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Prints the configuration file location
//! 3. Sets individual configuration values via dot-notation keys
//! 4. Validates the configuration file and reports errors

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;
use vaultdrive_core::config::Config;

use crate::context::AppContext;
use crate::output::{get_formatter, plural, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "sync.interval_secs")
        key: String,
        /// New value
        value: String,
    },
    /// Validate configuration file
    Validate,
}

const SUPPORTED_KEYS: &[(&str, &str)] = &[
    ("auth.client_id", "Azure application (client) ID, 'none' to unset"),
    ("auth.authority", "Identity authority base URL"),
    ("auth.redirect_uri", "Loopback redirect URI for sign-in"),
    ("auth.safety_margin_secs", "Refresh this many seconds before expiry"),
    ("auth.reauth_ceiling_days", "Days before sign-in is required again"),
    ("remote.api_root", "Graph API root for the drive owner"),
    ("remote.base_folder", "Remote folder the vault is uploaded into"),
    ("remote.request_timeout_secs", "HTTP request timeout"),
    ("sync.root", "Local vault directory"),
    ("sync.interval_secs", "Seconds between passes in watch mode"),
    ("upload.chunk_size_kib", "Upload chunk size, multiple of 320"),
    ("retry.max_retries", "Retries per chunk on transient errors"),
    ("retry.initial_delay_ms", "First backoff delay"),
    ("retry.max_delay_ms", "Backoff delay cap"),
    ("retry.backoff_multiplier", "Backoff growth factor"),
    ("logging.level", "trace|debug|info|warn|error"),
];

impl ConfigCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(ctx, format),
            ConfigCommand::Path => self.execute_path(ctx, format),
            ConfigCommand::Set { key, value } => self.execute_set(ctx, key, value, format),
            ConfigCommand::Validate => self.execute_validate(ctx, format),
        }
    }

    fn execute_show(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        info!(config_path = %ctx.config_path.display(), "Showing configuration");

        if format.is_json() {
            let json = serde_json::to_value(&ctx.config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&json);
        } else {
            formatter.success(&format!("Configuration ({})", ctx.config_path.display()));
            formatter.info("");

            let yaml = serde_yaml::to_string(&ctx.config)
                .context("Failed to serialize configuration to YAML")?;
            for line in yaml.lines() {
                formatter.info(line);
            }
        }
        Ok(())
    }

    fn execute_path(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        if format.is_json() {
            get_formatter(format).print_json(&serde_json::json!({
                "config_path": ctx.config_path.display().to_string(),
                "exists": ctx.config_path.exists(),
            }));
        } else {
            println!("{}", ctx.config_path.display());
        }
        Ok(())
    }

    fn execute_set(
        &self,
        ctx: &AppContext,
        key: &str,
        value: &str,
        format: OutputFormat,
    ) -> Result<()> {
        let formatter = get_formatter(format);
        let mut config = ctx.config.clone();

        info!(key = %key, "Setting configuration value");

        if let Err(e) = apply_config_value(&mut config, key, value) {
            if format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "success": false,
                    "key": key,
                    "error": e.to_string(),
                }));
            } else {
                formatter.error(&format!("Failed to set '{}': {}", key, e));
                formatter.info("");
                formatter.info("Supported keys:");
                for (name, help) in SUPPORTED_KEYS {
                    formatter.info(&format!("  {:<30} - {}", name, help));
                }
            }
            return Ok(());
        }

        // sync.root may be created after configuring it
        let errors: Vec<String> = config
            .validate()
            .into_iter()
            .filter(|e| e.field != "sync.root")
            .map(|e| e.to_string())
            .collect();

        if !errors.is_empty() {
            if format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "success": false,
                    "key": key,
                    "errors": errors,
                }));
            } else {
                formatter.error(&format!("Invalid value for '{}': {}", key, errors.join("; ")));
            }
            return Ok(());
        }

        config
            .save(&ctx.config_path)
            .with_context(|| format!("Failed to write {}", ctx.config_path.display()))?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "key": key,
                "value": value,
                "config_path": ctx.config_path.display().to_string(),
            }));
        } else {
            formatter.success(&format!("Set {} = {}", key, value));
            formatter.info(&format!("Saved to {}", ctx.config_path.display()));
        }
        Ok(())
    }

    fn execute_validate(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let path = &ctx.config_path;

        // Load explicitly so parse errors surface instead of falling back
        let config = match Config::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                let message = if path.exists() {
                    format!("Failed to parse configuration: {}", e)
                } else {
                    "Configuration file not found, using defaults".to_string()
                };
                if format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "valid": false,
                        "config_path": path.display().to_string(),
                        "errors": [message],
                    }));
                } else {
                    formatter.error(&message);
                    formatter.info(&format!("File: {}", path.display()));
                }
                return Ok(());
            }
        };

        info!(config_path = %path.display(), "Validating configuration");
        let errors = config.validate();

        if format.is_json() {
            let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            formatter.print_json(&serde_json::json!({
                "valid": errors.is_empty(),
                "config_path": path.display().to_string(),
                "errors": error_strings,
            }));
        } else if errors.is_empty() {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {}", path.display()));
        } else {
            formatter.error(&format!("Configuration has {}:", plural(errors.len(), "error")));
            formatter.info(&format!("File: {}", path.display()));
            formatter.info("");
            for error in &errors {
                formatter.info(&format!("  {} - {}", error.field, error.message));
            }
        }
        Ok(())
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse::<T>()
        .with_context(|| format!("Invalid value '{}' for {}", value, key))
}

/// Applies a dot-notation key/value pair to a [`Config`]
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "auth.client_id" => {
            config.auth.client_id = match value.trim() {
                "" | "none" => None,
                id => Some(id.to_string()),
            };
        }
        "auth.authority" => config.auth.authority = value.trim_end_matches('/').to_string(),
        "auth.redirect_uri" => config.auth.redirect_uri = value.to_string(),
        "auth.safety_margin_secs" => config.auth.safety_margin_secs = parse(key, value)?,
        "auth.reauth_ceiling_days" => config.auth.reauth_ceiling_days = parse(key, value)?,

        "remote.api_root" => config.remote.api_root = value.trim_end_matches('/').to_string(),
        "remote.base_folder" => config.remote.base_folder = value.to_string(),
        "remote.request_timeout_secs" => {
            config.remote.request_timeout_secs = parse(key, value)?
        }

        "sync.root" => config.sync.root = PathBuf::from(value),
        "sync.interval_secs" => config.sync.interval_secs = parse(key, value)?,

        "upload.chunk_size_kib" => config.upload.chunk_size_kib = parse(key, value)?,

        "retry.max_retries" => config.retry.max_retries = parse(key, value)?,
        "retry.initial_delay_ms" => config.retry.initial_delay_ms = parse(key, value)?,
        "retry.max_delay_ms" => config.retry.max_delay_ms = parse(key, value)?,
        "retry.backoff_multiplier" => config.retry.backoff_multiplier = parse(key, value)?,

        "logging.level" => config.logging.level = value.to_lowercase(),

        _ => anyhow::bail!("Unknown configuration key '{}'", key),
    }
    Ok(())
}
