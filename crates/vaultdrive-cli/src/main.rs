//! VaultDrive CLI - Command-line interface for VaultDrive
//!
//! Provides commands for:
//! - Signing in to OneDrive and managing the stored credential
//! - Pushing the local vault to OneDrive, once or periodically
//! - Inspecting and removing remote items
//! - Viewing and validating configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod context;
mod output;

use commands::{
    auth::AuthCommand,
    completions::CompletionsCommand,
    config::ConfigCommand,
    remote::{CatCommand, LsCommand, RmCommand},
    sync::SyncCommand,
};
use context::AppContext;
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "vaultdrive", version, about = "Push a local vault to OneDrive")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Authentication commands
    #[command(subcommand)]
    Auth(AuthCommand),
    /// Upload the local vault to OneDrive
    Sync(SyncCommand),
    /// List a remote folder
    Ls(LsCommand),
    /// Print a remote file to stdout
    Cat(CatCommand),
    /// Delete a remote item under the base folder
    Rm(RmCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

/// Picks the log filter: `RUST_LOG`, else `-v`/`-q`, else the configured level
fn log_filter(verbose: u8, quiet: bool, configured: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level = match (verbose, quiet) {
        (0, true) => "error",
        (0, false) => configured,
        (1, _) => "debug",
        _ => "trace",
    };
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let ctx = AppContext::load(cli.config.clone())?;

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose, cli.quiet, &ctx.config.logging.level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match cli.command {
        Commands::Auth(cmd) => cmd.execute(&ctx, format).await,
        Commands::Sync(cmd) => cmd.execute(&ctx, format).await,
        Commands::Ls(cmd) => cmd.execute(&ctx, format).await,
        Commands::Cat(cmd) => cmd.execute(&ctx, format).await,
        Commands::Rm(cmd) => cmd.execute(&ctx, format).await,
        Commands::Config(cmd) => cmd.execute(&ctx, format).await,
        Commands::Completions(cmd) => cmd.execute(format).await,
    }
}
