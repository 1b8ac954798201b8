//! Remote commands - `ls`, `cat` and `rm` against OneDrive
//!
//! `ls` takes a folder relative to the drive root. `cat` and `rm` take a
//! path relative to the configured base folder, the same paths `sync`
//! uploads to.

use anyhow::{Context, Result};
use clap::Args;
use tokio::io::AsyncWriteExt;
use tracing::info;
use vaultdrive_core::domain::RemoteItem;
use vaultdrive_core::ports::IRemoteDrive;

use crate::context::AppContext;
use crate::output::{format_size, get_formatter, plural, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct LsCommand {
    /// Folder relative to the drive root (default: the root)
    pub folder: Option<String>,
}

#[derive(Debug, Args)]
pub struct CatCommand {
    /// File path relative to the base folder, e.g. `Notas/test.md`
    pub path: String,
}

#[derive(Debug, Args)]
pub struct RmCommand {
    /// Item path relative to the base folder
    pub path: String,
}

/// Fails early with a readable message when no credential is stored
async fn require_credentials(drive: &dyn IRemoteDrive) -> Result<()> {
    if drive.has_credentials().await {
        Ok(())
    } else {
        anyhow::bail!("Not signed in. Run 'vaultdrive auth login' first.")
    }
}

impl LsCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let drive = ctx.remote_drive(ctx.token_manager()?)?;
        require_credentials(&drive).await?;

        let folder = self.folder.as_deref().unwrap_or("");
        let mut items = drive
            .list_folder(folder)
            .await
            .with_context(|| format!("Failed to list '{}'", folder))?;
        items.sort_by(|a, b| b.is_folder.cmp(&a.is_folder).then(a.name.cmp(&b.name)));

        info!(folder, count = items.len(), "Listed remote folder");

        if format.is_json() {
            let json: Vec<_> = items.iter().map(item_json).collect();
            formatter.print_json(&serde_json::Value::Array(json));
        } else {
            print_listing(folder, &items, &*formatter);
        }
        Ok(())
    }
}

fn item_json(item: &RemoteItem) -> serde_json::Value {
    serde_json::json!({
        "id": item.id,
        "name": item.name,
        "path": item.path,
        "size": item.size,
        "is_folder": item.is_folder,
    })
}

fn print_listing(folder: &str, items: &[RemoteItem], formatter: &dyn OutputFormatter) {
    let label = if folder.is_empty() { "/" } else { folder };
    formatter.success(&format!("{} ({})", label, plural(items.len(), "item")));
    for item in items {
        if item.is_folder {
            formatter.info(&format!("{:>10}  {}/", "-", item.name));
        } else {
            formatter.info(&format!("{:>10}  {}", format_size(item.size), item.name));
        }
    }
}

impl CatCommand {
    pub async fn execute(&self, ctx: &AppContext, _format: OutputFormat) -> Result<()> {
        let drive = ctx.remote_drive(ctx.token_manager()?)?;
        require_credentials(&drive).await?;

        let content = drive
            .read_file(&self.path)
            .await
            .with_context(|| format!("Failed to read '{}'", self.path))?;

        let mut stdout = tokio::io::stdout();
        stdout.write_all(&content).await?;
        stdout.flush().await?;
        Ok(())
    }
}

impl RmCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let drive = ctx.remote_drive(ctx.token_manager()?)?;
        require_credentials(&drive).await?;

        drive
            .delete(&self.path)
            .await
            .with_context(|| format!("Failed to delete '{}'", self.path))?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "deleted": self.path,
            }));
        } else {
            formatter.success(&format!("Deleted {}", self.path));
        }
        Ok(())
    }
}
