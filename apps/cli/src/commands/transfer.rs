//! `partshop import` and `partshop export`, plus the two share targets the
//! CLI offers.

use std::io::Write;
use std::path::{Path, PathBuf};

use partshop_core::ImportSummary;
use partshop_db::{ExportOutcome, FileShare};
use tracing::debug;

use super::Context;
use crate::error::CliResult;

// =============================================================================
// Share Targets
// =============================================================================

/// Copies the export into a destination directory.
#[derive(Debug, Clone)]
pub struct DirectoryShare {
    dest: PathBuf,
}

impl DirectoryShare {
    pub fn new(dest: impl Into<PathBuf>) -> Self {
        DirectoryShare { dest: dest.into() }
    }
}

impl FileShare for DirectoryShare {
    fn is_available(&self) -> bool {
        !self.dest.is_file()
    }

    fn share(&self, path: &Path, _mime_type: &str) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dest)?;
        let file_name = path.file_name().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "export path has no file name")
        })?;

        let target = self.dest.join(file_name);
        if target != path {
            std::fs::copy(path, &target)?;
            debug!(target = %target.display(), "Export copied");
        }
        Ok(())
    }
}

/// Streams the export to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutShare;

impl FileShare for StdoutShare {
    fn is_available(&self) -> bool {
        true
    }

    fn share(&self, path: &Path, _mime_type: &str) -> std::io::Result<()> {
        let bytes = std::fs::read(path)?;
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(&bytes)?;
        stdout.flush()
    }
}

// =============================================================================
// Commands
// =============================================================================

pub async fn import(ctx: &Context, file: &Path) -> CliResult<ImportSummary> {
    Ok(ctx.db.transfer().import_file(file).await?)
}

/// Where an export should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportTarget {
    /// The configured export directory.
    Default,
    Directory(PathBuf),
    Stdout,
}

pub async fn export(ctx: &Context, target: &ExportTarget) -> CliResult<ExportOutcome> {
    let transfer = ctx.db.transfer();
    let outcome = match target {
        ExportTarget::Default => {
            let share = DirectoryShare::new(&ctx.config.export_dir);
            transfer.export_to(&share, &ctx.config.export_dir).await?
        }
        ExportTarget::Directory(dest) => {
            let share = DirectoryShare::new(dest);
            let mut outcome = transfer.export_to(&share, &ctx.config.export_dir).await?;
            if let Some(name) = outcome.path.file_name() {
                outcome.path = dest.join(name);
            }
            outcome
        }
        ExportTarget::Stdout => {
            let scratch = std::env::temp_dir().join("partshop-exports");
            let outcome = transfer.export_to(&StdoutShare, &scratch).await?;
            if let Err(e) = tokio::fs::remove_file(&outcome.path).await {
                debug!(error = %e, "Scratch export not removed");
            }
            outcome
        }
    };
    Ok(outcome)
}

pub fn render_import(summary: &ImportSummary) -> String {
    summary.message()
}

pub fn render_export(outcome: &ExportOutcome) -> String {
    format!("Exported {} items to {}", outcome.rows, outcome.path.display())
}
