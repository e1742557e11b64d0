//! Whole-store commands: `init`, `status`, `wipe`.

use std::path::PathBuf;

use partshop_core::ThemePreference;
use partshop_db::migrations::migration_status;
use partshop_db::WipeSummary;
use serde::Serialize;
use tracing::info;

use super::Context;
use crate::error::{ApiError, CliResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitReport {
    pub database_path: PathBuf,
    pub schema_version: u32,
    pub theme: ThemePreference,
    /// Set when `init` wrote a fresh config file.
    pub config_written: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub database_path: PathBuf,
    pub attachments_dir: PathBuf,
    pub export_dir: PathBuf,
    pub schema_version: u32,
    pub latest_version: u32,
    pub categories: i64,
    pub items: i64,
    pub shopping_entries: i64,
    pub theme: ThemePreference,
    pub healthy: bool,
}

/// Brings the store up to date, applies the configured theme and writes a
/// config file if there is none.
///
/// Opening the store already ran the migrations; running them again is a
/// no-op and reports the version.
pub async fn init(ctx: &Context) -> CliResult<InitReport> {
    let schema_version = ctx.db.run_migrations().await?;

    if let Some(theme) = ctx.config.theme {
        ctx.db.settings().set_theme(theme).await?;
    }
    let theme = ctx.db.settings().theme().await?;

    let config_written = match &ctx.config_path {
        Some(path) if !path.exists() => {
            ctx.config.save(path)?;
            Some(path.clone())
        }
        _ => None,
    };

    info!(
        path = %ctx.config.database_path.display(),
        schema_version,
        "Store initialized"
    );

    Ok(InitReport {
        database_path: ctx.config.database_path.clone(),
        schema_version,
        theme,
        config_written,
    })
}

pub async fn status(ctx: &Context) -> CliResult<StatusReport> {
    let (schema_version, latest_version) = migration_status(ctx.db.pool()).await?;

    Ok(StatusReport {
        database_path: ctx.config.database_path.clone(),
        attachments_dir: ctx.db.attachments().root().to_path_buf(),
        export_dir: ctx.config.export_dir.clone(),
        schema_version,
        latest_version,
        categories: ctx.db.categories().count().await?,
        items: ctx.db.items().count().await?,
        shopping_entries: ctx.db.shopping_list().count().await?,
        theme: ctx.db.settings().theme().await?,
        healthy: ctx.db.health_check().await,
    })
}

/// Deletes all inventory data. Settings survive.
pub async fn wipe(ctx: &Context, confirm: bool) -> CliResult<WipeSummary> {
    if !confirm {
        return Err(ApiError::validation(
            "Refusing to wipe the inventory without --confirm",
        ));
    }
    Ok(ctx.db.wipe_inventory().await?)
}

// =============================================================================
// Rendering
// =============================================================================

pub fn render_init(report: &InitReport) -> String {
    let mut lines = vec![
        format!("Database: {}", report.database_path.display()),
        format!("Schema:   v{}", report.schema_version),
        format!("Theme:    {}", report.theme),
    ];
    if let Some(path) = &report.config_written {
        lines.push(format!("Wrote config to {}", path.display()));
    }
    lines.join("\n")
}

pub fn render_status(report: &StatusReport) -> String {
    let schema = if report.schema_version == report.latest_version {
        format!("v{} (current)", report.schema_version)
    } else {
        format!("v{} (latest v{})", report.schema_version, report.latest_version)
    };
    [
        format!("Database:     {}", report.database_path.display()),
        format!("Attachments:  {}", report.attachments_dir.display()),
        format!("Exports:      {}", report.export_dir.display()),
        format!("Schema:       {}", schema),
        format!("Categories:   {}", report.categories),
        format!("Items:        {}", report.items),
        format!("Shopping:     {}", report.shopping_entries),
        format!("Theme:        {}", report.theme),
        format!("Healthy:      {}", if report.healthy { "yes" } else { "no" }),
    ]
    .join("\n")
}

pub fn render_wipe(summary: &WipeSummary) -> String {
    format!(
        "Removed {} categories, {} items and {} shopping list entries",
        summary.categories, summary.items, summary.shopping_entries
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::context;
    use crate::error::ErrorCode;
    use partshop_core::NewItem;
    use partshop_db::migrations::LATEST_VERSION;

    #[tokio::test]
    async fn test_init_writes_config_once() {
        let (mut ctx, _dir) = context().await;
        ctx.config.theme = Some(ThemePreference::Dark);

        let report = init(&ctx).await.unwrap();
        assert_eq!(report.schema_version, LATEST_VERSION);
        assert_eq!(report.theme, ThemePreference::Dark);
        assert!(report.config_written.is_some());

        let again = init(&ctx).await.unwrap();
        assert!(again.config_written.is_none());
    }

    #[tokio::test]
    async fn test_status_counts() {
        let (ctx, _dir) = context().await;
        ctx.db.items().create(NewItem::new(1, "Relay").quantity(2)).await.unwrap();
        ctx.db.shopping_list().create(None, "Flux", 1).await.unwrap();

        let report = status(&ctx).await.unwrap();
        assert_eq!(report.categories, 1);
        assert_eq!(report.items, 1);
        assert_eq!(report.shopping_entries, 1);
        assert_eq!(report.schema_version, LATEST_VERSION);
        assert_eq!(report.latest_version, LATEST_VERSION);
        assert!(report.healthy);
        assert!(render_status(&report).contains("(current)"));
    }

    #[tokio::test]
    async fn test_wipe_requires_confirmation() {
        let (ctx, _dir) = context().await;
        ctx.db.items().create(NewItem::new(1, "Relay")).await.unwrap();

        let err = wipe(&ctx, false).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(ctx.db.items().count().await.unwrap(), 1);

        let summary = wipe(&ctx, true).await.unwrap();
        assert_eq!(summary.items, 1);
        assert_eq!(ctx.db.items().count().await.unwrap(), 0);
    }
}
