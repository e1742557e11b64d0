//! `partshop settings ...`

use clap::Subcommand;
use partshop_core::{Setting, ThemePreference};

use super::Context;
use crate::error::{ApiError, CliResult};

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    /// Print one setting
    Get { key: String },

    /// Store a setting
    Set { key: String, value: String },

    /// Print every setting
    List,

    /// Show the theme, or change it (auto, light, dark)
    Theme { value: Option<String> },
}

pub async fn run(ctx: &Context, command: SettingsCommand) -> CliResult<()> {
    let out = ctx.out;
    let repo = ctx.db.settings();
    match command {
        SettingsCommand::Get { key } => {
            let value = repo
                .get(&key)
                .await?
                .ok_or_else(|| ApiError::not_found("Setting", &key))?;
            out.emit(&Setting { key, value }, |s| s.value.clone())
        }
        SettingsCommand::Set { key, value } => {
            repo.set(&key, &value).await?;
            out.emit(&Setting { key, value }, |s| format!("{} = {}", s.key, s.value))
        }
        SettingsCommand::List => {
            let settings = repo.list().await?;
            out.emit(&settings, |s| {
                s.iter()
                    .map(|s| format!("{} = {}", s.key, s.value))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
        SettingsCommand::Theme { value } => {
            let theme = theme(ctx, value.as_deref()).await?;
            out.emit(&theme, |t| t.to_string())
        }
    }
}

/// Reads the theme, or parses and stores `value` first.
pub async fn theme(ctx: &Context, value: Option<&str>) -> CliResult<ThemePreference> {
    let repo = ctx.db.settings();
    if let Some(value) = value {
        let theme: ThemePreference = value.parse().map_err(|e: partshop_core::ValidationError| {
            ApiError::validation(e.to_string())
        })?;
        repo.set_theme(theme).await?;
    }
    Ok(repo.theme().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::context;
    use crate::error::ErrorCode;

    #[tokio::test]
    async fn test_theme_round_trip_through_store() {
        let (ctx, _dir) = context().await;
        assert_eq!(theme(&ctx, None).await.unwrap(), ThemePreference::Auto);
        assert_eq!(theme(&ctx, Some("Dark")).await.unwrap(), ThemePreference::Dark);
        assert_eq!(theme(&ctx, None).await.unwrap(), ThemePreference::Dark);
    }

    #[tokio::test]
    async fn test_unknown_theme_is_rejected() {
        let (ctx, _dir) = context().await;
        let err = theme(&ctx, Some("sepia")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let (ctx, _dir) = context().await;
        let err = run(&ctx, SettingsCommand::Get { key: "nope".into() })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }
}
