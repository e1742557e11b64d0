//! # Settings Repository
//!
//! Key/value settings. The only well-known key today is `theme`.

use sqlx::SqlitePool;
use tracing::{debug, warn};

use partshop_core::{Setting, ThemePreference, ValidationError, THEME_SETTING_KEY};

use crate::error::DbResult;

/// Repository for application settings.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    /// Creates a new SettingsRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    pub async fn get(&self, key: &str) -> DbResult<Option<String>> {
        let value = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    /// Inserts or replaces a setting.
    pub async fn set(&self, key: &str, value: &str) -> DbResult<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(ValidationError::required("key").into());
        }

        debug!(key, value, "Saving setting");

        sqlx::query(
            r#"
            INSERT INTO settings (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list(&self) -> DbResult<Vec<Setting>> {
        let settings = sqlx::query_as::<_, Setting>("SELECT key, value FROM settings ORDER BY key")
            .fetch_all(&self.pool)
            .await?;
        Ok(settings)
    }

    /// The stored theme preference. Missing or unknown values read as `Auto`.
    pub async fn theme(&self) -> DbResult<ThemePreference> {
        let Some(raw) = self.get(THEME_SETTING_KEY).await? else {
            return Ok(ThemePreference::default());
        };

        match raw.parse() {
            Ok(theme) => Ok(theme),
            Err(_) => {
                warn!(value = %raw, "Unknown theme setting, using auto");
                Ok(ThemePreference::default())
            }
        }
    }

    pub async fn set_theme(&self, theme: ThemePreference) -> DbResult<()> {
        self.set(THEME_SETTING_KEY, theme.as_str()).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
