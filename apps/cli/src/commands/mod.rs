//! # CLI Commands
//!
//! One module per command group. Each command function returns the value it
//! produced so it can be tested without capturing stdout; the `run`
//! function of each group prints it through [`Output`].
//!
//! ## Command Organization
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          partshop <command>                             │
//! │                                                                         │
//! │  store.rs       init, status, wipe                                      │
//! │  category.rs    category add/list/show/search/rename/delete             │
//! │  item.rs        item add/list/search/show/update/delete/adjust/attach   │
//! │  shopping.rs    shop add/list/search/remove/buy                         │
//! │  transfer.rs    import, export                                          │
//! │  settings.rs    settings get/set/list/theme                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod category;
pub mod item;
pub mod settings;
pub mod shopping;
pub mod store;
pub mod transfer;

use std::path::{Path, PathBuf};

use partshop_db::{AttachmentKind, Database, DbError, DbResult};
use serde::Serialize;

use crate::config::AppConfig;
use crate::error::{ApiError, CliResult};

// =============================================================================
// Context
// =============================================================================

/// Everything a command needs.
pub struct Context {
    pub db: Database,
    pub config: AppConfig,

    /// Config file `init` writes to when none exists yet.
    pub config_path: Option<PathBuf>,

    pub out: Output,
}

// =============================================================================
// Output
// =============================================================================

/// Prints results as plain text or JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    json: bool,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Output { json }
    }

    /// Prints `value` as pretty JSON, or as the text `render` produces.
    pub fn emit<T, F>(&self, value: &T, render: F) -> CliResult<()>
    where
        T: Serialize + ?Sized,
        F: FnOnce(&T) -> String,
    {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            let text = render(value);
            if !text.is_empty() {
                println!("{}", text);
            }
        }
        Ok(())
    }

    pub fn error(&self, err: &ApiError) {
        if self.json {
            match serde_json::to_string(err) {
                Ok(json) => eprintln!("{}", json),
                Err(_) => eprintln!("{}", err),
            }
        } else {
            eprintln!("{}", err);
        }
    }
}

// =============================================================================
// Attachment Helpers
// =============================================================================

/// Copies a picked file into the attachment store.
pub(crate) async fn stage_attachment(
    db: &Database,
    kind: AttachmentKind,
    path: Option<&Path>,
) -> CliResult<Option<String>> {
    match path {
        Some(path) => {
            let uri = db
                .attachments()
                .import_file(kind, path)
                .await
                .map_err(DbError::from)?;
            Ok(Some(uri))
        }
        None => Ok(None),
    }
}

/// Passes `result` through, removing freshly staged files if it failed.
pub(crate) async fn discard_on_error<T>(
    db: &Database,
    staged: &[Option<String>],
    result: DbResult<T>,
) -> CliResult<T> {
    if result.is_err() {
        for uri in staged.iter().flatten() {
            db.attachments().release(uri).await;
        }
    }
    Ok(result?)
}

/// Outcome of a delete. Deleting something already gone is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Deleted {
    pub id: i64,
    pub deleted: bool,
}

impl Deleted {
    pub fn render(&self, resource: &str) -> String {
        if self.deleted {
            format!("Deleted {} #{}", resource, self.id)
        } else {
            format!("No {} #{}; nothing to delete", resource, self.id)
        }
    }
}

/// `-` for a missing attachment, the file name otherwise.
pub(crate) fn short_uri(uri: Option<&str>) -> String {
    match uri {
        Some(uri) => uri.rsplit('/').next().unwrap_or(uri).to_string(),
        None => "-".to_string(),
    }
}
