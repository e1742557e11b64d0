//! # Bulk Import / Export
//!
//! Moves inventory in and out as `category,name,quantity` CSV.
//!
//! ## Import
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  parse (partshop-core::csv)   bad header / no rows → ImportRejected    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN                                                                 │
//! │  for each row:                                                         │
//! │     SAVEPOINT                                                          │
//! │     INSERT OR IGNORE category                                          │
//! │     upsert item on (category_id, name):                                │
//! │         new      → quantity, image = category image                    │
//! │         existing → quantity = quantity + row quantity                  │
//! │     RELEASE  (or ROLLBACK TO on error, row counted as failed)          │
//! │  COMMIT                                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Import is additive: importing the same file twice doubles every quantity.
//!
//! ## Export
//! All items ordered by category then name, written without quoting, saved
//! as `partshop_export_<timestamp>.csv` and handed to a [`FileShare`].

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use sqlx::{Acquire, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use partshop_core::csv::{parse_inventory_csv, write_inventory_csv, ImportRow};
use partshop_core::validation::{validate_category_name, validate_item_name, validate_quantity};
use partshop_core::{ImportSummary, InventoryRow, ValidationError, MAX_QUANTITY};

use crate::error::{DbError, DbResult};

/// MIME type handed to the share collaborator.
pub const CSV_MIME_TYPE: &str = "text/csv";

/// Something that can take an exported file off our hands: a share sheet,
/// a sync folder, stdout.
pub trait FileShare: Send + Sync {
    /// Whether sharing can happen at all right now.
    fn is_available(&self) -> bool;

    /// Hands over the file at `path`.
    fn share(&self, path: &Path, mime_type: &str) -> std::io::Result<()>;
}

/// Where an export ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportOutcome {
    pub path: PathBuf,
    pub rows: usize,
}

/// Bulk import/export engine.
#[derive(Debug, Clone)]
pub struct TransferService {
    pool: SqlitePool,
}

impl TransferService {
    pub fn new(pool: SqlitePool) -> Self {
        TransferService { pool }
    }

    /// Reads a CSV file and imports it.
    ///
    /// ## Errors
    /// * `Io` - the file could not be read
    /// * `ImportRejected` - see [`TransferService::import_csv_text`]
    pub async fn import_file(&self, path: &Path) -> DbResult<ImportSummary> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DbError::Io(format!("{}: {e}", path.display())))?;

        info!(path = %path.display(), bytes = text.len(), "Importing CSV file");
        self.import_csv_text(&text).await
    }

    /// Imports CSV text, merging every row into the inventory.
    ///
    /// Row problems (blank name, wrong field count, a storage error on that
    /// row) are counted in `failed` and never abort the batch.
    ///
    /// ## Errors
    /// * `ImportRejected` - the header lacks a required column or there are
    ///   no data rows
    pub async fn import_csv_text(&self, text: &str) -> DbResult<ImportSummary> {
        let parsed = parse_inventory_csv(text).map_err(DbError::ImportRejected)?;

        let mut summary = ImportSummary {
            imported: 0,
            failed: parsed.error_count(),
        };

        for error in parsed.rows.iter().filter_map(|r| r.as_ref().err()) {
            warn!(line = error.line, reason = %error.reason, "Skipping CSV row");
        }

        let mut tx = self.pool.begin().await?;

        for row in parsed.valid_rows() {
            let mut savepoint = tx.begin().await?;

            match import_row(&mut savepoint, row).await {
                Ok(()) => {
                    savepoint.commit().await?;
                    summary.imported += 1;
                }
                Err(e) => {
                    warn!(line = row.line, name = %row.name, error = %e, "Import row failed");
                    savepoint.rollback().await?;
                    summary.failed += 1;
                }
            }
        }

        tx.commit().await?;

        info!(
            imported = summary.imported,
            failed = summary.failed,
            "CSV import complete"
        );
        Ok(summary)
    }

    /// All items as export rows, ordered by category then name.
    pub async fn inventory_rows(&self) -> DbResult<Vec<InventoryRow>> {
        let rows = sqlx::query_as::<_, InventoryRow>(
            r#"
            SELECT c.name AS category, i.name, i.quantity
            FROM items i
            JOIN categories c ON c.id = i.category_id
            ORDER BY c.name, i.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Serializes the whole inventory as CSV text.
    ///
    /// ## Errors
    /// * `NoData` - there are no items
    pub async fn export_csv(&self) -> DbResult<String> {
        let rows = self.inventory_rows().await?;
        if rows.is_empty() {
            return Err(DbError::NoData);
        }
        Ok(write_inventory_csv(&rows)?)
    }

    /// Writes the export into `dir` and hands it to `share`.
    ///
    /// ## Errors
    /// * `SharingUnavailable` - `share` is unavailable or refused the file
    /// * `NoData` - there are no items
    /// * `Io` - the file could not be written
    pub async fn export_to(&self, share: &dyn FileShare, dir: &Path) -> DbResult<ExportOutcome> {
        if !share.is_available() {
            return Err(DbError::SharingUnavailable(
                "no share target is available".to_string(),
            ));
        }

        let rows = self.inventory_rows().await?;
        if rows.is_empty() {
            return Err(DbError::NoData);
        }
        let text = write_inventory_csv(&rows)?;

        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(export_file_name());
        tokio::fs::write(&path, text.as_bytes())
            .await
            .map_err(|e| DbError::Io(format!("{}: {e}", path.display())))?;

        debug!(path = %path.display(), "Export file written");

        share
            .share(&path, CSV_MIME_TYPE)
            .map_err(|e| DbError::SharingUnavailable(e.to_string()))?;

        info!(path = %path.display(), rows = rows.len(), "Inventory exported");
        Ok(ExportOutcome {
            path,
            rows: rows.len(),
        })
    }
}

/// `partshop_export_<timestamp>.csv`
pub fn export_file_name() -> String {
    format!("partshop_export_{}.csv", Utc::now().format("%Y%m%d_%H%M%S_%3f"))
}

async fn import_row(conn: &mut SqliteConnection, row: &ImportRow) -> DbResult<()> {
    let category = validate_category_name(&row.category)?;
    let name = validate_item_name(&row.name)?;
    validate_quantity(row.quantity)?;

    sqlx::query("INSERT OR IGNORE INTO categories (name) VALUES (?)")
        .bind(&category)
        .execute(&mut *conn)
        .await?;

    let (category_id, category_image): (i64, Option<String>) =
        sqlx::query_as("SELECT id, image_uri FROM categories WHERE name = ?")
            .bind(&category)
            .fetch_one(&mut *conn)
            .await?;

    // A merge that would pass MAX_QUANTITY touches no row.
    let result = sqlx::query(
        r#"
        INSERT INTO items (category_id, name, quantity, image_uri)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(category_id, name) DO UPDATE SET quantity = quantity + excluded.quantity
        WHERE quantity + excluded.quantity <= ?
        "#,
    )
    .bind(category_id)
    .bind(&name)
    .bind(row.quantity)
    .bind(&category_image)
    .bind(MAX_QUANTITY)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 0,
            max: MAX_QUANTITY,
        }
        .into());
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
