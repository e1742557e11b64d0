//! # Database Pool Management
//!
//! Connection pool creation and configuration for the PartShop store.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Storage Handle                                     │
//! │                                                                         │
//! │  CLI startup                                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbConfig::new(path) ← pool settings + attachments dir                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← pool + ensure_schema()                  │
//! │       │                                                                 │
//! │       ├── SqlitePool        (WAL, synchronous=NORMAL, foreign keys)    │
//! │       └── AttachmentStore   (<db dir>/attachments)                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  db.categories() / items() / shopping_list() / settings() / transfer() │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Single Writer
//! Every multi-step mutation opens one transaction with `pool.begin()` and
//! runs all of its statements on it. Nothing touches the pool while that
//! transaction is open, which keeps the single-connection in-memory store
//! used by tests deadlock-free.

use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use partshop_core::UNCATEGORIZED_ID;

use crate::attachments::AttachmentStore;
use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::category::CategoryRepository;
use crate::repository::item::ItemRepository;
use crate::repository::settings::SettingsRepository;
use crate::repository::shopping_list::ShoppingListRepository;
use crate::transfer::TransferService;

const IN_MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/partshop.db")
///     .attachments_dir("/path/to/attachments")
///     .max_connections(5);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Connection timeout duration.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Whether to bring the schema up to date on connect.
    /// Default: true
    pub run_migrations: bool,

    /// Root of the attachment store. `None` means `<db dir>/attachments`.
    pub attachments_dir: Option<PathBuf>,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    ///
    /// ## Arguments
    /// * `path` - Path to the SQLite database file. Will be created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
            attachments_dir: None,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Sets the attachment store root.
    pub fn attachments_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.attachments_dir = Some(dir.into());
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// Attachments go to a scratch directory under the system temp dir
    /// unless [`DbConfig::attachments_dir`] overrides it. The scratch
    /// directory is only created once a file is stored and is removed by
    /// [`Database::close`]; callers that drop the handle without closing it
    /// should pass their own `attachments_dir` (a `tempfile::TempDir`, say).
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(IN_MEMORY_PATH),
            max_connections: 1, // In-memory requires single connection
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            run_migrations: true,
            attachments_dir: None,
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY_PATH
    }

    /// The attachment root this configuration resolves to.
    ///
    /// In-memory configurations without an explicit directory get a new
    /// scratch path on every call.
    pub fn resolved_attachments_dir(&self) -> PathBuf {
        if let Some(dir) = &self.attachments_dir {
            return dir.clone();
        }
        if self.is_in_memory() {
            return std::env::temp_dir()
                .join(format!("partshop-attachments-{}", Uuid::new_v4().simple()));
        }
        self.database_path
            .parent()
            .map(|p| p.join("attachments"))
            .unwrap_or_else(|| PathBuf::from("attachments"))
    }
}

// =============================================================================
// Database
// =============================================================================

/// Counts removed by [`Database::wipe_inventory`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WipeSummary {
    pub categories: u64,
    pub items: u64,
    pub shopping_entries: u64,
}

/// Main database handle providing repository access.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("./partshop.db")).await?;
/// let caps = db.categories().create("Capacitors", None).await?;
/// db.items().create(NewItem::new(caps.id, "100nF").quantity(50)).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    /// The SQLite connection pool.
    pool: SqlitePool,

    /// Files referenced by category and item rows.
    attachments: AttachmentStore,

    /// The attachment root is a scratch dir this handle removes on close.
    scratch_attachments: bool,
}

impl Database {
    /// Opens (creating if needed) the store described by `config`.
    ///
    /// ## What This Does
    /// 1. Creates the database file and its directory if they don't exist
    /// 2. Configures SQLite: WAL, NORMAL synchronous, foreign keys on
    /// 3. Creates the connection pool
    /// 4. Brings the schema to the latest version (if enabled)
    /// 5. Prepares the attachment directories
    ///
    /// ## Returns
    /// * `Ok(Database)` - Ready-to-use database handle
    /// * `Err(DbError::SchemaFailure)` - Migration failed; the store is unusable
    /// * `Err(DbError)` - Connection failed
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        let connect_url = if config.is_in_memory() {
            "sqlite::memory:".to_string()
        } else {
            if let Some(parent) = config.database_path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
            // sqlite://path?mode=rwc creates the file if it doesn't exist
            format!("sqlite://{}?mode=rwc", config.database_path.display())
        };

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // SQLite has foreign keys disabled by default
            .foreign_keys(true)
            .create_if_missing(true);

        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let attachments = AttachmentStore::new(config.resolved_attachments_dir());
        if !config.is_in_memory() {
            attachments.ensure_dirs().await?;
        }
        debug!(root = %attachments.root().display(), "Attachment store ready");

        let scratch_attachments = config.is_in_memory() && config.attachments_dir.is_none();
        let db = Database {
            pool,
            attachments,
            scratch_attachments,
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Brings the schema to the latest version.
    ///
    /// Called by `new()` if `run_migrations` is true. Safe to call again.
    pub async fn run_migrations(&self) -> DbResult<u32> {
        let version = migrations::ensure_schema(&self.pool).await?;
        info!(version, "Schema ready");
        Ok(version)
    }

    /// Returns a reference to the connection pool.
    ///
    /// Prefer repository methods when available.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the attachment store.
    pub fn attachments(&self) -> &AttachmentStore {
        &self.attachments
    }

    /// Returns the category repository.
    pub fn categories(&self) -> CategoryRepository {
        CategoryRepository::new(self.pool.clone(), self.attachments.clone())
    }

    /// Returns the item repository.
    pub fn items(&self) -> ItemRepository {
        ItemRepository::new(self.pool.clone(), self.attachments.clone())
    }

    /// Returns the shopping list repository.
    pub fn shopping_list(&self) -> ShoppingListRepository {
        ShoppingListRepository::new(self.pool.clone())
    }

    /// Returns the settings repository.
    pub fn settings(&self) -> SettingsRepository {
        SettingsRepository::new(self.pool.clone())
    }

    /// Returns the bulk import/export service.
    pub fn transfer(&self) -> TransferService {
        TransferService::new(self.pool.clone())
    }

    /// Deletes all inventory data.
    ///
    /// Removes every shopping-list entry, item and category except
    /// Uncategorized (whose image is cleared) in one transaction, then
    /// empties the attachment directories. Settings are kept.
    pub async fn wipe_inventory(&self) -> DbResult<WipeSummary> {
        let mut tx = self.pool.begin().await?;

        let shopping_entries = sqlx::query("DELETE FROM shopping_list")
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let items = sqlx::query("DELETE FROM items")
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let categories = sqlx::query("DELETE FROM categories WHERE id != ?")
            .bind(UNCATEGORIZED_ID)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("UPDATE categories SET image_uri = NULL WHERE id = ?")
            .bind(UNCATEGORIZED_ID)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.attachments.purge_all().await;

        let summary = WipeSummary {
            categories,
            items,
            shopping_entries,
        };
        info!(?summary, "Inventory wiped");
        Ok(summary)
    }

    /// Closes the database connection pool.
    ///
    /// After calling close, all repository operations will fail.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;

        if self.scratch_attachments {
            let root = self.attachments.root();
            match tokio::fs::remove_dir_all(root).await {
                Ok(()) => debug!(root = %root.display(), "Scratch attachments removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(root = %root.display(), error = %e, "Failed to remove scratch attachments")
                }
            }
        }
    }

    /// Checks if the database is healthy (can execute queries).
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
