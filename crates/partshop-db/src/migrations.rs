//! # Schema Migrations
//!
//! Versioned schema evolution for the PartShop store.
//!
//! ## How Migrations Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Migration Process                                  │
//! │                                                                         │
//! │  Database::new()                                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Read PRAGMA user_version (V)                                          │
//! │       │                                                                 │
//! │       ├── V = 0, no tables   → create latest shape, V = LATEST         │
//! │       ├── V = 0, has tables  → pre-versioning store, treat as V = 1    │
//! │       ├── V > LATEST         → SchemaFailure (written by newer build)  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Loop: step with from_version == V?                                    │
//! │       ├── yes → BEGIN; seed; statements; user_version = V+1; COMMIT    │
//! │       └── no  → done                                                   │
//! │                                                                         │
//! │  1 → 2  add_category_images                                            │
//! │  2 → 3  add_item_images                                                │
//! │  3 → 4  unique_item_names   (shadow-table rebuild, merges duplicates)  │
//! │  4 → 5  settings_table                                                 │
//! │  5 → 6  reassign_orphans    (rows pointing at deleted categories)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Adding New Migrations
//!
//! 1. Append a [`Migration`] to [`MIGRATIONS`] with `from_version = LATEST_VERSION`
//! 2. Bump [`LATEST_VERSION`]
//! 3. Update [`BASELINE`] so fresh stores get the same shape directly
//! 4. **NEVER** edit a step that has shipped

use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};

/// Schema version a fresh store is created at.
pub const LATEST_VERSION: u32 = 6;

/// Version assumed for a store that has tables but no version marker.
const LEGACY_VERSION: u32 = 1;

/// One schema change.
#[derive(Debug, Clone, Copy)]
pub enum Statement {
    /// Plain DDL/DML.
    Exec(&'static str),

    /// `ALTER TABLE .. ADD COLUMN ..`, skipped if the column already exists.
    AddColumn {
        table: &'static str,
        column: &'static str,
        definition: &'static str,
    },
}

/// A named, ordered upgrade step from `from_version` to `from_version + 1`.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub from_version: u32,
    pub name: &'static str,
    pub statements: &'static [Statement],
}

// =============================================================================
// Schema
// =============================================================================

const SEED_UNCATEGORIZED: &str =
    "INSERT OR IGNORE INTO categories (id, name) VALUES (1, 'Uncategorized')";

const SEED_THEME: &str = "INSERT OR IGNORE INTO settings (key, value) VALUES ('theme', 'auto')";

const CREATE_ITEMS_SHADOW: &str = "CREATE TABLE items_new (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    category_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    quantity INTEGER NOT NULL DEFAULT 0,
    datasheet_uri TEXT,
    image_uri TEXT,
    FOREIGN KEY (category_id) REFERENCES categories (id),
    UNIQUE (category_id, name)
)";

/// Copies items into `items_new`, one row per `(category, name)`.
///
/// Rows whose category no longer exists land in Uncategorized. Colliding
/// rows keep the lowest id, sum their quantities and keep any non-null
/// attachment (MAX() ignores NULLs).
const MERGE_ITEMS_INTO_SHADOW: &str =
    "INSERT INTO items_new (id, category_id, name, quantity, datasheet_uri, image_uri)
     SELECT MIN(id),
            CASE WHEN category_id IN (SELECT id FROM categories) THEN category_id ELSE 1 END
                AS owner,
            name, SUM(COALESCE(quantity, 0)), MAX(datasheet_uri), MAX(image_uri)
     FROM items
     GROUP BY owner, name";

/// Swaps the merged shadow table in for `items`.
const REBUILD_ITEMS: &[Statement] = &[
    Statement::Exec("DROP TABLE IF EXISTS items_new"),
    Statement::Exec(CREATE_ITEMS_SHADOW),
    Statement::Exec(MERGE_ITEMS_INTO_SHADOW),
    Statement::Exec("DROP TABLE items"),
    Statement::Exec("ALTER TABLE items_new RENAME TO items"),
    Statement::Exec("CREATE INDEX IF NOT EXISTS idx_items_category ON items (category_id)"),
];

/// Latest shape, applied in one transaction to an empty store.
pub const BASELINE: &[Statement] = &[
    Statement::Exec(
        "CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            image_uri TEXT
        )",
    ),
    Statement::Exec(
        "CREATE TABLE IF NOT EXISTS items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            category_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            quantity INTEGER NOT NULL DEFAULT 0,
            datasheet_uri TEXT,
            image_uri TEXT,
            FOREIGN KEY (category_id) REFERENCES categories (id),
            UNIQUE (category_id, name)
        )",
    ),
    Statement::Exec("CREATE INDEX IF NOT EXISTS idx_items_category ON items (category_id)"),
    Statement::Exec(
        "CREATE TABLE IF NOT EXISTS shopping_list (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            target_category_id INTEGER,
            name TEXT NOT NULL,
            target_quantity INTEGER DEFAULT 1,
            is_purchased BOOLEAN DEFAULT 0,
            FOREIGN KEY (target_category_id) REFERENCES categories (id)
        )",
    ),
    Statement::Exec(
        "CREATE INDEX IF NOT EXISTS idx_shopping_list_category ON shopping_list (target_category_id)",
    ),
    Statement::Exec(
        "CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
    ),
    Statement::Exec(SEED_THEME),
];

/// Upgrade steps, ordered by `from_version`.
pub static MIGRATIONS: &[Migration] = &[
    Migration {
        from_version: 1,
        name: "add_category_images",
        statements: &[Statement::AddColumn {
            table: "categories",
            column: "image_uri",
            definition: "TEXT",
        }],
    },
    Migration {
        from_version: 2,
        name: "add_item_images",
        statements: &[Statement::AddColumn {
            table: "items",
            column: "image_uri",
            definition: "TEXT",
        }],
    },
    Migration {
        from_version: 3,
        name: "unique_item_names",
        statements: REBUILD_ITEMS,
    },
    Migration {
        from_version: 4,
        name: "settings_table",
        statements: &[
            Statement::Exec(
                "CREATE TABLE IF NOT EXISTS settings (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                )",
            ),
            Statement::Exec(SEED_THEME),
            Statement::Exec(
                "CREATE INDEX IF NOT EXISTS idx_shopping_list_category ON shopping_list (target_category_id)",
            ),
        ],
    },
    // Deleting a category used to leave its shopping list entries (and
    // sometimes items) pointing at the missing id.
    Migration {
        from_version: 5,
        name: "reassign_orphans",
        statements: &[
            Statement::Exec("DROP TABLE IF EXISTS items_new"),
            Statement::Exec(CREATE_ITEMS_SHADOW),
            Statement::Exec(MERGE_ITEMS_INTO_SHADOW),
            Statement::Exec("DROP TABLE items"),
            Statement::Exec("ALTER TABLE items_new RENAME TO items"),
            Statement::Exec("CREATE INDEX IF NOT EXISTS idx_items_category ON items (category_id)"),
            Statement::Exec(
                "UPDATE shopping_list SET target_category_id = 1
                 WHERE target_category_id IS NOT NULL
                   AND target_category_id NOT IN (SELECT id FROM categories)",
            ),
        ],
    },
];

// =============================================================================
// Runner
// =============================================================================

/// Brings the store to [`LATEST_VERSION`].
///
/// ## What This Does
/// - Creates the latest shape on an empty store
/// - Otherwise applies every pending step in order, one transaction each
/// - Seeds the Uncategorized row before each step, so rows can be moved
///   into it with foreign keys enforced
///
/// ## Safety
/// - Idempotent: a second call finds no applicable step
/// - Crash-safe: a step and its version bump commit together
///
/// ## Returns
/// The version the store ends at.
pub async fn ensure_schema(pool: &SqlitePool) -> DbResult<u32> {
    let mut version = schema_version(pool).await?;

    if version > LATEST_VERSION {
        return Err(DbError::SchemaFailure(format!(
            "store is at version {version}, this build supports up to {LATEST_VERSION}"
        )));
    }

    if version == 0 {
        if has_table(pool, "categories").await? {
            info!("Unversioned store found, treating it as version {LEGACY_VERSION}");
            version = LEGACY_VERSION;
        } else {
            create_baseline(pool).await?;
            return Ok(LATEST_VERSION);
        }
    }

    while let Some(step) = MIGRATIONS.iter().find(|m| m.from_version == version) {
        apply_step(pool, step).await?;
        version = step.from_version + 1;
    }

    debug!(version, "Schema up to date");
    Ok(version)
}

/// Reads `PRAGMA user_version`.
pub async fn schema_version(pool: &SqlitePool) -> DbResult<u32> {
    let version: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await
        .map_err(|e| DbError::SchemaFailure(e.to_string()))?;

    u32::try_from(version)
        .map_err(|_| DbError::SchemaFailure(format!("invalid schema version {version}")))
}

/// Returns information about migrations.
///
/// ## Returns
/// Tuple of (current_version, latest_version)
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(u32, u32)> {
    Ok((schema_version(pool).await?, LATEST_VERSION))
}

async fn has_table(pool: &SqlitePool, name: &str) -> DbResult<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(name)
            .fetch_one(pool)
            .await
            .map_err(|e| DbError::SchemaFailure(e.to_string()))?;
    Ok(count > 0)
}

async fn create_baseline(pool: &SqlitePool) -> DbResult<()> {
    info!(version = LATEST_VERSION, "Creating schema");

    let mut tx = pool.begin().await.map_err(schema_err)?;
    for statement in BASELINE {
        run_statement(&mut tx, statement).await?;
    }
    finish(&mut tx, LATEST_VERSION).await?;
    tx.commit().await.map_err(schema_err)?;

    Ok(())
}

async fn apply_step(pool: &SqlitePool, step: &Migration) -> DbResult<()> {
    let target = step.from_version + 1;
    info!(from = step.from_version, to = target, name = step.name, "Applying migration");

    let mut tx = pool.begin().await.map_err(schema_err)?;
    sqlx::query(SEED_UNCATEGORIZED)
        .execute(&mut *tx)
        .await
        .map_err(schema_err)?;

    for statement in step.statements {
        run_statement(&mut tx, statement).await.map_err(|e| match e {
            DbError::SchemaFailure(msg) => DbError::SchemaFailure(format!("{}: {msg}", step.name)),
            other => other,
        })?;
    }
    finish(&mut tx, target).await?;
    tx.commit().await.map_err(schema_err)?;

    Ok(())
}

async fn run_statement(tx: &mut Transaction<'_, Sqlite>, statement: &Statement) -> DbResult<()> {
    match *statement {
        Statement::Exec(sql) => {
            sqlx::query(sql).execute(&mut **tx).await.map_err(schema_err)?;
        }
        Statement::AddColumn {
            table,
            column,
            definition,
        } => {
            let sql = format!("ALTER TABLE {table} ADD COLUMN {column} {definition}");
            match sqlx::query(&sql).execute(&mut **tx).await {
                Ok(_) => {}
                Err(e) if e.to_string().contains("duplicate column name") => {
                    debug!(table, column, "Column already present");
                }
                Err(e) => return Err(schema_err(e)),
            }
        }
    }
    Ok(())
}

/// Re-seeds Uncategorized and records the new version.
async fn finish(tx: &mut Transaction<'_, Sqlite>, version: u32) -> DbResult<()> {
    sqlx::query(SEED_UNCATEGORIZED)
        .execute(&mut **tx)
        .await
        .map_err(schema_err)?;

    // PRAGMA does not take bound parameters.
    sqlx::query(&format!("PRAGMA user_version = {version}"))
        .execute(&mut **tx)
        .await
        .map_err(schema_err)?;

    Ok(())
}

fn schema_err(err: sqlx::Error) -> DbError {
    DbError::SchemaFailure(err.to_string())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn raw_pool() -> SqlitePool {
        let db = Database::new(DbConfig::in_memory().run_migrations(false))
            .await
            .unwrap();
        db.pool().clone()
    }

    #[test]
    fn test_steps_are_contiguous() {
        for (i, step) in MIGRATIONS.iter().enumerate() {
            assert_eq!(step.from_version, LEGACY_VERSION + i as u32);
        }
        let last = MIGRATIONS.last().unwrap();
        assert_eq!(last.from_version + 1, LATEST_VERSION);
    }

    #[tokio::test]
    async fn test_fresh_store_gets_latest_shape() {
        let pool = raw_pool().await;

        assert_eq!(ensure_schema(&pool).await.unwrap(), LATEST_VERSION);
        assert_eq!(
            migration_status(&pool).await.unwrap(),
            (LATEST_VERSION, LATEST_VERSION)
        );

        let name: String = sqlx::query_scalar("SELECT name FROM categories WHERE id = 1")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(name, "Uncategorized");

        let theme: String = sqlx::query_scalar("SELECT value FROM settings WHERE key = 'theme'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(theme, "auto");
    }

    #[tokio::test]
    async fn test_ensure_schema_is_idempotent() {
        let pool = raw_pool().await;
        ensure_schema(&pool).await.unwrap();
        assert_eq!(ensure_schema(&pool).await.unwrap(), LATEST_VERSION);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_newer_store_is_rejected() {
        let pool = raw_pool().await;
        sqlx::query("PRAGMA user_version = 99")
            .execute(&pool)
            .await
            .unwrap();

        assert!(matches!(
            ensure_schema(&pool).await,
            Err(DbError::SchemaFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_add_column_tolerates_existing_column() {
        let pool = raw_pool().await;
        ensure_schema(&pool).await.unwrap();

        // Pretend the store is at v1 although image columns already exist.
        sqlx::query("PRAGMA user_version = 1")
            .execute(&pool)
            .await
            .unwrap();

        assert_eq!(ensure_schema(&pool).await.unwrap(), LATEST_VERSION);
    }
}
