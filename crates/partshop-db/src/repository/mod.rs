//! # Repository Module
//!
//! Typed access to the PartShop tables.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CLI command                                                           │
//! │       │  db.items().search("10k", None)                                │
//! │       ▼                                                                 │
//! │  ItemRepository                                                        │
//! │  ├── validate input (partshop-core)                                    │
//! │  ├── SQL on the pool, or on one transaction for multi-step writes     │
//! │  └── decode rows into Item via FromRow                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite                    AttachmentStore (after commit)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CategoryRepository`] - Categories, with reassignment on delete
//! - [`ItemRepository`] - Items and their attachments
//! - [`ShoppingListRepository`] - Pending purchases and the purchase merge
//! - [`SettingsRepository`] - Key/value settings such as the theme

pub mod category;
pub mod item;
pub mod settings;
pub mod shopping_list;

pub use category::CategoryRepository;
pub use item::ItemRepository;
pub use settings::SettingsRepository;
pub use shopping_list::ShoppingListRepository;

use sqlx::SqliteExecutor;

use crate::attachments::ReleaseQueue;
use crate::error::DbResult;

/// Returns true if any category or item row still points at `uri`.
///
/// Imported items share their category's image file, so a URI can have
/// several owners.
pub(crate) async fn attachment_in_use<'e, E>(executor: E, uri: &str) -> DbResult<bool>
where
    E: SqliteExecutor<'e>,
{
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT
            (SELECT COUNT(*) FROM categories WHERE image_uri = ?1)
          + (SELECT COUNT(*) FROM items WHERE image_uri = ?1 OR datasheet_uri = ?1)
        "#,
    )
    .bind(uri)
    .fetch_one(executor)
    .await?;

    Ok(count > 0)
}

/// Queues each candidate URI that no row references any more.
///
/// Run on the open transaction after the mutation, before commit.
pub(crate) async fn queue_unreferenced(
    conn: &mut sqlx::SqliteConnection,
    queue: &mut ReleaseQueue,
    candidates: impl IntoIterator<Item = String>,
) -> DbResult<()> {
    for uri in candidates {
        if !attachment_in_use(&mut *conn, &uri).await? {
            queue.push(uri);
        }
    }
    Ok(())
}
