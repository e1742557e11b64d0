//! # Shopping List Repository
//!
//! Pending purchases, and the purchase operation that turns one into stock.
//!
//! ## Purchase Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    purchase(entry_id)   one transaction                 │
//! │                                                                         │
//! │  1. load entry                         missing → NotFound              │
//! │  2. target = entry.target_category_id, or 1 when NULL                  │
//! │  3. item with (target, entry.name)?                                    │
//! │       ├── yes → quantity += entry.target_quantity                      │
//! │       └── no  → INSERT item (quantity = entry.target_quantity)         │
//! │  4. DELETE entry                                                       │
//! │  5. COMMIT                                                             │
//! │                                                                         │
//! │  Any failure before 5 rolls back both the stock change and the delete. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{SqliteExecutor, SqlitePool};
use tracing::{debug, info};

use partshop_core::validation::{
    validate_item_name, validate_merged_quantity, validate_quantity, validate_search_query,
    validate_target_quantity,
};
use partshop_core::{PurchaseOutcome, ShoppingListEntry, UNCATEGORIZED_ID};

use crate::error::{DbError, DbResult};
use crate::repository::item::{fetch_item, fetch_item_by_key};

const ENTRY_SELECT: &str = r#"
    SELECT
        s.id,
        s.target_category_id,
        c.name AS category_name,
        s.name,
        COALESCE(s.target_quantity, 1) AS target_quantity,
        COALESCE(s.is_purchased, 0) AS is_purchased
    FROM shopping_list s
    LEFT JOIN categories c ON c.id = s.target_category_id
"#;

const ENTRY_ORDER: &str = "ORDER BY COALESCE(s.is_purchased, 0), s.id";

/// Repository for shopping list operations.
#[derive(Debug, Clone)]
pub struct ShoppingListRepository {
    pool: SqlitePool,
}

impl ShoppingListRepository {
    /// Creates a new ShoppingListRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ShoppingListRepository { pool }
    }

    /// Adds an entry. Duplicate names are allowed.
    ///
    /// ## Arguments
    /// * `category_id` - Where purchased units go; `None` means Uncategorized
    /// * `name` - Part name
    /// * `target_quantity` - Units to buy, at least 1
    pub async fn create(
        &self,
        category_id: Option<i64>,
        name: &str,
        target_quantity: i64,
    ) -> DbResult<ShoppingListEntry> {
        let name = validate_item_name(name)?;
        validate_target_quantity(target_quantity)?;

        debug!(?category_id, name = %name, target_quantity, "Adding shopping list entry");

        let result = sqlx::query(
            "INSERT INTO shopping_list (target_category_id, name, target_quantity) VALUES (?, ?, ?)",
        )
        .bind(category_id)
        .bind(&name)
        .bind(target_quantity)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::ForeignKeyViolation { .. } => {
                DbError::not_found("Category", category_id.unwrap_or(UNCATEGORIZED_ID))
            }
            other => other,
        })?;

        self.get_by_id(result.last_insert_rowid()).await
    }

    /// Gets an entry by its ID.
    pub async fn get_by_id(&self, id: i64) -> DbResult<ShoppingListEntry> {
        fetch_entry(&self.pool, id)
            .await?
            .ok_or_else(|| DbError::not_found("Shopping list entry", id))
    }

    /// Lists all entries, unpurchased first, then in insertion order.
    pub async fn list(&self) -> DbResult<Vec<ShoppingListEntry>> {
        let sql = format!("{ENTRY_SELECT} {ENTRY_ORDER}");
        let entries = sqlx::query_as::<_, ShoppingListEntry>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    /// Case-insensitive substring search on entry name or category name.
    pub async fn search(&self, query: &str) -> DbResult<Vec<ShoppingListEntry>> {
        let query = validate_search_query(query)?;

        let sql = format!(
            "{ENTRY_SELECT} \
             WHERE instr(lower(s.name), lower(?1)) > 0 \
                OR instr(lower(COALESCE(c.name, '')), lower(?1)) > 0 \
             {ENTRY_ORDER}"
        );
        let entries = sqlx::query_as::<_, ShoppingListEntry>(&sql)
            .bind(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM shopping_list")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Removes an entry. Returns false if it did not exist.
    pub async fn delete(&self, id: i64) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM shopping_list WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        debug!(id, deleted = result.rows_affected(), "Shopping list entry removed");
        Ok(result.rows_affected() > 0)
    }

    /// Moves an entry into inventory.
    ///
    /// Merges into the item with the same `(category, name)` if there is
    /// one, otherwise creates it, and deletes the entry. Both happen or
    /// neither does.
    ///
    /// ## Errors
    /// * `NotFound` - no such entry
    /// * `Validation` - the restocked quantity would exceed `MAX_QUANTITY`;
    ///   the entry stays on the list
    pub async fn purchase(&self, id: i64) -> DbResult<PurchaseOutcome> {
        let mut tx = self.pool.begin().await?;

        let entry = fetch_entry(&mut *tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Shopping list entry", id))?;

        let category_id = entry.resolved_category_id();

        let (item_id, merged) = match fetch_item_by_key(&mut *tx, category_id, &entry.name).await? {
            Some(existing) => {
                let quantity = validate_merged_quantity(existing.quantity, entry.target_quantity)?;
                sqlx::query("UPDATE items SET quantity = ? WHERE id = ?")
                    .bind(quantity)
                    .bind(existing.id)
                    .execute(&mut *tx)
                    .await?;
                (existing.id, true)
            }
            None => {
                validate_quantity(entry.target_quantity)?;
                let result = sqlx::query(
                    "INSERT INTO items (category_id, name, quantity) VALUES (?, ?, ?)",
                )
                .bind(category_id)
                .bind(&entry.name)
                .bind(entry.target_quantity)
                .execute(&mut *tx)
                .await?;
                (result.last_insert_rowid(), false)
            }
        };

        sqlx::query("DELETE FROM shopping_list WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let item = fetch_item(&mut *tx, item_id)
            .await?
            .ok_or_else(|| DbError::not_found("Item", item_id))?;

        tx.commit().await?;

        info!(
            entry_id = id,
            item_id,
            merged,
            added = entry.target_quantity,
            "Shopping list entry purchased"
        );
        Ok(PurchaseOutcome { item, merged })
    }
}

async fn fetch_entry<'e, E>(executor: E, id: i64) -> DbResult<Option<ShoppingListEntry>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("{ENTRY_SELECT} WHERE s.id = ?");
    let entry = sqlx::query_as::<_, ShoppingListEntry>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(entry)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::error::{DbError, ErrorKind};
    use crate::pool::{Database, DbConfig};
    use partshop_core::{NewItem, MAX_QUANTITY, UNCATEGORIZED_ID};

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_allows_duplicates() {
        let db = db().await;
        let list = db.shopping_list();
        let a = list.create(None, "Solder", 1).await.unwrap();
        let b = list.create(None, "Solder", 2).await.unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(a.category_name, None);
        assert_eq!(list.count().await.unwrap(), 2);

        assert!(matches!(
            list.create(None, "Solder", 0).await,
            Err(DbError::Validation(_))
        ));
        assert!(matches!(
            list.create(Some(77), "Solder", 1).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_purchase_merges_into_existing_item() {
        let db = db().await;
        let caps = db.categories().create("Caps", None).await.unwrap();
        let item = db
            .items()
            .create(NewItem::new(caps.id, "100nF").quantity(5))
            .await
            .unwrap();
        let entry = db.shopping_list().create(Some(caps.id), "100nF", 3).await.unwrap();

        let outcome = db.shopping_list().purchase(entry.id).await.unwrap();
        assert!(outcome.merged);
        assert_eq!(outcome.item.id, item.id);
        assert_eq!(outcome.item.quantity, 8);
        assert_eq!(db.shopping_list().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_purchase_creates_item_in_uncategorized() {
        let db = db().await;
        let entry = db.shopping_list().create(None, "Flux pen", 2).await.unwrap();

        let outcome = db.shopping_list().purchase(entry.id).await.unwrap();
        assert!(!outcome.merged);
        assert_eq!(outcome.item.category_id, UNCATEGORIZED_ID);
        assert_eq!(outcome.item.quantity, 2);

        assert!(matches!(
            db.shopping_list().purchase(entry.id).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_purchase_at_quantity_ceiling() {
        let db = db().await;
        let item = db
            .items()
            .create(NewItem::new(UNCATEGORIZED_ID, "Header pins").quantity(MAX_QUANTITY - 2))
            .await
            .unwrap();
        let fits = db.shopping_list().create(None, "Header pins", 2).await.unwrap();
        let overflows = db.shopping_list().create(None, "Header pins", 1).await.unwrap();

        let outcome = db.shopping_list().purchase(fits.id).await.unwrap();
        assert_eq!(outcome.item.quantity, MAX_QUANTITY);

        let err = db.shopping_list().purchase(overflows.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);

        // Rolled back: the entry is still listed and the item is readable.
        assert_eq!(db.shopping_list().count().await.unwrap(), 1);
        let item = db.items().get_by_id(item.id).await.unwrap();
        assert_eq!(item.quantity, MAX_QUANTITY);

        assert!(matches!(
            db.shopping_list().create(None, "Header pins", MAX_QUANTITY + 1).await,
            Err(DbError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_list_search_delete() {
        let db = db().await;
        let caps = db.categories().create("Capacitors", None).await.unwrap();
        let list = db.shopping_list();
        let first = list.create(Some(caps.id), "10uF", 4).await.unwrap();
        list.create(None, "Wire", 1).await.unwrap();

        let all = list.list().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, first.id);
        assert_eq!(all[0].category_name.as_deref(), Some("Capacitors"));

        // Category name matches too.
        assert_eq!(list.search("CAPAC").await.unwrap().len(), 1);
        assert_eq!(list.search("wire").await.unwrap().len(), 1);

        assert!(list.delete(first.id).await.unwrap());
        assert!(!list.delete(first.id).await.unwrap());
    }
}
