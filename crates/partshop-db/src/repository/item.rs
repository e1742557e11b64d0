//! # Item Repository
//!
//! Database operations for inventory items.
//!
//! ## Attachment Handling
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  update(id, image = new.png)                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN                                                                 │
//! │  UPDATE items SET image_uri = new.png                                  │
//! │  old.png still referenced elsewhere?  ── yes → keep                    │
//! │       │ no                                                              │
//! │       ▼                                                                 │
//! │  queue old.png                                                         │
//! │  COMMIT ──► release old.png                                            │
//! │                                                                         │
//! │  A failed update rolls back and the old file is never touched.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{SqliteExecutor, SqlitePool};
use tracing::debug;

use partshop_core::validation::{
    validate_item_name, validate_merged_quantity, validate_quantity, validate_search_query,
};
use partshop_core::{Item, ItemUpdate, NewItem};

use crate::attachments::{AttachmentStore, ReleaseQueue};
use crate::error::{DbError, DbResult};
use crate::repository::queue_unreferenced;

pub(crate) const ITEM_SELECT: &str = r#"
    SELECT
        i.id,
        i.category_id,
        i.name,
        i.quantity,
        i.datasheet_uri,
        i.image_uri,
        c.name AS category_name,
        c.image_uri AS category_image_uri
    FROM items i
    JOIN categories c ON c.id = i.category_id
"#;

/// Repository for item database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.items();
/// let item = repo.create(NewItem::new(caps.id, "100nF").quantity(50)).await?;
/// let item = repo.adjust_quantity(item.id, -5).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ItemRepository {
    pool: SqlitePool,
    attachments: AttachmentStore,
}

impl ItemRepository {
    /// Creates a new ItemRepository.
    pub fn new(pool: SqlitePool, attachments: AttachmentStore) -> Self {
        ItemRepository { pool, attachments }
    }

    /// Gets an item by its ID.
    ///
    /// ## Returns
    /// * `Ok(Item)` - Item found
    /// * `Err(DbError::NotFound)` - No such item
    pub async fn get_by_id(&self, id: i64) -> DbResult<Item> {
        fetch_item(&self.pool, id)
            .await?
            .ok_or_else(|| DbError::not_found("Item", id))
    }

    /// Finds the item with the given `(category, name)` key.
    pub async fn find_by_key(&self, category_id: i64, name: &str) -> DbResult<Option<Item>> {
        fetch_item_by_key(&self.pool, category_id, name.trim()).await
    }

    /// Lists every item, ordered by name.
    pub async fn list(&self) -> DbResult<Vec<Item>> {
        let sql = format!("{ITEM_SELECT} ORDER BY i.name COLLATE NOCASE, i.id");
        let items = sqlx::query_as::<_, Item>(&sql).fetch_all(&self.pool).await?;
        Ok(items)
    }

    /// Lists the items filed under one category, ordered by name.
    pub async fn list_by_category(&self, category_id: i64) -> DbResult<Vec<Item>> {
        let sql = format!(
            "{ITEM_SELECT} WHERE i.category_id = ? ORDER BY i.name COLLATE NOCASE, i.id"
        );
        let items = sqlx::query_as::<_, Item>(&sql)
            .bind(category_id)
            .fetch_all(&self.pool)
            .await?;

        debug!(category_id, count = items.len(), "Listed items");
        Ok(items)
    }

    /// Case-insensitive substring search on item name or category name,
    /// optionally scoped to one category.
    ///
    /// ## Arguments
    /// * `query` - Search term; empty matches everything
    /// * `category_id` - Restrict results to this category
    pub async fn search(&self, query: &str, category_id: Option<i64>) -> DbResult<Vec<Item>> {
        let query = validate_search_query(query)?;

        debug!(query = %query, ?category_id, "Searching items");

        let sql = format!(
            "{ITEM_SELECT} \
             WHERE (instr(lower(i.name), lower(?1)) > 0 OR instr(lower(c.name), lower(?1)) > 0) \
               AND (?2 IS NULL OR i.category_id = ?2) \
             ORDER BY i.name COLLATE NOCASE, i.id"
        );
        let items = sqlx::query_as::<_, Item>(&sql)
            .bind(&query)
            .bind(category_id)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = items.len(), "Search returned items");
        Ok(items)
    }

    /// Number of items across all categories.
    pub async fn count(&self) -> DbResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Creates an item.
    ///
    /// Direct adds never merge: an existing `(category, name)` is reported
    /// as a `ConstraintViolation`.
    ///
    /// ## Errors
    /// * `Validation` - empty name or negative quantity
    /// * `NotFound` - the category does not exist
    /// * `ConstraintViolation` - the `(category, name)` pair is taken
    pub async fn create(&self, item: NewItem) -> DbResult<Item> {
        let name = validate_item_name(&item.name)?;
        validate_quantity(item.quantity)?;

        debug!(category_id = item.category_id, name = %name, "Creating item");

        ensure_category(&self.pool, item.category_id).await?;

        let result = sqlx::query(
            r#"
            INSERT INTO items (category_id, name, quantity, datasheet_uri, image_uri)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(item.category_id)
        .bind(&name)
        .bind(item.quantity)
        .bind(&item.datasheet_uri)
        .bind(&item.image_uri)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from(e).with_duplicate("item name", &name))?;

        self.get_by_id(result.last_insert_rowid()).await
    }

    /// Replaces an item's editable fields.
    ///
    /// Attachments that change are released after the row commits.
    ///
    /// ## Errors
    /// * `NotFound` - no such item, or the target category does not exist
    /// * `ConstraintViolation` - the new `(category, name)` pair is taken
    pub async fn update(&self, id: i64, update: ItemUpdate) -> DbResult<Item> {
        let name = validate_item_name(&update.name)?;
        validate_quantity(update.quantity)?;

        debug!(id, name = %name, "Updating item");

        let mut tx = self.pool.begin().await?;

        let existing = fetch_item(&mut *tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Item", id))?;

        let category_id = update.category_id.unwrap_or(existing.category_id);
        if category_id != existing.category_id {
            ensure_category(&mut *tx, category_id).await?;
        }

        sqlx::query(
            r#"
            UPDATE items
            SET category_id = ?, name = ?, quantity = ?, datasheet_uri = ?, image_uri = ?
            WHERE id = ?
            "#,
        )
        .bind(category_id)
        .bind(&name)
        .bind(update.quantity)
        .bind(&update.datasheet_uri)
        .bind(&update.image_uri)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::from(e).with_duplicate("item name", &name))?;

        let mut candidates = Vec::new();
        if existing.datasheet_uri != update.datasheet_uri {
            candidates.extend(existing.datasheet_uri);
        }
        if existing.image_uri != update.image_uri {
            candidates.extend(existing.image_uri);
        }

        let mut queue = ReleaseQueue::new();
        queue_unreferenced(&mut tx, &mut queue, candidates).await?;

        let updated = fetch_item(&mut *tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Item", id))?;

        tx.commit().await?;
        queue.flush(&self.attachments).await;

        Ok(updated)
    }

    /// Adds `delta` to the on-hand quantity, clamping at zero.
    ///
    /// ## Errors
    /// * `DbError::NotFound` - No such item
    /// * `DbError::Validation` - The result would exceed `MAX_QUANTITY`
    pub async fn adjust_quantity(&self, id: i64, delta: i64) -> DbResult<Item> {
        debug!(id, delta, "Adjusting quantity");

        let mut tx = self.pool.begin().await?;

        let existing = fetch_item(&mut *tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Item", id))?;

        let quantity = if delta >= 0 {
            validate_merged_quantity(existing.quantity, delta)?
        } else {
            existing.quantity.saturating_add(delta).max(0)
        };

        sqlx::query("UPDATE items SET quantity = ? WHERE id = ?")
            .bind(quantity)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let updated = fetch_item(&mut *tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Item", id))?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Deletes an item and releases its attachments.
    ///
    /// ## Returns
    /// * `Ok(true)` - deleted
    /// * `Ok(false)` - no such item (nothing changed)
    pub async fn delete(&self, id: i64) -> DbResult<bool> {
        let mut tx = self.pool.begin().await?;

        let Some(existing) = fetch_item(&mut *tx, id).await? else {
            return Ok(false);
        };

        sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let candidates = existing
            .datasheet_uri
            .into_iter()
            .chain(existing.image_uri);

        let mut queue = ReleaseQueue::new();
        queue_unreferenced(&mut tx, &mut queue, candidates).await?;

        tx.commit().await?;
        let released = queue.flush(&self.attachments).await;

        debug!(id, released, "Item deleted");
        Ok(true)
    }
}

pub(crate) async fn fetch_item<'e, E>(executor: E, id: i64) -> DbResult<Option<Item>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("{ITEM_SELECT} WHERE i.id = ?");
    let item = sqlx::query_as::<_, Item>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(item)
}

pub(crate) async fn fetch_item_by_key<'e, E>(
    executor: E,
    category_id: i64,
    name: &str,
) -> DbResult<Option<Item>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("{ITEM_SELECT} WHERE i.category_id = ? AND i.name = ?");
    let item = sqlx::query_as::<_, Item>(&sql)
        .bind(category_id)
        .bind(name)
        .fetch_optional(executor)
        .await?;
    Ok(item)
}

async fn ensure_category<'e, E>(executor: E, category_id: i64) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE id = ?")
        .bind(category_id)
        .fetch_one(executor)
        .await?;

    if exists == 0 {
        return Err(DbError::not_found("Category", category_id));
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::attachments::AttachmentKind;
    use crate::error::{DbError, ErrorKind};
    use crate::pool::{Database, DbConfig};
    use partshop_core::{ItemUpdate, NewItem, MAX_QUANTITY, UNCATEGORIZED_ID};

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let db = db().await;
        let caps = db.categories().create("Caps", Some("file:///caps.png")).await.unwrap();

        let item = db
            .items()
            .create(NewItem::new(caps.id, " 100nF ").quantity(25))
            .await
            .unwrap();

        assert_eq!(item.name, "100nF");
        assert_eq!(item.quantity, 25);
        assert_eq!(item.category_name, "Caps");
        assert_eq!(item.display_image(), Some("file:///caps.png"));

        let fetched = db.items().get_by_id(item.id).await.unwrap();
        assert_eq!(fetched, item);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicates_and_bad_input() {
        let db = db().await;
        let items = db.items();
        items.create(NewItem::new(UNCATEGORIZED_ID, "LED")).await.unwrap();

        let err = items.create(NewItem::new(UNCATEGORIZED_ID, "LED")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);

        let err = items.create(NewItem::new(42, "LED")).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        let err = items
            .create(NewItem::new(UNCATEGORIZED_ID, "Diode").quantity(-1))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_moves_category_and_releases_replaced_datasheet() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::in_memory().attachments_dir(dir.path()))
            .await
            .unwrap();
        let store = db.attachments();
        let old = store.store(AttachmentKind::Datasheet, "v1.pdf", b"1").await.unwrap();
        let new = store.store(AttachmentKind::Datasheet, "v2.pdf", b"2").await.unwrap();

        let regs = db.categories().create("Regulators", None).await.unwrap();
        let item = db
            .items()
            .create(NewItem::new(UNCATEGORIZED_ID, "LM7805").datasheet(old.clone()))
            .await
            .unwrap();

        let mut update = ItemUpdate::from_item(&item);
        update.category_id = Some(regs.id);
        update.datasheet_uri = Some(new.clone());
        update.quantity = 3;

        let updated = db.items().update(item.id, update).await.unwrap();
        assert_eq!(updated.category_id, regs.id);
        assert_eq!(updated.quantity, 3);
        assert!(!store.exists(&old).await);
        assert!(store.exists(&new).await);
    }

    #[tokio::test]
    async fn test_failed_update_keeps_attachments() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::in_memory().attachments_dir(dir.path()))
            .await
            .unwrap();
        let image = db
            .attachments()
            .store(AttachmentKind::Image, "led.png", b"i")
            .await
            .unwrap();

        db.items().create(NewItem::new(UNCATEGORIZED_ID, "LED red")).await.unwrap();
        let item = db
            .items()
            .create(NewItem::new(UNCATEGORIZED_ID, "LED").image(image.clone()))
            .await
            .unwrap();

        let mut update = ItemUpdate::from_item(&item);
        update.name = "LED red".to_string();
        update.image_uri = None;

        let err = db.items().update(item.id, update).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
        assert!(db.attachments().exists(&image).await);
        assert_eq!(db.items().get_by_id(item.id).await.unwrap().image_uri, Some(image));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent_and_releases_files() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::in_memory().attachments_dir(dir.path()))
            .await
            .unwrap();
        let sheet = db
            .attachments()
            .store(AttachmentKind::Datasheet, "ne555.pdf", b"d")
            .await
            .unwrap();

        let item = db
            .items()
            .create(NewItem::new(UNCATEGORIZED_ID, "NE555").datasheet(sheet.clone()))
            .await
            .unwrap();

        assert!(db.items().delete(item.id).await.unwrap());
        assert!(!db.items().delete(item.id).await.unwrap());
        assert!(!db.attachments().exists(&sheet).await);
    }

    #[tokio::test]
    async fn test_search_and_adjust() {
        let db = db().await;
        let res = db.categories().create("Resistors", None).await.unwrap();
        db.items().create(NewItem::new(res.id, "10k").quantity(2)).await.unwrap();
        db.items().create(NewItem::new(UNCATEGORIZED_ID, "Heatsink")).await.unwrap();

        // Matches on category name too.
        let found = db.items().search("resist", None).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "10k");

        assert_eq!(db.items().search("", Some(UNCATEGORIZED_ID)).await.unwrap().len(), 1);
        assert_eq!(db.items().search("", None).await.unwrap().len(), 2);

        let item = db.items().adjust_quantity(found[0].id, -5).await.unwrap();
        assert_eq!(item.quantity, 0);
        let item = db.items().adjust_quantity(item.id, 4).await.unwrap();
        assert_eq!(item.quantity, 4);

        assert!(matches!(
            db.items().adjust_quantity(999, 1).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_adjust_at_quantity_ceiling() {
        let db = db().await;
        let item = db
            .items()
            .create(NewItem::new(UNCATEGORIZED_ID, "Jumper").quantity(MAX_QUANTITY - 1))
            .await
            .unwrap();

        let item = db.items().adjust_quantity(item.id, 1).await.unwrap();
        assert_eq!(item.quantity, MAX_QUANTITY);

        let err = db.items().adjust_quantity(item.id, 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
        let err = db.items().adjust_quantity(item.id, i64::MAX).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);

        // Still readable and unchanged after the rejected adjustments.
        assert_eq!(db.items().get_by_id(item.id).await.unwrap().quantity, MAX_QUANTITY);

        let item = db.items().adjust_quantity(item.id, i64::MIN).await.unwrap();
        assert_eq!(item.quantity, 0);
    }

    #[tokio::test]
    async fn test_quantity_above_ceiling_rejected() {
        let db = db().await;
        let err = db
            .items()
            .create(NewItem::new(UNCATEGORIZED_ID, "Jumper").quantity(MAX_QUANTITY + 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
    }
}
