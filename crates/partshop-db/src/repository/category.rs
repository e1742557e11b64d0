//! # Category Repository
//!
//! Database operations for categories.
//!
//! ## Delete Semantics
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  delete("Resistors")                     one transaction               │
//! │       │                                                                 │
//! │       ├── items named like an Uncategorized item → merged into it      │
//! │       ├── remaining items            → category_id = 1                 │
//! │       ├── shopping entries           → target_category_id = 1          │
//! │       ├── DELETE the category row                                      │
//! │       │                                                                 │
//! │       ▼  COMMIT                                                         │
//! │  release the category image (if nothing else points at it)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Uncategorized (id 1) can never be deleted or renamed; its image may change.

use sqlx::{SqliteExecutor, SqlitePool};
use tracing::{debug, info};

use partshop_core::validation::{
    validate_category_name, validate_merged_quantity, validate_search_query,
};
use partshop_core::{Category, UNCATEGORIZED_ID, UNCATEGORIZED_NAME};

use crate::attachments::{AttachmentStore, ReleaseQueue};
use crate::error::{DbError, DbResult};
use crate::repository::queue_unreferenced;

const CATEGORY_SELECT: &str = r#"
    SELECT
        c.id,
        c.name,
        c.image_uri,
        (SELECT COUNT(*) FROM items i WHERE i.category_id = c.id) AS item_count
    FROM categories c
"#;

/// An item in the deleted category whose name already exists in Uncategorized.
#[derive(Debug, sqlx::FromRow)]
struct Collision {
    dup_id: i64,
    dup_quantity: i64,
    dup_datasheet_uri: Option<String>,
    dup_image_uri: Option<String>,
    twin_id: i64,
    twin_quantity: i64,
    twin_datasheet_uri: Option<String>,
    twin_image_uri: Option<String>,
}

/// Repository for category database operations.
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
    attachments: AttachmentStore,
}

impl CategoryRepository {
    /// Creates a new CategoryRepository.
    pub fn new(pool: SqlitePool, attachments: AttachmentStore) -> Self {
        CategoryRepository { pool, attachments }
    }

    /// Lists all categories: Uncategorized first, then by name
    /// (case-insensitive).
    pub async fn list(&self) -> DbResult<Vec<Category>> {
        let sql = format!("{CATEGORY_SELECT} ORDER BY (c.id = ?) DESC, c.name COLLATE NOCASE, c.id");
        let categories = sqlx::query_as::<_, Category>(&sql)
            .bind(UNCATEGORIZED_ID)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = categories.len(), "Listed categories");
        Ok(categories)
    }

    /// Gets a category by its ID.
    ///
    /// ## Returns
    /// * `Ok(Category)` - Category found
    /// * `Err(DbError::NotFound)` - No such category
    pub async fn get_by_id(&self, id: i64) -> DbResult<Category> {
        fetch_category(&self.pool, id)
            .await?
            .ok_or_else(|| DbError::not_found("Category", id))
    }

    /// Finds a category by exact name.
    pub async fn find_by_name(&self, name: &str) -> DbResult<Option<Category>> {
        let sql = format!("{CATEGORY_SELECT} WHERE c.name = ?");
        let category = sqlx::query_as::<_, Category>(&sql)
            .bind(name.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(category)
    }

    /// Case-insensitive substring search on the name.
    ///
    /// An empty query returns the full list.
    pub async fn search(&self, query: &str) -> DbResult<Vec<Category>> {
        let query = validate_search_query(query)?;
        if query.is_empty() {
            return self.list().await;
        }

        debug!(query = %query, "Searching categories");

        let sql = format!(
            "{CATEGORY_SELECT} WHERE instr(lower(c.name), lower(?)) > 0 \
             ORDER BY (c.id = ?) DESC, c.name COLLATE NOCASE, c.id"
        );
        let categories = sqlx::query_as::<_, Category>(&sql)
            .bind(&query)
            .bind(UNCATEGORIZED_ID)
            .fetch_all(&self.pool)
            .await?;

        Ok(categories)
    }

    /// Number of categories, Uncategorized included.
    pub async fn count(&self) -> DbResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Creates a category.
    ///
    /// ## Errors
    /// * `Validation` - empty or over-long name
    /// * `ConstraintViolation` - the name is taken
    pub async fn create(&self, name: &str, image_uri: Option<&str>) -> DbResult<Category> {
        let name = validate_category_name(name)?;

        debug!(name = %name, "Creating category");

        let result = sqlx::query("INSERT INTO categories (name, image_uri) VALUES (?, ?)")
            .bind(&name)
            .bind(image_uri)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::from(e).with_duplicate("category name", &name))?;

        self.get_by_id(result.last_insert_rowid()).await
    }

    /// Renames a category and/or replaces its image.
    ///
    /// `image_uri` is the new stored value; `None` clears it. A replaced
    /// image is released after commit.
    ///
    /// ## Errors
    /// * `NotFound` - no such category
    /// * `Protected` - renaming Uncategorized
    /// * `ConstraintViolation` - the new name is taken
    pub async fn update(&self, id: i64, name: &str, image_uri: Option<&str>) -> DbResult<Category> {
        let name = validate_category_name(name)?;

        debug!(id, name = %name, "Updating category");

        let mut tx = self.pool.begin().await?;

        let existing = fetch_category(&mut *tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Category", id))?;

        if existing.is_uncategorized() && existing.name != name {
            return Err(DbError::Protected(format!(
                "'{UNCATEGORIZED_NAME}' cannot be renamed"
            )));
        }

        sqlx::query("UPDATE categories SET name = ?, image_uri = ? WHERE id = ?")
            .bind(&name)
            .bind(image_uri)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| DbError::from(e).with_duplicate("category name", &name))?;

        let mut queue = ReleaseQueue::new();
        let replaced = existing
            .image_uri
            .filter(|old| Some(old.as_str()) != image_uri);
        queue_unreferenced(&mut tx, &mut queue, replaced).await?;

        let updated = fetch_category(&mut *tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Category", id))?;

        tx.commit().await?;
        queue.flush(&self.attachments).await;

        Ok(updated)
    }

    /// Deletes a category, moving its items and shopping entries to
    /// Uncategorized.
    ///
    /// An item whose name already exists in Uncategorized is merged into
    /// that item (quantities added, missing attachments adopted) so
    /// `(category, name)` stays unique.
    ///
    /// ## Returns
    /// * `Ok(true)` - deleted
    /// * `Ok(false)` - no such category (nothing changed)
    /// * `Err(DbError::Protected)` - attempted on Uncategorized
    /// * `Err(DbError::Validation)` - a merge would exceed `MAX_QUANTITY`;
    ///   nothing changed
    pub async fn delete(&self, id: i64) -> DbResult<bool> {
        if id == UNCATEGORIZED_ID {
            return Err(DbError::Protected(format!(
                "'{UNCATEGORIZED_NAME}' cannot be deleted"
            )));
        }

        let mut tx = self.pool.begin().await?;

        let Some(category) = fetch_category(&mut *tx, id).await? else {
            debug!(id, "Category already gone");
            return Ok(false);
        };

        let mut candidates: Vec<String> = category.image_uri.into_iter().collect();

        let collisions = sqlx::query_as::<_, Collision>(
            r#"
            SELECT
                d.id AS dup_id,
                d.quantity AS dup_quantity,
                d.datasheet_uri AS dup_datasheet_uri,
                d.image_uri AS dup_image_uri,
                t.id AS twin_id,
                t.quantity AS twin_quantity,
                t.datasheet_uri AS twin_datasheet_uri,
                t.image_uri AS twin_image_uri
            FROM items d
            JOIN items t ON t.category_id = ? AND t.name = d.name
            WHERE d.category_id = ?
            "#,
        )
        .bind(UNCATEGORIZED_ID)
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        for c in &collisions {
            let quantity = validate_merged_quantity(c.twin_quantity, c.dup_quantity)?;
            sqlx::query(
                r#"
                UPDATE items
                SET quantity = ?,
                    datasheet_uri = COALESCE(datasheet_uri, ?),
                    image_uri = COALESCE(image_uri, ?)
                WHERE id = ?
                "#,
            )
            .bind(quantity)
            .bind(&c.dup_datasheet_uri)
            .bind(&c.dup_image_uri)
            .bind(c.twin_id)
            .execute(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM items WHERE id = ?")
                .bind(c.dup_id)
                .execute(&mut *tx)
                .await?;

            // Attachments the twin did not adopt lose their only owner.
            if c.twin_datasheet_uri.is_some() {
                candidates.extend(c.dup_datasheet_uri.clone());
            }
            if c.twin_image_uri.is_some() {
                candidates.extend(c.dup_image_uri.clone());
            }
        }

        let moved_items = sqlx::query("UPDATE items SET category_id = ? WHERE category_id = ?")
            .bind(UNCATEGORIZED_ID)
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let moved_entries = sqlx::query(
            "UPDATE shopping_list SET target_category_id = ? WHERE target_category_id = ?",
        )
        .bind(UNCATEGORIZED_ID)
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let mut queue = ReleaseQueue::new();
        queue_unreferenced(&mut tx, &mut queue, candidates).await?;

        tx.commit().await?;
        let released = queue.flush(&self.attachments).await;

        info!(
            id,
            name = %category.name,
            merged = collisions.len(),
            moved_items,
            moved_entries,
            released,
            "Category deleted"
        );
        Ok(true)
    }
}

async fn fetch_category<'e, E>(executor: E, id: i64) -> DbResult<Option<Category>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("{CATEGORY_SELECT} WHERE c.id = ?");
    let category = sqlx::query_as::<_, Category>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(category)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::attachments::AttachmentKind;
    use crate::error::{DbError, ErrorKind};
    use crate::pool::{Database, DbConfig};
    use partshop_core::{NewItem, MAX_QUANTITY, UNCATEGORIZED_ID};

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_list_puts_uncategorized_first() {
        let db = db().await;
        let repo = db.categories();
        repo.create("resistors", None).await.unwrap();
        repo.create("Capacitors", None).await.unwrap();
        repo.create("  Diodes ", None).await.unwrap();

        let names: Vec<_> = repo.list().await.unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Uncategorized", "Capacitors", "Diodes", "resistors"]);
        assert_eq!(repo.count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicates_and_blank_names() {
        let db = db().await;
        let repo = db.categories();
        repo.create("Caps", None).await.unwrap();

        let err = repo.create("Caps", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
        assert!(err.to_string().contains("Caps"));

        let err = repo.create("   ", None).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
    }

    #[tokio::test]
    async fn test_uncategorized_is_protected() {
        let db = db().await;
        let repo = db.categories();

        assert!(matches!(repo.delete(UNCATEGORIZED_ID).await, Err(DbError::Protected(_))));
        assert!(matches!(
            repo.update(UNCATEGORIZED_ID, "Misc", None).await,
            Err(DbError::Protected(_))
        ));

        // Changing only the image is allowed.
        let updated = repo
            .update(UNCATEGORIZED_ID, "Uncategorized", Some("file:///tmp/u.png"))
            .await
            .unwrap();
        assert_eq!(updated.image_uri.as_deref(), Some("file:///tmp/u.png"));
    }

    #[tokio::test]
    async fn test_update_renames_and_releases_old_image() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::in_memory().attachments_dir(dir.path()))
            .await
            .unwrap();
        let store = db.attachments();

        let old = store.store(AttachmentKind::Image, "old.png", b"o").await.unwrap();
        let new = store.store(AttachmentKind::Image, "new.png", b"n").await.unwrap();

        let repo = db.categories();
        let cat = repo.create("Caps", Some(&old)).await.unwrap();

        let updated = repo.update(cat.id, "Capacitors", Some(&new)).await.unwrap();
        assert_eq!(updated.name, "Capacitors");
        assert!(!store.exists(&old).await);
        assert!(store.exists(&new).await);

        assert!(matches!(
            repo.update(999, "Nope", None).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_reassigns_items_and_entries() {
        let db = db().await;
        let caps = db.categories().create("Caps", None).await.unwrap();
        let item = db
            .items()
            .create(NewItem::new(caps.id, "100nF").quantity(10))
            .await
            .unwrap();
        let entry = db
            .shopping_list()
            .create(Some(caps.id), "10uF", 2)
            .await
            .unwrap();

        assert!(db.categories().delete(caps.id).await.unwrap());
        assert!(!db.categories().delete(caps.id).await.unwrap());

        let item = db.items().get_by_id(item.id).await.unwrap();
        assert_eq!(item.category_id, UNCATEGORIZED_ID);
        assert_eq!(item.category_name, "Uncategorized");

        let entry = db.shopping_list().get_by_id(entry.id).await.unwrap();
        assert_eq!(entry.target_category_id, Some(UNCATEGORIZED_ID));
    }

    #[tokio::test]
    async fn test_delete_merges_name_collisions() {
        let db = db().await;
        let caps = db.categories().create("Caps", None).await.unwrap();
        db.items()
            .create(NewItem::new(UNCATEGORIZED_ID, "100nF").quantity(3))
            .await
            .unwrap();
        db.items()
            .create(NewItem::new(caps.id, "100nF").quantity(7).datasheet("file:///x.pdf"))
            .await
            .unwrap();

        db.categories().delete(caps.id).await.unwrap();

        let items = db.items().list_by_category(UNCATEGORIZED_ID).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 10);
        assert_eq!(items[0].datasheet_uri.as_deref(), Some("file:///x.pdf"));
    }

    #[tokio::test]
    async fn test_delete_refuses_merge_past_quantity_ceiling() {
        let db = db().await;
        let caps = db.categories().create("Caps", None).await.unwrap();
        db.items()
            .create(NewItem::new(UNCATEGORIZED_ID, "100nF").quantity(MAX_QUANTITY))
            .await
            .unwrap();
        db.items()
            .create(NewItem::new(caps.id, "100nF").quantity(1))
            .await
            .unwrap();

        let err = db.categories().delete(caps.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);

        // Rolled back: the category and both items are intact.
        assert_eq!(db.categories().get_by_id(caps.id).await.unwrap().item_count, 1);
        let kept = db.items().find_by_key(UNCATEGORIZED_ID, "100nF").await.unwrap().unwrap();
        assert_eq!(kept.quantity, MAX_QUANTITY);
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_and_literal() {
        let db = db().await;
        let repo = db.categories();
        repo.create("Resistors", None).await.unwrap();
        repo.create("100% Cotton", None).await.unwrap();

        let found = repo.search("SIST").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Resistors");

        let found = repo.search("%").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "100% Cotton");

        assert_eq!(repo.search("").await.unwrap().len(), 3);
        assert!(repo.find_by_name("Resistors").await.unwrap().is_some());
    }
}
