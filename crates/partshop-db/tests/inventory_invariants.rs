//! Cross-table guarantees: category deletion, `(category, name)` uniqueness,
//! additive import, purchase atomicity and attachment lifecycle.

use partshop_core::{ItemUpdate, NewItem, UNCATEGORIZED_ID};
use partshop_db::{AttachmentKind, Database, DbConfig, DbError, ErrorKind};
use tempfile::TempDir;

async fn store() -> (Database, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(DbConfig::in_memory().attachments_dir(dir.path()))
        .await
        .unwrap();
    (db, dir)
}

async fn key_counts(db: &Database) -> Vec<(i64, String, i64)> {
    sqlx::query_as(
        "SELECT category_id, name, COUNT(*) FROM items GROUP BY category_id, name HAVING COUNT(*) > 1",
    )
    .fetch_all(db.pool())
    .await
    .unwrap()
}

#[tokio::test]
async fn deleting_a_category_moves_everything_and_frees_its_image() {
    let (db, _dir) = store().await;
    let image = db
        .attachments()
        .store(AttachmentKind::Image, "resistors.png", b"png")
        .await
        .unwrap();

    let res = db.categories().create("Resistors", Some(&image)).await.unwrap();
    for name in ["10k", "4k7", "1M"] {
        db.items().create(NewItem::new(res.id, name).quantity(1)).await.unwrap();
    }
    db.shopping_list().create(Some(res.id), "220R", 10).await.unwrap();

    assert!(db.categories().delete(res.id).await.unwrap());

    let orphans: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM items WHERE category_id NOT IN (SELECT id FROM categories)",
    )
    .fetch_one(db.pool())
    .await
    .unwrap();
    assert_eq!(orphans, 0);

    let uncategorized = db.categories().get_by_id(UNCATEGORIZED_ID).await.unwrap();
    assert_eq!(uncategorized.item_count, 3);

    let entries = db.shopping_list().list().await.unwrap();
    assert_eq!(entries[0].target_category_id, Some(UNCATEGORIZED_ID));

    assert!(!db.attachments().exists(&image).await);
    assert!(matches!(
        db.categories().get_by_id(res.id).await,
        Err(DbError::NotFound { .. })
    ));
}

#[tokio::test]
async fn shared_category_image_survives_until_last_owner_is_gone() {
    let (db, _dir) = store().await;
    let image = db
        .attachments()
        .store(AttachmentKind::Image, "caps.png", b"png")
        .await
        .unwrap();
    let caps = db.categories().create("Caps", Some(&image)).await.unwrap();

    // Imported items borrow the category image.
    db.transfer()
        .import_csv_text("category,name,quantity\nCaps,100nF,5\n")
        .await
        .unwrap();
    let item = db.items().find_by_key(caps.id, "100nF").await.unwrap().unwrap();
    assert_eq!(item.image_uri.as_deref(), Some(image.as_str()));

    // The category is gone but the moved item still points at the file.
    db.categories().delete(caps.id).await.unwrap();
    assert!(db.attachments().exists(&image).await);

    db.items().delete(item.id).await.unwrap();
    assert!(!db.attachments().exists(&image).await);
}

#[tokio::test]
async fn item_keys_stay_unique_across_every_write_path() {
    let (db, _dir) = store().await;
    let caps = db.categories().create("Caps", None).await.unwrap();

    // Direct create refuses.
    db.items().create(NewItem::new(caps.id, "100nF").quantity(1)).await.unwrap();
    let err = db.items().create(NewItem::new(caps.id, "100nF")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConstraintViolation);

    // Update onto an existing key refuses.
    let other = db.items().create(NewItem::new(caps.id, "10uF")).await.unwrap();
    let mut update = ItemUpdate::from_item(&other);
    update.name = "100nF".to_string();
    let err = db.items().update(other.id, update).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConstraintViolation);

    // Moving into a category that has the name refuses.
    let loose = db
        .items()
        .create(NewItem::new(UNCATEGORIZED_ID, "100nF"))
        .await
        .unwrap();
    let mut update = ItemUpdate::from_item(&loose);
    update.category_id = Some(caps.id);
    assert!(db.items().update(loose.id, update).await.is_err());

    // Import and purchase merge.
    db.transfer()
        .import_csv_text("category,name,quantity\nCaps,100nF,2\nCaps,100nF,3\n")
        .await
        .unwrap();
    let entry = db.shopping_list().create(Some(caps.id), "100nF", 4).await.unwrap();
    db.shopping_list().purchase(entry.id).await.unwrap();

    assert!(key_counts(&db).await.is_empty());
    let merged = db.items().find_by_key(caps.id, "100nF").await.unwrap().unwrap();
    assert_eq!(merged.quantity, 1 + 2 + 3 + 4);
}

#[tokio::test]
async fn importing_twice_doubles_quantities() {
    let (db, _dir) = store().await;
    let text = "category,name,quantity\nResistors,10k,5\nCaps,100nF,7\n,Heatsink,1\n";

    let first = db.transfer().import_csv_text(text).await.unwrap();
    let second = db.transfer().import_csv_text(text).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.imported, 3);

    let rows = db.transfer().inventory_rows().await.unwrap();
    let quantities: Vec<_> = rows.iter().map(|r| (r.name.as_str(), r.quantity)).collect();
    assert_eq!(quantities, vec![("100nF", 14), ("10k", 10), ("Heatsink", 2)]);

    // Categories were created once.
    assert_eq!(db.categories().count().await.unwrap(), 3);
}

#[tokio::test]
async fn export_then_import_into_an_empty_store_reproduces_inventory() {
    let (source, _d1) = store().await;
    source
        .transfer()
        .import_csv_text("category,name,quantity\nICs,NE555,4\nICs,LM358,2\nLEDs,Red 5mm,30\n")
        .await
        .unwrap();
    let text = source.transfer().export_csv().await.unwrap();

    let (target, _d2) = store().await;
    target.transfer().import_csv_text(&text).await.unwrap();

    assert_eq!(
        source.transfer().inventory_rows().await.unwrap(),
        target.transfer().inventory_rows().await.unwrap()
    );
}

#[tokio::test]
async fn purchase_is_all_or_nothing() {
    let (db, _dir) = store().await;
    let caps = db.categories().create("Caps", None).await.unwrap();
    let item = db
        .items()
        .create(NewItem::new(caps.id, "100nF").quantity(5))
        .await
        .unwrap();
    let merge_entry = db.shopping_list().create(Some(caps.id), "100nF", 3).await.unwrap();
    let insert_entry = db.shopping_list().create(None, "Solder", 1).await.unwrap();

    // The entry delete is the last step; make it fail.
    sqlx::query(
        "CREATE TRIGGER block_entry_delete BEFORE DELETE ON shopping_list
         BEGIN SELECT RAISE(ABORT, 'injected failure'); END",
    )
    .execute(db.pool())
    .await
    .unwrap();

    assert!(db.shopping_list().purchase(merge_entry.id).await.is_err());
    assert!(db.shopping_list().purchase(insert_entry.id).await.is_err());

    // Neither the merge nor the insert survived the rollback.
    assert_eq!(db.items().get_by_id(item.id).await.unwrap().quantity, 5);
    assert!(db
        .items()
        .find_by_key(UNCATEGORIZED_ID, "Solder")
        .await
        .unwrap()
        .is_none());
    assert_eq!(db.shopping_list().count().await.unwrap(), 2);

    sqlx::query("DROP TRIGGER block_entry_delete")
        .execute(db.pool())
        .await
        .unwrap();

    let outcome = db.shopping_list().purchase(merge_entry.id).await.unwrap();
    assert_eq!(outcome.item.quantity, 8);
    assert_eq!(db.shopping_list().count().await.unwrap(), 1);
}

#[tokio::test]
async fn failed_import_row_does_not_leave_partial_writes() {
    let (db, _dir) = store().await;

    // Item inserts into "Broken" fail after its category row was created.
    sqlx::query(
        "CREATE TRIGGER block_broken BEFORE INSERT ON items
         WHEN (SELECT name FROM categories WHERE id = NEW.category_id) = 'Broken'
         BEGIN SELECT RAISE(ABORT, 'injected failure'); END",
    )
    .execute(db.pool())
    .await
    .unwrap();

    let summary = db
        .transfer()
        .import_csv_text("category,name,quantity\nBroken,X,1\nFine,Y,2\n")
        .await
        .unwrap();

    assert_eq!(summary.imported, 1);
    assert_eq!(summary.failed, 1);
    assert!(db.categories().find_by_name("Broken").await.unwrap().is_none());
    assert!(db.categories().find_by_name("Fine").await.unwrap().is_some());
}

#[tokio::test]
async fn replaced_attachments_are_released_only_after_commit() {
    let (db, _dir) = store().await;
    let store = db.attachments();
    let first = store.store(AttachmentKind::Image, "a.png", b"a").await.unwrap();
    let second = store.store(AttachmentKind::Image, "b.png", b"b").await.unwrap();

    let item = db
        .items()
        .create(NewItem::new(UNCATEGORIZED_ID, "Relay").image(first.clone()))
        .await
        .unwrap();

    // Rolled-back update: first file kept.
    let mut update = ItemUpdate::from_item(&item);
    update.image_uri = Some(second.clone());
    update.category_id = Some(999);
    assert!(db.items().update(item.id, update).await.is_err());
    assert!(store.exists(&first).await);

    // Committed update: first file released, second kept.
    let mut update = ItemUpdate::from_item(&item);
    update.image_uri = Some(second.clone());
    db.items().update(item.id, update).await.unwrap();
    assert!(!store.exists(&first).await);
    assert!(store.exists(&second).await);
}
