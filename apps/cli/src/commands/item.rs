//! `partshop item ...`

use std::path::PathBuf;

use clap::{Args, Subcommand};
use partshop_core::{Item, ItemUpdate, NewItem, UNCATEGORIZED_ID};
use partshop_db::AttachmentKind;

use super::{discard_on_error, short_uri, stage_attachment, Context, Deleted};
use crate::error::CliResult;

#[derive(Debug, Subcommand)]
pub enum ItemCommand {
    /// Add an item to a category
    Add {
        name: String,

        /// Category ID (defaults to Uncategorized)
        #[arg(short, long, default_value_t = UNCATEGORIZED_ID)]
        category: i64,

        /// Units on hand
        #[arg(short, long, default_value_t = 0)]
        quantity: i64,

        /// Datasheet file to attach
        #[arg(long)]
        datasheet: Option<PathBuf>,

        /// Image file to attach
        #[arg(long)]
        image: Option<PathBuf>,
    },

    /// List items, optionally in one category
    List {
        #[arg(short, long)]
        category: Option<i64>,
    },

    /// Search by item or category name
    Search {
        query: String,

        /// Restrict to one category
        #[arg(short, long)]
        category: Option<i64>,
    },

    /// Show one item
    Show { id: i64 },

    /// Change name, quantity or category
    Update {
        id: i64,

        #[command(flatten)]
        changes: ItemChanges,
    },

    /// Delete an item and its attachments
    Delete { id: i64 },

    /// Add or remove stock; the result never drops below zero
    Adjust {
        id: i64,

        #[arg(allow_negative_numbers = true)]
        delta: i64,
    },

    /// Replace or clear attachments
    Attach {
        id: i64,

        #[command(flatten)]
        files: AttachmentChanges,
    },
}

#[derive(Debug, Clone, Default, Args)]
pub struct ItemChanges {
    #[arg(long)]
    pub name: Option<String>,

    #[arg(short, long)]
    pub quantity: Option<i64>,

    /// Move to this category
    #[arg(short, long)]
    pub category: Option<i64>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct AttachmentChanges {
    #[arg(long, conflicts_with = "clear_image")]
    pub image: Option<PathBuf>,

    #[arg(long, conflicts_with = "clear_datasheet")]
    pub datasheet: Option<PathBuf>,

    #[arg(long)]
    pub clear_image: bool,

    #[arg(long)]
    pub clear_datasheet: bool,
}

pub async fn run(ctx: &Context, command: ItemCommand) -> CliResult<()> {
    let out = ctx.out;
    match command {
        ItemCommand::Add {
            name,
            category,
            quantity,
            datasheet,
            image,
        } => {
            let item = add(ctx, NewItem::new(category, name).quantity(quantity), image, datasheet)
                .await?;
            out.emit(&item, |i| {
                format!("Added #{} {} to {} (qty {})", i.id, i.name, i.category_name, i.quantity)
            })
        }
        ItemCommand::List { category } => {
            let items = match category {
                Some(category_id) => ctx.db.items().list_by_category(category_id).await?,
                None => ctx.db.items().list().await?,
            };
            out.emit(&items, |i| render_table(i))
        }
        ItemCommand::Search { query, category } => {
            let items = ctx.db.items().search(&query, category).await?;
            out.emit(&items, |i| render_table(i))
        }
        ItemCommand::Show { id } => {
            let item = ctx.db.items().get_by_id(id).await?;
            out.emit(&item, render_one)
        }
        ItemCommand::Update { id, changes } => {
            let item = update(ctx, id, changes).await?;
            out.emit(&item, |i| format!("Updated #{} {}", i.id, i.name))
        }
        ItemCommand::Delete { id } => {
            let deleted = ctx.db.items().delete(id).await?;
            out.emit(&Deleted { id, deleted }, |d| d.render("item"))
        }
        ItemCommand::Adjust { id, delta } => {
            let item = ctx.db.items().adjust_quantity(id, delta).await?;
            out.emit(&item, |i| format!("{} now has {} on hand", i.name, i.quantity))
        }
        ItemCommand::Attach { id, files } => {
            let item = attach(ctx, id, files).await?;
            out.emit(&item, render_one)
        }
    }
}

pub async fn add(
    ctx: &Context,
    item: NewItem,
    image: Option<PathBuf>,
    datasheet: Option<PathBuf>,
) -> CliResult<Item> {
    let image = stage_attachment(&ctx.db, AttachmentKind::Image, image.as_deref()).await?;
    let datasheet =
        match stage_attachment(&ctx.db, AttachmentKind::Datasheet, datasheet.as_deref()).await {
            Ok(uri) => uri,
            Err(e) => {
                if let Some(uri) = &image {
                    ctx.db.attachments().release(uri).await;
                }
                return Err(e);
            }
        };

    let item = NewItem {
        image_uri: image.clone(),
        datasheet_uri: datasheet.clone(),
        ..item
    };
    let result = ctx.db.items().create(item).await;
    discard_on_error(&ctx.db, &[image, datasheet], result).await
}

pub async fn update(ctx: &Context, id: i64, changes: ItemChanges) -> CliResult<Item> {
    let current = ctx.db.items().get_by_id(id).await?;

    let mut update = ItemUpdate::from_item(&current);
    if let Some(name) = changes.name {
        update.name = name;
    }
    if let Some(quantity) = changes.quantity {
        update.quantity = quantity;
    }
    update.category_id = changes.category;

    Ok(ctx.db.items().update(id, update).await?)
}

/// Replaces or clears attachments. The replaced files are released once
/// nothing refers to them any more.
pub async fn attach(ctx: &Context, id: i64, files: AttachmentChanges) -> CliResult<Item> {
    let current = ctx.db.items().get_by_id(id).await?;

    let image = stage_attachment(&ctx.db, AttachmentKind::Image, files.image.as_deref()).await?;
    let datasheet =
        stage_attachment(&ctx.db, AttachmentKind::Datasheet, files.datasheet.as_deref()).await;
    let datasheet = match datasheet {
        Ok(uri) => uri,
        Err(e) => {
            if let Some(uri) = &image {
                ctx.db.attachments().release(uri).await;
            }
            return Err(e);
        }
    };

    let mut update = ItemUpdate::from_item(&current);
    update.image_uri = pick(image.clone(), files.clear_image, current.image_uri);
    update.datasheet_uri = pick(datasheet.clone(), files.clear_datasheet, current.datasheet_uri);

    let result = ctx.db.items().update(id, update).await;
    discard_on_error(&ctx.db, &[image, datasheet], result).await
}

fn pick(staged: Option<String>, clear: bool, current: Option<String>) -> Option<String> {
    match (staged, clear) {
        (Some(uri), _) => Some(uri),
        (None, true) => None,
        (None, false) => current,
    }
}

fn render_table(items: &[Item]) -> String {
    if items.is_empty() {
        return "No items".to_string();
    }
    let mut lines = vec![format!(
        "{:>5}  {:<20}  {:<32}  {:>6}",
        "ID", "CATEGORY", "NAME", "QTY"
    )];
    for i in items {
        lines.push(format!(
            "{:>5}  {:<20}  {:<32}  {:>6}",
            i.id, i.category_name, i.name, i.quantity
        ));
    }
    lines.join("\n")
}

fn render_one(i: &Item) -> String {
    format!(
        "#{} {}\nCategory:  {} (#{})\nQuantity:  {}\nImage:     {}\nDatasheet: {}",
        i.id,
        i.name,
        i.category_name,
        i.category_id,
        i.quantity,
        short_uri(i.display_image()),
        short_uri(i.datasheet_uri.as_deref())
    )
}
