//! `partshop category ...`

use std::path::PathBuf;

use clap::Subcommand;
use partshop_core::Category;
use partshop_db::AttachmentKind;

use super::{discard_on_error, short_uri, stage_attachment, Context, Deleted};
use crate::error::CliResult;

#[derive(Debug, Subcommand)]
pub enum CategoryCommand {
    /// Create a category
    Add {
        name: String,

        /// Image file to attach
        #[arg(long)]
        image: Option<PathBuf>,
    },

    /// List categories, Uncategorized first
    List,

    /// Show one category
    Show { id: i64 },

    /// Case-insensitive substring search by name
    Search { query: String },

    /// Rename a category and optionally replace its image
    Rename {
        id: i64,
        name: String,

        /// New image file
        #[arg(long, conflicts_with = "clear_image")]
        image: Option<PathBuf>,

        /// Remove the current image
        #[arg(long)]
        clear_image: bool,
    },

    /// Delete a category; its items move to Uncategorized
    Delete { id: i64 },
}

pub async fn run(ctx: &Context, command: CategoryCommand) -> CliResult<()> {
    let out = ctx.out;
    match command {
        CategoryCommand::Add { name, image } => {
            let category = add(ctx, &name, image).await?;
            out.emit(&category, |c| format!("Created category #{} {}", c.id, c.name))
        }
        CategoryCommand::List => {
            let categories = ctx.db.categories().list().await?;
            out.emit(&categories, |c| render_table(c))
        }
        CategoryCommand::Show { id } => {
            let category = ctx.db.categories().get_by_id(id).await?;
            out.emit(&category, render_one)
        }
        CategoryCommand::Search { query } => {
            let categories = ctx.db.categories().search(&query).await?;
            out.emit(&categories, |c| render_table(c))
        }
        CategoryCommand::Rename {
            id,
            name,
            image,
            clear_image,
        } => {
            let category = rename(ctx, id, &name, image, clear_image).await?;
            out.emit(&category, |c| format!("Updated category #{} {}", c.id, c.name))
        }
        CategoryCommand::Delete { id } => {
            let outcome = delete(ctx, id).await?;
            out.emit(&outcome, |d| d.render("category"))
        }
    }
}

pub async fn add(ctx: &Context, name: &str, image: Option<PathBuf>) -> CliResult<Category> {
    let staged = stage_attachment(&ctx.db, AttachmentKind::Image, image.as_deref()).await?;
    let result = ctx.db.categories().create(name, staged.as_deref()).await;
    discard_on_error(&ctx.db, &[staged], result).await
}

/// Renames `id`. The image is kept unless a new one is given or
/// `clear_image` is set.
pub async fn rename(
    ctx: &Context,
    id: i64,
    name: &str,
    image: Option<PathBuf>,
    clear_image: bool,
) -> CliResult<Category> {
    let current = ctx.db.categories().get_by_id(id).await?;
    let staged = stage_attachment(&ctx.db, AttachmentKind::Image, image.as_deref()).await?;

    let image_uri = match (&staged, clear_image) {
        (Some(uri), _) => Some(uri.as_str()),
        (None, true) => None,
        (None, false) => current.image_uri.as_deref(),
    };

    let result = ctx.db.categories().update(id, name, image_uri).await;
    discard_on_error(&ctx.db, &[staged], result).await
}

pub async fn delete(ctx: &Context, id: i64) -> CliResult<Deleted> {
    let deleted = ctx.db.categories().delete(id).await?;
    Ok(Deleted { id, deleted })
}

fn render_table(categories: &[Category]) -> String {
    if categories.is_empty() {
        return "No categories".to_string();
    }
    let mut lines = vec![format!("{:>5}  {:<32}  {:>6}  {}", "ID", "NAME", "ITEMS", "IMAGE")];
    for c in categories {
        lines.push(format!(
            "{:>5}  {:<32}  {:>6}  {}",
            c.id,
            c.name,
            c.item_count,
            short_uri(c.image_uri.as_deref())
        ));
    }
    lines.join("\n")
}

fn render_one(c: &Category) -> String {
    format!(
        "#{} {}\nItems: {}\nImage: {}",
        c.id,
        c.name,
        c.item_count,
        c.image_uri.as_deref().unwrap_or("-")
    )
}
