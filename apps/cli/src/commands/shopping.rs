//! `partshop shop ...`

use clap::Subcommand;
use partshop_core::{PurchaseOutcome, ShoppingListEntry};

use super::{Context, Deleted};
use crate::error::CliResult;

#[derive(Debug, Subcommand)]
pub enum ShopCommand {
    /// Put something on the shopping list
    Add {
        name: String,

        /// Units to buy
        #[arg(short, long, default_value_t = 1)]
        quantity: i64,

        /// Category the bought units are filed under
        #[arg(short, long)]
        category: Option<i64>,
    },

    /// Show the shopping list
    List,

    /// Search by entry or category name
    Search { query: String },

    /// Drop an entry without buying it
    Remove { id: i64 },

    /// Mark an entry bought: its units are added to the inventory
    Buy { id: i64 },
}

pub async fn run(ctx: &Context, command: ShopCommand) -> CliResult<()> {
    let out = ctx.out;
    let repo = ctx.db.shopping_list();
    match command {
        ShopCommand::Add {
            name,
            quantity,
            category,
        } => {
            let entry = repo.create(category, &name, quantity).await?;
            out.emit(&entry, |e| {
                format!("Added #{} {} x{}", e.id, e.name, e.target_quantity)
            })
        }
        ShopCommand::List => {
            let entries = repo.list().await?;
            out.emit(&entries, |e| render_table(e))
        }
        ShopCommand::Search { query } => {
            let entries = repo.search(&query).await?;
            out.emit(&entries, |e| render_table(e))
        }
        ShopCommand::Remove { id } => {
            let deleted = repo.delete(id).await?;
            out.emit(&Deleted { id, deleted }, |d| d.render("entry"))
        }
        ShopCommand::Buy { id } => {
            let outcome = repo.purchase(id).await?;
            out.emit(&outcome, render_purchase)
        }
    }
}

fn render_table(entries: &[ShoppingListEntry]) -> String {
    if entries.is_empty() {
        return "Shopping list is empty".to_string();
    }
    let mut lines = vec![format!(
        "{:>5}  {:<32}  {:>6}  {}",
        "ID", "NAME", "QTY", "CATEGORY"
    )];
    for e in entries {
        lines.push(format!(
            "{:>5}  {:<32}  {:>6}  {}",
            e.id,
            e.name,
            e.target_quantity,
            e.category_name.as_deref().unwrap_or("Uncategorized")
        ));
    }
    lines.join("\n")
}

fn render_purchase(outcome: &PurchaseOutcome) -> String {
    let verb = if outcome.merged { "Restocked" } else { "Added" };
    format!(
        "{} {} in {}: {} on hand",
        verb, outcome.item.name, outcome.item.category_name, outcome.item.quantity
    )
}
