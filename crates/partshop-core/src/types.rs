//! # Domain Types
//!
//! Typed records used throughout PartShop. Rows never leave the storage
//! layer as loose maps; they are decoded into these structs at the
//! repository boundary.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌──────────────────────┐  │
//! │  │    Category     │   │      Item       │   │  ShoppingListEntry   │  │
//! │  │  ─────────────  │   │  ─────────────  │   │  ──────────────────  │  │
//! │  │  id (1 = fixed) │◄──│  category_id    │   │  target_category_id ─┼─►│
//! │  │  name (unique)  │   │  name           │   │  name                │  │
//! │  │  image_uri      │   │  quantity ≥ 0   │   │  target_quantity ≥ 1 │  │
//! │  │  item_count     │   │  datasheet_uri  │   │  is_purchased        │  │
//! │  └─────────────────┘   │  image_uri      │   └──────────────────────┘  │
//! │                        └─────────────────┘                              │
//! │                                                                         │
//! │  (category_id, name) is unique: the merge key for import and purchase  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::UNCATEGORIZED_ID;

// =============================================================================
// Category
// =============================================================================

/// A category of parts (e.g. "Resistors").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Category {
    /// Surrogate key. `1` is the permanent "Uncategorized" row.
    pub id: i64,

    /// Display name, unique across categories.
    pub name: String,

    /// Attachment reference for the category image.
    pub image_uri: Option<String>,

    /// Number of items currently filed under this category.
    pub item_count: i64,
}

impl Category {
    /// Returns true for the permanent fallback category.
    #[inline]
    pub fn is_uncategorized(&self) -> bool {
        self.id == UNCATEGORIZED_ID
    }
}

// =============================================================================
// Item
// =============================================================================

/// An inventory item, joined with the bits of its category the UI needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Item {
    pub id: i64,

    /// Owning category.
    pub category_id: i64,

    pub name: String,

    /// Units on hand. Never negative.
    pub quantity: i64,

    /// Attachment reference for a PDF datasheet.
    pub datasheet_uri: Option<String>,

    /// Attachment reference for the item's own image.
    pub image_uri: Option<String>,

    /// Name of the owning category (denormalized for display and search).
    pub category_name: String,

    /// Image of the owning category, used when the item has none.
    pub category_image_uri: Option<String>,
}

impl Item {
    /// Image to show for this item: its own, else its category's.
    pub fn display_image(&self) -> Option<&str> {
        self.image_uri
            .as_deref()
            .or(self.category_image_uri.as_deref())
    }
}

/// Input for creating an item.
///
/// ## Example
/// ```rust
/// use partshop_core::NewItem;
///
/// let item = NewItem::new(1, "Resistor 10k").quantity(25);
/// assert_eq!(item.quantity, 25);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub category_id: i64,
    pub name: String,
    pub quantity: i64,
    pub datasheet_uri: Option<String>,
    pub image_uri: Option<String>,
}

impl NewItem {
    /// Creates an item input with quantity 0 and no attachments.
    pub fn new(category_id: i64, name: impl Into<String>) -> Self {
        NewItem {
            category_id,
            name: name.into(),
            quantity: 0,
            datasheet_uri: None,
            image_uri: None,
        }
    }

    pub fn quantity(mut self, quantity: i64) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn datasheet(mut self, uri: impl Into<String>) -> Self {
        self.datasheet_uri = Some(uri.into());
        self
    }

    pub fn image(mut self, uri: impl Into<String>) -> Self {
        self.image_uri = Some(uri.into());
        self
    }
}

/// Full replacement of an item's editable fields.
///
/// Attachment fields are the new stored values: `None` clears the
/// reference. `category_id: None` leaves the category unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemUpdate {
    pub name: String,
    pub quantity: i64,
    pub datasheet_uri: Option<String>,
    pub category_id: Option<i64>,
    pub image_uri: Option<String>,
}

impl ItemUpdate {
    /// Builds an update that keeps every field of `item` as it is.
    pub fn from_item(item: &Item) -> Self {
        ItemUpdate {
            name: item.name.clone(),
            quantity: item.quantity,
            datasheet_uri: item.datasheet_uri.clone(),
            category_id: None,
            image_uri: item.image_uri.clone(),
        }
    }
}

// =============================================================================
// Shopping List
// =============================================================================

/// A pending purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ShoppingListEntry {
    pub id: i64,

    /// Category the purchased units are filed under. `None` means Uncategorized.
    pub target_category_id: Option<i64>,

    /// Name of the target category, if it resolves.
    pub category_name: Option<String>,

    pub name: String,

    /// Units to buy. At least 1.
    pub target_quantity: i64,

    /// Legacy flag kept for ordering only; purchase deletes the entry.
    pub is_purchased: bool,
}

impl ShoppingListEntry {
    /// The category a purchase lands in.
    #[inline]
    pub fn resolved_category_id(&self) -> i64 {
        self.target_category_id.unwrap_or(UNCATEGORIZED_ID)
    }
}

/// Result of purchasing a shopping-list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PurchaseOutcome {
    /// The inventory item after the purchase was applied.
    pub item: Item,

    /// `true` if an existing item was incremented, `false` if one was created.
    pub merged: bool,
}

// =============================================================================
// Settings
// =============================================================================

/// A generic key/value setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Setting {
    pub key: String,
    pub value: String,
}

/// The user's colour-scheme preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ThemePreference {
    /// Follow the operating system.
    #[default]
    Auto,
    Light,
    Dark,
}

impl ThemePreference {
    /// The value stored in `settings`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ThemePreference::Auto => "auto",
            ThemePreference::Light => "light",
            ThemePreference::Dark => "dark",
        }
    }
}

impl fmt::Display for ThemePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThemePreference {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(ThemePreference::Auto),
            "light" => Ok(ThemePreference::Light),
            "dark" => Ok(ThemePreference::Dark),
            _ => Err(ValidationError::NotAllowed {
                field: "theme".to_string(),
                allowed: vec!["auto".into(), "light".into(), "dark".into()],
            }),
        }
    }
}

// =============================================================================
// Import / Export
// =============================================================================

/// Aggregate outcome of a bulk import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ImportSummary {
    /// Rows merged into the inventory.
    pub imported: usize,

    /// Rows rejected (blank name, wrong field count, storage error).
    pub failed: usize,
}

impl ImportSummary {
    /// Human-readable summary, e.g. `Imported 3 items successfully. (1 rows failed)`.
    pub fn message(&self) -> String {
        let mut msg = format!("Imported {} items successfully.", self.imported);
        if self.failed > 0 {
            msg.push_str(&format!(" ({} rows failed)", self.failed));
        }
        msg
    }
}

/// One exported inventory line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InventoryRow {
    pub category: String,
    pub name: String,
    pub quantity: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================
