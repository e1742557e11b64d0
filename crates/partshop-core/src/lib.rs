//! # partshop-core: Pure Domain Logic for PartShop
//!
//! This crate holds everything about the inventory that can be expressed
//! without touching a database or a filesystem.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        PartShop Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │             UI collaborator / `partshop` CLI                    │   │
//! │  │    Category list ──► Item list ──► Shopping list ──► Settings   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ partshop-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌─────────────┐  ┌───────────┐                │   │
//! │  │   │   types   │  │ validation  │  │    csv    │                │   │
//! │  │   │ Category  │  │ names, qty  │  │  parse /  │                │   │
//! │  │   │ Item ...  │  │ search text │  │  write    │                │   │
//! │  │   └───────────┘  └─────────────┘  └───────────┘                │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO FILESYSTEM                          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 partshop-db (Storage Layer)                     │   │
//! │  │      SQLite, migrations, repositories, attachment files         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Typed records (Category, Item, ShoppingListEntry, ...)
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//! - [`csv`] - The restricted `category,name,quantity` CSV dialect
//!
//! ## Example Usage
//!
//! ```rust
//! use partshop_core::csv::parse_inventory_csv;
//!
//! let parsed = parse_inventory_csv("category,name,quantity\nResistors,10k,5\n").unwrap();
//! assert_eq!(parsed.rows.len(), 1);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod csv;
pub mod error;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Id of the permanent fallback category.
///
/// Seeded once at schema creation. Items and shopping-list entries whose
/// category is deleted are reassigned here.
pub const UNCATEGORIZED_ID: i64 = 1;

/// Name of the permanent fallback category.
///
/// Also the category an import row lands in when its `category` cell is blank.
pub const UNCATEGORIZED_NAME: &str = "Uncategorized";

/// Maximum length (in characters) of a category or item name.
pub const MAX_NAME_LENGTH: usize = 200;

/// Maximum length of a search query.
pub const MAX_QUERY_LENGTH: usize = 100;

/// Upper bound for any stored or merged quantity.
///
/// Two bounded quantities always add up without leaving SQLite's integer
/// range, so merges never turn a quantity into a REAL.
pub const MAX_QUANTITY: i64 = 1_000_000_000;

/// Key under which the theme preference is stored in `settings`.
pub const THEME_SETTING_KEY: &str = "theme";
