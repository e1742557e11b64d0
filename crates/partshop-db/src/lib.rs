//! # partshop-db: Storage Layer for PartShop
//!
//! SQLite persistence, schema migrations, attachment files and CSV
//! import/export, built on sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        PartShop Data Flow                               │
//! │                                                                         │
//! │  CLI command (partshop item add ...)                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   partshop-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐  ┌───────────────┐  ┌──────────────────┐   │   │
//! │  │   │   Database    │  │ Repositories  │  │   Migrations     │   │   │
//! │  │   │   (pool.rs)   │  │ category      │  │ user_version 1→5 │   │   │
//! │  │   │               │◄─│ item          │  └──────────────────┘   │   │
//! │  │   │ SqlitePool    │  │ shopping_list │  ┌──────────────────┐   │   │
//! │  │   │ Attachments   │  │ settings      │  │ Transfer (CSV)   │   │   │
//! │  │   └───────────────┘  └───────────────┘  └──────────────────┘   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                        │                        │
//! │       ▼                                        ▼                        │
//! │  partshop.db (SQLite)               attachments/{images,datasheets}    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation, repository accessors, wipe
//! - [`migrations`] - Versioned schema upgrades
//! - [`attachments`] - Attachment files and the post-commit release queue
//! - [`repository`] - Category, item, shopping list and settings repositories
//! - [`transfer`] - Bulk CSV import/export
//! - [`error`] - Database error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use partshop_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/partshop.db")).await?;
//! let summary = db.transfer().import_file("parts.csv".as_ref()).await?;
//! println!("{}", summary.message());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod attachments;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod transfer;

// =============================================================================
// Re-exports
// =============================================================================

pub use attachments::{AttachmentError, AttachmentKind, AttachmentStore, ReleaseQueue};
pub use error::{DbError, DbResult, ErrorKind};
pub use pool::{Database, DbConfig, WipeSummary};
pub use transfer::{ExportOutcome, FileShare, TransferService};

// Repository re-exports for convenience
pub use repository::{CategoryRepository, ItemRepository, SettingsRepository, ShoppingListRepository};
