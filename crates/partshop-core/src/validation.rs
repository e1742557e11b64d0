//! # Validation Module
//!
//! Input validation for names, quantities and search text.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE                                                  │
//! │  ├── Trimming, empty checks, length limits                             │
//! │  └── Quantity ranges                                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Database (SQLite)                                            │
//! │  ├── UNIQUE(categories.name), UNIQUE(items.category_id, items.name)    │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Validators that accept names return the trimmed value so callers store
//! exactly what was checked.

use crate::error::ValidationError;
use crate::{MAX_NAME_LENGTH, MAX_QUANTITY, MAX_QUERY_LENGTH};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

fn validate_name(field: &str, name: &str) -> ValidationResult<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::required(field));
    }

    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LENGTH,
        });
    }

    Ok(name.to_string())
}

/// Validates a category name.
///
/// ## Example
/// ```rust
/// use partshop_core::validation::validate_category_name;
///
/// assert_eq!(validate_category_name("  Resistors ").unwrap(), "Resistors");
/// assert!(validate_category_name("   ").is_err());
/// ```
pub fn validate_category_name(name: &str) -> ValidationResult<String> {
    validate_name("category name", name)
}

/// Validates an item (or shopping-list entry) name.
pub fn validate_item_name(name: &str) -> ValidationResult<String> {
    validate_name("name", name)
}

/// Validates a search query.
///
/// Empty is allowed (matches everything). Returns the trimmed query.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.chars().count() > MAX_QUERY_LENGTH {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: MAX_QUERY_LENGTH,
        });
    }

    Ok(query.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

fn validate_range(field: &str, quantity: i64, min: i64) -> ValidationResult<()> {
    if !(min..=MAX_QUANTITY).contains(&quantity) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min,
            max: MAX_QUANTITY,
        });
    }
    Ok(())
}

/// Validates an on-hand quantity (0 ..= [`MAX_QUANTITY`]).
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    validate_range("quantity", quantity, 0)
}

/// Validates a shopping-list target quantity (1 ..= [`MAX_QUANTITY`]).
pub fn validate_target_quantity(quantity: i64) -> ValidationResult<()> {
    validate_range("target quantity", quantity, 1)
}

/// Validates the result of adding `delta` to a stored quantity.
///
/// `current` comes from the store and may predate the bound, so the sum is
/// checked without overflowing.
pub fn validate_merged_quantity(current: i64, delta: i64) -> ValidationResult<i64> {
    current
        .checked_add(delta)
        .filter(|total| *total <= MAX_QUANTITY)
        .ok_or_else(|| ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 0,
            max: MAX_QUANTITY,
        })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_trimmed() {
        assert_eq!(validate_item_name("  Resistor  ").unwrap(), "Resistor");
        assert_eq!(validate_category_name("Caps\t").unwrap(), "Caps");
    }

    #[test]
    fn test_empty_names_rejected() {
        assert_eq!(
            validate_item_name(""),
            Err(ValidationError::required("name"))
        );
        assert!(validate_category_name(" \n ").is_err());
    }

    #[test]
    fn test_long_names_rejected() {
        let long = "x".repeat(MAX_NAME_LENGTH + 1);
        assert!(matches!(
            validate_item_name(&long),
            Err(ValidationError::TooLong { .. })
        ));
        assert!(validate_item_name(&"x".repeat(MAX_NAME_LENGTH)).is_ok());
    }

    #[test]
    fn test_quantities() {
        assert!(validate_quantity(0).is_ok());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_target_quantity(1).is_ok());
        assert!(validate_target_quantity(0).is_err());
        assert!(validate_quantity(MAX_QUANTITY).is_ok());
        assert!(validate_quantity(MAX_QUANTITY + 1).is_err());
        assert!(validate_target_quantity(i64::MAX).is_err());
    }

    #[test]
    fn test_merged_quantity_stays_bounded() {
        assert_eq!(validate_merged_quantity(5, 3), Ok(8));
        assert_eq!(validate_merged_quantity(MAX_QUANTITY - 1, 1), Ok(MAX_QUANTITY));
        assert!(validate_merged_quantity(MAX_QUANTITY, 1).is_err());
        assert!(validate_merged_quantity(i64::MAX, 1).is_err());
    }

    #[test]
    fn test_search_query() {
        assert_eq!(validate_search_query("  10k ").unwrap(), "10k");
        assert_eq!(validate_search_query("").unwrap(), "");
        assert!(validate_search_query(&"q".repeat(MAX_QUERY_LENGTH + 1)).is_err());
    }
}
