//! # Inventory CSV Codec
//!
//! Reads and writes the deliberately small CSV dialect used for bulk
//! import/export.
//!
//! ## Dialect
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  category,name,quantity        ← header required, any case/order       │
//! │  Resistors,Resistor 10k,5      ← fields split on ',' and trimmed        │
//! │  ,LED red,12                   ← blank category → Uncategorized         │
//! │                                ← blank lines skipped                    │
//! │  Caps,Electrolytic 100uF,abc   ← unparsable quantity → 0                │
//! │  Caps,,3                       ← blank name → row error                 │
//! │  Caps,Cap,99999999999          ← above MAX_QUANTITY → row error         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Quoting is switched off: `"` is an ordinary character and an embedded
//! comma always splits a field. Export writes fields raw for the same reason,
//! so a name containing a comma does not survive a round trip.

use crate::error::{CoreResult, ValidationError};
use crate::types::InventoryRow;
use crate::{MAX_QUANTITY, UNCATEGORIZED_NAME};

/// Required header columns, in export order.
pub const CSV_COLUMNS: [&str; 3] = ["category", "name", "quantity"];

/// A data row that passed row-level checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRow {
    /// 1-based physical line number in the source text.
    pub line: u64,
    pub category: String,
    pub name: String,
    pub quantity: i64,
}

/// A data row rejected by row-level checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub line: u64,
    pub reason: String,
}

/// Parsed file: one entry per non-blank data line, in file order.
#[derive(Debug, Clone, Default)]
pub struct ParsedCsv {
    pub rows: Vec<Result<ImportRow, RowError>>,
}

impl ParsedCsv {
    /// Rows that can be merged into the inventory.
    pub fn valid_rows(&self) -> impl Iterator<Item = &ImportRow> {
        self.rows.iter().filter_map(|r| r.as_ref().ok())
    }

    /// Number of rows rejected while parsing.
    pub fn error_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_err()).count()
    }
}

/// Parses inventory CSV text.
///
/// ## Errors
/// - [`ValidationError::MissingColumns`] if the header lacks any of
///   `category`, `name`, `quantity`
/// - [`ValidationError::NoDataRows`] if there is no data line at all
///
/// Problems confined to a single row never fail the parse; they show up as
/// `Err(RowError)` entries.
///
/// ## Example
/// ```rust
/// use partshop_core::csv::parse_inventory_csv;
///
/// let parsed = parse_inventory_csv("Quantity,Name,Category\r\n5,10k,Resistors\r\n").unwrap();
/// let row = parsed.valid_rows().next().unwrap();
/// assert_eq!((row.category.as_str(), row.name.as_str(), row.quantity), ("Resistors", "10k", 5));
/// ```
pub fn parse_inventory_csv(text: &str) -> Result<ParsedCsv, ValidationError> {
    let text = text.trim_start_matches('\u{feff}');

    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .trim(::csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| ValidationError::InvalidFormat {
            field: "header".to_string(),
            reason: e.to_string(),
        })?
        .clone();

    let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));

    let (Some(idx_category), Some(idx_name), Some(idx_quantity)) =
        (column("category"), column("name"), column("quantity"))
    else {
        let columns = CSV_COLUMNS
            .iter()
            .filter(|c| column(c).is_none())
            .map(|c| c.to_string())
            .collect();
        return Err(ValidationError::MissingColumns { columns });
    };

    let mut parsed = ParsedCsv::default();

    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                parsed.rows.push(Err(RowError {
                    line,
                    reason: e.to_string(),
                }));
                continue;
            }
        };

        let line = record.position().map(|p| p.line()).unwrap_or(0);

        // Whitespace-only line.
        if record.len() == 1 && record.get(0).map_or(true, str::is_empty) {
            continue;
        }

        if record.len() != headers.len() {
            parsed.rows.push(Err(RowError {
                line,
                reason: format!(
                    "expected {} fields, found {}",
                    headers.len(),
                    record.len()
                ),
            }));
            continue;
        }

        let name = record.get(idx_name).unwrap_or_default();
        if name.is_empty() {
            parsed.rows.push(Err(RowError {
                line,
                reason: "name is required".to_string(),
            }));
            continue;
        }

        let category = match record.get(idx_category).unwrap_or_default() {
            "" => UNCATEGORIZED_NAME,
            other => other,
        };

        let quantity = parse_quantity(record.get(idx_quantity).unwrap_or_default());
        if quantity > MAX_QUANTITY {
            parsed.rows.push(Err(RowError {
                line,
                reason: format!("quantity exceeds {}", MAX_QUANTITY),
            }));
            continue;
        }

        parsed.rows.push(Ok(ImportRow {
            line,
            category: category.to_string(),
            name: name.to_string(),
            quantity,
        }));
    }

    if parsed.rows.is_empty() {
        return Err(ValidationError::NoDataRows);
    }

    Ok(parsed)
}

/// Lenient quantity parse: the leading run of digits, else 0.
///
/// `"12"` → 12, `"12 pcs"` → 12, `"+3"` → 3, `"-4"` → 0, `"abc"` → 0.
/// Negative values are not accepted because on-hand quantity never drops
/// below zero. A run of digits too long for `i64` saturates to `i64::MAX`
/// so the caller can reject it.
pub fn parse_quantity(cell: &str) -> i64 {
    let cell = cell.trim();
    let digits = cell.strip_prefix('+').unwrap_or(cell);
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return 0;
    }
    digits[..end].parse::<i64>().unwrap_or(i64::MAX)
}

/// Serializes inventory rows as `category,name,quantity` CSV text.
///
/// Fields are written without quoting or escaping.
pub fn write_inventory_csv(rows: &[InventoryRow]) -> CoreResult<String> {
    let mut writer = ::csv::WriterBuilder::new()
        .quote_style(::csv::QuoteStyle::Never)
        .terminator(::csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(CSV_COLUMNS)?;
    for row in rows {
        writer.write_record([
            row.category.as_str(),
            row.name.as_str(),
            row.quantity.to_string().as_str(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| crate::CoreError::Csv(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| crate::CoreError::Csv(e.to_string()))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_rows() {
        let text = "category,name,quantity\nResistors,Resistor 10k,5\nResistors,Resistor 10k,3";
        let parsed = parse_inventory_csv(text).unwrap();

        let rows: Vec<_> = parsed.valid_rows().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].category, "Resistors");
        assert_eq!(rows[0].name, "Resistor 10k");
        assert_eq!(rows[0].quantity, 5);
        assert_eq!(rows[1].quantity, 3);
        assert_eq!(rows[1].line, 3);
    }

    #[test]
    fn test_header_case_and_order_tolerated() {
        let parsed = parse_inventory_csv("NAME, Quantity ,CATEGORY\nLED,4,Optics\n").unwrap();
        let row = parsed.valid_rows().next().unwrap();
        assert_eq!(row.name, "LED");
        assert_eq!(row.category, "Optics");
        assert_eq!(row.quantity, 4);
    }

    #[test]
    fn test_missing_columns_rejected() {
        let err = parse_inventory_csv("category,title\nA,B\n").unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingColumns {
                columns: vec!["name".to_string(), "quantity".to_string()]
            }
        );
    }

    #[test]
    fn test_empty_file_rejected() {
        assert!(parse_inventory_csv("").is_err());
        assert_eq!(
            parse_inventory_csv("category,name,quantity\n\n   \n").unwrap_err(),
            ValidationError::NoDataRows
        );
    }

    #[test]
    fn test_crlf_and_blank_lines() {
        let text = "category,name,quantity\r\n\r\nCaps,100nF,10\r\n   \r\nCaps,10uF,2\r\n";
        let parsed = parse_inventory_csv(text).unwrap();
        assert_eq!(parsed.valid_rows().count(), 2);
        assert_eq!(parsed.error_count(), 0);
    }

    #[test]
    fn test_row_level_defaults_and_errors() {
        let text = "category,name,quantity\n,LED,3\nCaps,,3\nCaps,Cap,lots\nCaps,Cap,1,extra\n";
        let parsed = parse_inventory_csv(text).unwrap();

        assert_eq!(parsed.rows.len(), 4);
        assert_eq!(parsed.error_count(), 2);

        let valid: Vec<_> = parsed.valid_rows().collect();
        assert_eq!(valid[0].category, UNCATEGORIZED_NAME);
        assert_eq!(valid[1].quantity, 0);
    }

    #[test]
    fn test_oversized_quantity_is_a_row_error() {
        let text = format!(
            "category,name,quantity\nCaps,Big,{}\nCaps,Bigger,{}\nCaps,Huge,99999999999999999999\n",
            MAX_QUANTITY,
            MAX_QUANTITY + 1
        );
        let parsed = parse_inventory_csv(&text).unwrap();
        assert_eq!(parsed.error_count(), 2);
        let valid: Vec<_> = parsed.valid_rows().collect();
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].quantity, MAX_QUANTITY);
        assert!(parsed.rows[1].as_ref().unwrap_err().reason.contains("quantity"));
    }

    #[test]
    fn test_quotes_are_literal() {
        let parsed = parse_inventory_csv("category,name,quantity\nMisc,\"Wire, 22AWG\",3\n").unwrap();
        // The embedded comma splits the field: four fields instead of three.
        assert_eq!(parsed.error_count(), 1);

        let parsed = parse_inventory_csv("category,name,quantity\nMisc,\"Wire\",3\n").unwrap();
        assert_eq!(parsed.valid_rows().next().unwrap().name, "\"Wire\"");
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("12"), 12);
        assert_eq!(parse_quantity(" 12 pcs"), 12);
        assert_eq!(parse_quantity("+3"), 3);
        assert_eq!(parse_quantity("-4"), 0);
        assert_eq!(parse_quantity("abc"), 0);
        assert_eq!(parse_quantity(""), 0);
        assert_eq!(parse_quantity("99999999999999999999"), i64::MAX);
    }

    #[test]
    fn test_write_inventory_csv() {
        let rows = vec![
            InventoryRow {
                category: "Caps".to_string(),
                name: "100nF".to_string(),
                quantity: 10,
            },
            InventoryRow {
                category: "Resistors".to_string(),
                name: "10k".to_string(),
                quantity: 0,
            },
        ];
        let text = write_inventory_csv(&rows).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines, vec!["category,name,quantity", "Caps,100nF,10", "Resistors,10k,0"]);
    }
}
