// Record parser - one filtered RawRow → one validated, immutable record
//
// All coercion is explicit and checked: the column mapping names which
// source columns feed which logical fields, and every cross-field
// invariant (unit price consistency, positive quantity) is enforced at
// construction. Malformed rows are reported to the caller; per-row
// skip/abort policy lives in the batch driver, not here.

use crate::coercion::{coerce_decimal, coerce_integer, CoercionError};
use crate::dates::{resolve_date, DateOrder, DateParseError};
use crate::row::RawRow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// VALIDATED RECORDS
// ============================================================================

/// SalesRecord - one validated transaction line.
///
/// Invariant (checked at parse): `round(total_sales_usd / quantity_sold, 3)
/// == unit_price`. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub date: NaiveDate,
    pub category: String,
    pub product: String,
    pub quantity_sold: u32,
    pub total_sales_usd: f64,
    pub unit_price: f64,
}

impl SalesRecord {
    /// Re-derive the unit price from the stored totals. For any validated
    /// record this reproduces `unit_price` exactly.
    pub fn derived_unit_price(&self) -> f64 {
        round3(self.total_sales_usd / self.quantity_sold as f64)
    }
}

/// DealerProfitEntry - one dealer-level profit line from the pivot sheets.
/// Profit may be negative; year/model/quantity are present only on the
/// sheets that carry those columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealerProfitEntry {
    pub dealer_id: u32,
    pub profit: f64,
    pub year: Option<i32>,
    pub model: Option<String>,
    pub quantity_sold: Option<u32>,
}

// ============================================================================
// COLUMN MAPPING
// ============================================================================

/// ColumnMap - logical field → source column name.
///
/// The defaults match the observed exports; pivot sheets that rename
/// columns ("Sum of Quantity Sold", "Sum of Profit") override per sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMap {
    pub date: String,
    pub category: String,
    pub product: String,
    pub quantity_sold: String,
    pub total_sales_usd: String,
    pub unit_price: String,
    pub dealer_id: String,
    pub profit: String,
    pub year: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        ColumnMap {
            date: "Date".to_string(),
            category: "Category".to_string(),
            product: "Model".to_string(),
            quantity_sold: "Quantity Sold".to_string(),
            total_sales_usd: "Total Sales".to_string(),
            unit_price: "Unit Price".to_string(),
            dealer_id: "Dealer ID".to_string(),
            profit: "Profit".to_string(),
            year: "Year".to_string(),
        }
    }
}

// ============================================================================
// ERROR TAXONOMY
// ============================================================================

/// Row-local, deterministic parse failures. None are retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("column {0:?} missing from row")]
    MissingColumn(String),

    #[error("column {column:?}: {source}")]
    Coercion {
        column: String,
        source: CoercionError,
    },

    #[error("column {column:?}: {source}")]
    Date {
        column: String,
        source: DateParseError,
    },

    #[error("quantity sold must be positive, got {0}")]
    ZeroQuantity(i64),

    #[error("dealer id must be a positive integer, got {0}")]
    InvalidDealerId(i64),

    #[error("column {column:?} must be non-negative, got {value}")]
    NegativeAmount { column: String, value: f64 },

    #[error("unit price mismatch: declared {declared:.3}, calculated {calculated:.3}")]
    Consistency { declared: f64, calculated: f64 },
}

/// Round to 3 fractional digits (unit prices are stored at that scale).
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

// Declared and calculated unit prices are both 3-digit decimals, so any
// genuine mismatch is at least 0.001; the epsilon only absorbs float noise.
const UNIT_PRICE_EPSILON: f64 = 1e-6;

// ============================================================================
// RECORD PARSER
// ============================================================================

/// RecordParser - builds typed records from filtered raw rows.
/// Embeds the consistency validator; holds no state across rows.
#[derive(Debug, Clone, Default)]
pub struct RecordParser {
    columns: ColumnMap,
    date_order: DateOrder,
}

impl RecordParser {
    pub fn new(columns: ColumnMap) -> Self {
        RecordParser {
            columns,
            date_order: DateOrder::default(),
        }
    }

    /// Builder pattern: override the date-ambiguity resolution order
    pub fn with_date_order(mut self, order: DateOrder) -> Self {
        self.date_order = order;
        self
    }

    pub fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    /// Parse one sales transaction line.
    pub fn parse_sales(&self, row: &RawRow) -> Result<SalesRecord, ParseError> {
        let date = self.date_field(row, &self.columns.date)?;
        let category = self.text_field(row, &self.columns.category)?;
        let product = self.text_field(row, &self.columns.product)?;

        let quantity = self.integer_field(row, &self.columns.quantity_sold)?;
        if quantity <= 0 {
            return Err(ParseError::ZeroQuantity(quantity));
        }
        let quantity_sold = self.narrow_u32(quantity, &self.columns.quantity_sold)?;

        let total_sales_usd =
            self.non_negative_field(row, &self.columns.total_sales_usd)?;
        let unit_price = self.non_negative_field(row, &self.columns.unit_price)?;

        // Consistency validation: the declared unit price must match the
        // one derived from total and quantity at 3-digit precision.
        let calculated = round3(total_sales_usd / quantity_sold as f64);
        if (calculated - unit_price).abs() > UNIT_PRICE_EPSILON {
            return Err(ParseError::Consistency {
                declared: unit_price,
                calculated,
            });
        }

        Ok(SalesRecord {
            date,
            category,
            product,
            quantity_sold,
            total_sales_usd,
            unit_price,
        })
    }

    /// Parse one dealer profit line. Year, model and quantity are optional:
    /// only the sheets that carry those columns populate them.
    pub fn parse_dealer(&self, row: &RawRow) -> Result<DealerProfitEntry, ParseError> {
        let id = self.integer_field(row, &self.columns.dealer_id)?;
        if id <= 0 {
            return Err(ParseError::InvalidDealerId(id));
        }

        let profit = self.decimal_field(row, &self.columns.profit)?;

        let dealer_id = self.narrow_u32(id, &self.columns.dealer_id)?;

        let year = match row.get(&self.columns.year) {
            Some(Value::Null) | None => None,
            Some(_) => {
                let year = self.integer_field(row, &self.columns.year)?;
                Some(self.narrow_i32(year, &self.columns.year)?)
            }
        };

        let model = match row.get(&self.columns.product) {
            Some(Value::Null) | None => None,
            Some(_) => Some(self.text_field(row, &self.columns.product)?),
        };

        let quantity_sold = match row.get(&self.columns.quantity_sold) {
            Some(Value::Null) | None => None,
            Some(_) => {
                let quantity = self.integer_field(row, &self.columns.quantity_sold)?;
                if quantity <= 0 {
                    return Err(ParseError::ZeroQuantity(quantity));
                }
                Some(self.narrow_u32(quantity, &self.columns.quantity_sold)?)
            }
        };

        Ok(DealerProfitEntry {
            dealer_id,
            profit,
            year,
            model,
            quantity_sold,
        })
    }

    // ========================================================================
    // FIELD ACCESSORS
    // ========================================================================

    fn cell<'a>(&self, row: &'a RawRow, column: &str) -> Result<&'a Value, ParseError> {
        row.get(column)
            .ok_or_else(|| ParseError::MissingColumn(column.to_string()))
    }

    fn decimal_field(&self, row: &RawRow, column: &str) -> Result<f64, ParseError> {
        coerce_decimal(self.cell(row, column)?).map_err(|source| ParseError::Coercion {
            column: column.to_string(),
            source,
        })
    }

    fn non_negative_field(&self, row: &RawRow, column: &str) -> Result<f64, ParseError> {
        let value = self.decimal_field(row, column)?;
        if value < 0.0 {
            return Err(ParseError::NegativeAmount {
                column: column.to_string(),
                value,
            });
        }
        Ok(value)
    }

    // `as` narrowing truncates silently (2^32 + 5 would become quantity 5);
    // out-of-range values must be rejected, not wrapped.
    fn narrow_u32(&self, value: i64, column: &str) -> Result<u32, ParseError> {
        u32::try_from(value).map_err(|_| ParseError::Coercion {
            column: column.to_string(),
            source: CoercionError::OutOfRange(value as f64),
        })
    }

    fn narrow_i32(&self, value: i64, column: &str) -> Result<i32, ParseError> {
        i32::try_from(value).map_err(|_| ParseError::Coercion {
            column: column.to_string(),
            source: CoercionError::OutOfRange(value as f64),
        })
    }

    fn integer_field(&self, row: &RawRow, column: &str) -> Result<i64, ParseError> {
        coerce_integer(self.cell(row, column)?).map_err(|source| ParseError::Coercion {
            column: column.to_string(),
            source,
        })
    }

    fn text_field(&self, row: &RawRow, column: &str) -> Result<String, ParseError> {
        match self.cell(row, column)? {
            Value::String(s) => Ok(s.clone()),
            other => Ok(other.to_string()),
        }
    }

    fn date_field(&self, row: &RawRow, column: &str) -> Result<NaiveDate, ParseError> {
        let cell = self.cell(row, column)?;
        let text = match cell {
            Value::String(s) => s.as_str(),
            other => {
                return Err(ParseError::Coercion {
                    column: column.to_string(),
                    source: CoercionError::UnsupportedType(match other {
                        Value::Null => "null",
                        Value::Bool(_) => "bool",
                        Value::Number(_) => "number",
                        Value::Array(_) => "array",
                        _ => "object",
                    }),
                })
            }
        };

        resolve_date(text, self.date_order).map_err(|source| ParseError::Date {
            column: column.to_string(),
            source,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sales_row() -> RawRow {
        RawRow::new()
            .with("Date", "10/2/2020")
            .with("Category", "Sales")
            .with("Model", "Politi")
            .with("Quantity Sold", 58118)
            .with("Total Sales", 1_125_920.014)
            .with("Unit Price", 19.373)
    }

    fn dealer_row() -> RawRow {
        RawRow::new()
            .with("Dealer ID", 1212)
            .with("Profit", "$2,500.00")
            .with("Year", 2018)
            .with("Model", "Hudson")
    }

    #[test]
    fn test_parse_valid_sales_record() {
        let parser = RecordParser::default();
        let record = parser.parse_sales(&sales_row()).unwrap();

        assert_eq!(record.date, NaiveDate::from_ymd_opt(2020, 10, 2).unwrap());
        assert_eq!(record.category, "Sales");
        assert_eq!(record.product, "Politi");
        assert_eq!(record.quantity_sold, 58118);
        assert_eq!(record.total_sales_usd, 1_125_920.014);
        assert_eq!(record.unit_price, 19.373);
    }

    #[test]
    fn test_unit_price_round_trip() {
        let parser = RecordParser::default();
        let record = parser.parse_sales(&sales_row()).unwrap();

        assert_eq!(record.derived_unit_price(), record.unit_price);
    }

    #[test]
    fn test_consistency_rejects_off_by_one_milli() {
        let parser = RecordParser::default();
        let row = sales_row().with("Unit Price", 19.374);

        match parser.parse_sales(&row) {
            Err(ParseError::Consistency {
                declared,
                calculated,
            }) => {
                assert_eq!(declared, 19.374);
                assert_eq!(calculated, 19.373);
            }
            other => panic!("expected Consistency error, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_quantity_rejected_before_division() {
        let parser = RecordParser::default();
        let row = sales_row().with("Quantity Sold", 0);

        assert_eq!(
            parser.parse_sales(&row).unwrap_err(),
            ParseError::ZeroQuantity(0)
        );

        let row = sales_row().with("Quantity Sold", -5);
        assert_eq!(
            parser.parse_sales(&row).unwrap_err(),
            ParseError::ZeroQuantity(-5)
        );
    }

    #[test]
    fn test_missing_column_reported_by_name() {
        let parser = RecordParser::default();
        let row = RawRow::new().with("Date", "10/2/2020");

        assert_eq!(
            parser.parse_sales(&row).unwrap_err(),
            ParseError::MissingColumn("Category".to_string())
        );
    }

    #[test]
    fn test_date_error_propagates_with_column_context() {
        let parser = RecordParser::default();
        let row = sales_row().with("Date", "31/31/2020");

        match parser.parse_sales(&row).unwrap_err() {
            ParseError::Date { column, source } => {
                assert_eq!(column, "Date");
                assert_eq!(source.input, "31/31/2020");
            }
            other => panic!("expected Date error, got {:?}", other),
        }
    }

    #[test]
    fn test_coercion_error_propagates_with_column_context() {
        let parser = RecordParser::default();
        let row = sales_row().with("Total Sales", "n/a");

        match parser.parse_sales(&row).unwrap_err() {
            ParseError::Coercion { column, .. } => assert_eq!(column, "Total Sales"),
            other => panic!("expected Coercion error, got {:?}", other),
        }
    }

    #[test]
    fn test_day_first_configuration() {
        let parser = RecordParser::default().with_date_order(DateOrder::DayFirst);
        let row = sales_row().with("Date", "10/2/2020");
        let record = parser.parse_sales(&row).unwrap();

        assert_eq!(record.date, NaiveDate::from_ymd_opt(2020, 2, 10).unwrap());
    }

    #[test]
    fn test_parse_dealer_entry() {
        let parser = RecordParser::default();
        let entry = parser.parse_dealer(&dealer_row()).unwrap();

        assert_eq!(entry.dealer_id, 1212);
        assert_eq!(entry.profit, 2500.0);
        assert_eq!(entry.year, Some(2018));
        assert_eq!(entry.model, Some("Hudson".to_string()));
        assert_eq!(entry.quantity_sold, None);
    }

    #[test]
    fn test_parse_dealer_negative_profit_allowed() {
        let parser = RecordParser::default();
        let row = dealer_row().with("Profit", "-$1,250.75");
        let entry = parser.parse_dealer(&row).unwrap();

        assert_eq!(entry.profit, -1250.75);
    }

    #[test]
    fn test_parse_dealer_with_renamed_pivot_columns() {
        let columns = ColumnMap {
            quantity_sold: "Sum of Quantity Sold".to_string(),
            profit: "Sum of Profit".to_string(),
            ..ColumnMap::default()
        };
        let parser = RecordParser::new(columns);

        let row = RawRow::new()
            .with("Dealer ID", 1288)
            .with("Sum of Profit", 0)
            .with("Sum of Quantity Sold", 2644);

        let entry = parser.parse_dealer(&row).unwrap();
        assert_eq!(entry.dealer_id, 1288);
        assert_eq!(entry.quantity_sold, Some(2644));
    }

    #[test]
    fn test_parse_dealer_rejects_non_positive_id() {
        let parser = RecordParser::default();
        let row = dealer_row().with("Dealer ID", 0);

        assert_eq!(
            parser.parse_dealer(&row).unwrap_err(),
            ParseError::InvalidDealerId(0)
        );
    }

    #[test]
    fn test_widened_float_ids_accepted() {
        // Spreadsheet readers hand integer columns back as floats
        let parser = RecordParser::default();
        let row = dealer_row().with("Dealer ID", 1336.0);
        let entry = parser.parse_dealer(&row).unwrap();

        assert_eq!(entry.dealer_id, 1336);
    }

    #[test]
    fn test_oversized_quantity_rejected_not_truncated() {
        // 2^32 + 5 must not wrap to quantity 5 (which would make the
        // $12,500 @ $2,500 row look consistent)
        let parser = RecordParser::default();
        let row = sales_row()
            .with("Quantity Sold", 4_294_967_301_i64)
            .with("Total Sales", 12500.0)
            .with("Unit Price", 2500.0);

        match parser.parse_sales(&row).unwrap_err() {
            ParseError::Coercion { column, source } => {
                assert_eq!(column, "Quantity Sold");
                assert_eq!(source, CoercionError::OutOfRange(4_294_967_301_i64 as f64));
            }
            other => panic!("expected Coercion error, got {:?}", other),
        }
    }

    #[test]
    fn test_oversized_dealer_id_rejected_not_truncated() {
        // 2^32 + 1 must not wrap to dealer 1
        let parser = RecordParser::default();
        let row = dealer_row().with("Dealer ID", 4_294_967_297_i64);

        match parser.parse_dealer(&row).unwrap_err() {
            ParseError::Coercion { column, source } => {
                assert_eq!(column, "Dealer ID");
                assert_eq!(source, CoercionError::OutOfRange(4_294_967_297_i64 as f64));
            }
            other => panic!("expected Coercion error, got {:?}", other),
        }
    }

    #[test]
    fn test_oversized_year_rejected() {
        let parser = RecordParser::default();
        let row = dealer_row().with("Year", 3_000_000_000_i64);

        match parser.parse_dealer(&row).unwrap_err() {
            ParseError::Coercion { column, source } => {
                assert_eq!(column, "Year");
                assert_eq!(source, CoercionError::OutOfRange(3e9));
            }
            other => panic!("expected Coercion error, got {:?}", other),
        }
    }

    #[test]
    fn test_negative_total_rejected_even_when_mutually_consistent() {
        // -10000 / 4 = -2500 satisfies the consistency equation, but both
        // fields are declared non-negative
        let parser = RecordParser::default();
        let row = sales_row()
            .with("Quantity Sold", 4)
            .with("Total Sales", -10000.0)
            .with("Unit Price", -2500.0);

        assert_eq!(
            parser.parse_sales(&row).unwrap_err(),
            ParseError::NegativeAmount {
                column: "Total Sales".to_string(),
                value: -10000.0,
            }
        );
    }

    #[test]
    fn test_negative_unit_price_rejected() {
        let parser = RecordParser::default();
        let row = sales_row()
            .with("Quantity Sold", 4)
            .with("Total Sales", 10000.0)
            .with("Unit Price", -2500.0);

        assert_eq!(
            parser.parse_sales(&row).unwrap_err(),
            ParseError::NegativeAmount {
                column: "Unit Price".to_string(),
                value: -2500.0,
            }
        );
    }

    #[test]
    fn test_numeric_model_cell_coerced_to_text() {
        // Optional fields get the same lenient text coercion as required ones
        let parser = RecordParser::default();
        let row = dealer_row().with("Model", 42);
        let entry = parser.parse_dealer(&row).unwrap();

        assert_eq!(entry.model, Some("42".to_string()));
    }

    #[test]
    fn test_round3() {
        assert_eq!(round3(19.3726), 19.373);
        assert_eq!(round3(19.3724), 19.372);
        assert_eq!(round3(2500.0), 2500.0);
    }
}
