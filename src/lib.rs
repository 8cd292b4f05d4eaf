// Sales Pipeline - Core Library
// Ingestion, validation and aggregation for car-dealer sales spreadsheet
// exports. File reading and chart rendering are external collaborators:
// this crate turns their raw rows into validated records and keyed
// aggregation results, nothing more.

pub mod row;
pub mod coercion;
pub mod dates;
pub mod filter;
pub mod parser;
pub mod aggregate;
pub mod batch;
pub mod report;

// Re-export commonly used types
pub use row::RawRow;
pub use coercion::{coerce_decimal, coerce_integer, CoercionError};
pub use dates::{resolve_date, DateOrder, DateParseError};
pub use filter::{SentinelRowFilter, GRAND_TOTAL};
pub use parser::{
    round3, ColumnMap, DealerProfitEntry, ParseError, RecordParser, SalesRecord,
};
pub use aggregate::{
    aggregate, month_of, AggregationEntry, AggregationKey, AggregationResult, Dimension,
    EmptyInputError, GroupedMetrics, SortOrder, Totals,
};
pub use batch::{BatchIngestor, BatchResult, BatchSummary, ErrorPolicy, RowError};
pub use report::{format_usd, group_digits, render_profit_report, render_quantity_report};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Full pipeline: raw pivot rows → filter → parse → aggregate → report.
    #[test]
    fn test_pipeline_end_to_end() {
        let rows = vec![
            RawRow::new()
                .with("Dealer ID", 1222)
                .with("Profit", "$1,683.00"),
            RawRow::new()
                .with("Dealer ID", 1288)
                .with("Profit", "$2,644.00"),
            RawRow::new()
                .with("Dealer ID", json!("Grand Total"))
                .with("Profit", "$4,327.00"),
        ];

        let ingestor = BatchIngestor::new(
            RecordParser::new(ColumnMap::default()),
            SentinelRowFilter::new("Dealer ID"),
        );
        let batch = ingestor.ingest_dealers(rows).unwrap();
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.sentinel_rows, 1);
        assert!(batch.rejected.is_empty());

        let result = aggregate(
            &batch.records,
            |e| vec![Dimension::from(e.dealer_id)],
            |e| e.profit,
        )
        .sums();
        assert_eq!(result.grand_total(), 4327.0);

        let report = render_profit_report("Sum of Profit", result);
        assert!(report.contains("Dealer 1288: $2,644.00"));
        assert!(report.ends_with("Total Profit: $4,327.00"));
    }
}
