// Report rendering - human-readable text for the aggregation results
//
// Format only, no behavior: numbers are comma-grouped, currency gets two
// decimals, percentages six. The shapes mirror the dealer reports the
// charts were built from.

use crate::aggregate::{AggregationResult, SortOrder};
use std::fmt::Write;

/// Comma-group an integer: 16207 → "16,207".
pub fn group_digits(value: i64) -> String {
    let digits = value.abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);

    let lead = digits.len() % 3;
    if lead > 0 {
        grouped.push_str(&digits[..lead]);
    }
    for (i, chunk) in digits[lead..].as_bytes().chunks(3).enumerate() {
        if lead > 0 || i > 0 {
            grouped.push(',');
        }
        grouped.push_str(std::str::from_utf8(chunk).expect("ascii digits"));
    }

    if value < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Currency rendering: 12551.25 → "$12,551.25", -855.94 → "-$855.94".
pub fn format_usd(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as i64;
    let formatted = format!("${}.{:02}", group_digits(cents / 100), cents % 100);
    if value < 0.0 {
        format!("-{}", formatted)
    } else {
        formatted
    }
}

/// Dealer quantity report: per-dealer quantity and percentage share,
/// largest first, with a grand-total line.
///
/// ```text
/// Quantity Sold by Dealer:
///  Dealer ID  Quantity Sold  Sales Percentage
///       1288           2644         12.242441
///       ...
///
/// Total Quantity Sold: 21,597
/// ```
pub fn render_quantity_report(result: AggregationResult) -> String {
    let result = result
        .with_percentages()
        .sorted(SortOrder::ValueDescending);
    let grand_total = result.grand_total().round() as i64;

    let mut out = String::new();
    out.push_str("Quantity Sold by Dealer:\n");
    let _ = writeln!(
        out,
        "{:>10}  {:>13}  {:>16}",
        "Dealer ID", "Quantity Sold", "Sales Percentage"
    );

    for entry in result.entries() {
        let key = entry
            .key
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("/");
        let _ = writeln!(
            out,
            "{:>10}  {:>13}  {:>16}",
            key,
            entry.value.round() as i64,
            format!("{:.6}", entry.percentage.unwrap_or(0.0)),
        );
    }

    let _ = write!(out, "\nTotal Quantity Sold: {}", group_digits(grand_total));
    out
}

/// Dealer profit report under a caller-supplied title, dealers in
/// ascending id order, with a grand-total line.
///
/// ```text
/// Sum of Profit - Hudson Models
///
/// Profit by Dealer ID:
/// Dealer 1212: $2,500.00
/// ...
///
/// Total Profit: $12,551.25
/// ```
pub fn render_profit_report(title: &str, result: AggregationResult) -> String {
    let result = result.sorted(SortOrder::KeyAscending);

    let mut out = String::new();
    let _ = writeln!(out, "{}", title);
    out.push_str("\nProfit by Dealer ID:\n");

    for entry in result.entries() {
        let key = entry
            .key
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("/");
        let _ = writeln!(out, "Dealer {}: {}", key, format_usd(entry.value));
    }

    let _ = write!(out, "\nTotal Profit: {}", format_usd(result.grand_total()));
    out
}
