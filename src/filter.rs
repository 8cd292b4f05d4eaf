// Sentinel row filter - strips "Grand Total" (and similar) marker rows
//
// Pivot-table exports append subtotal rows whose key column holds a text
// token instead of data. Those rows must be removed before any numeric
// coercion of that column, otherwise the token shows up as a spurious
// coercion failure.

use crate::row::RawRow;
use serde_json::Value;

/// Default sentinel token used by the observed exports.
pub const GRAND_TOTAL: &str = "Grand Total";

/// SentinelRowFilter - excludes rows whose key column equals the sentinel
/// token (case-sensitive exact match).
#[derive(Debug, Clone)]
pub struct SentinelRowFilter {
    key_column: String,
    token: String,
}

impl SentinelRowFilter {
    pub fn new(key_column: &str) -> Self {
        SentinelRowFilter {
            key_column: key_column.to_string(),
            token: GRAND_TOTAL.to_string(),
        }
    }

    /// Builder pattern: override the sentinel token
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = token.to_string();
        self
    }

    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    /// True when the row's key column holds the sentinel token.
    /// Numeric cells can never match: the token is text.
    pub fn is_sentinel(&self, row: &RawRow) -> bool {
        matches!(row.get(&self.key_column), Some(Value::String(s)) if s == &self.token)
    }

    /// Lazily yield the non-sentinel subsequence. Single pass over the
    /// underlying source; not restartable.
    pub fn filter<'a, I>(&'a self, rows: I) -> impl Iterator<Item = RawRow> + 'a
    where
        I: IntoIterator<Item = RawRow>,
        I::IntoIter: 'a,
    {
        rows.into_iter().filter(move |row| !self.is_sentinel(row))
    }
}
