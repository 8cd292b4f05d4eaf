// Raw spreadsheet rows - untyped input handed over by the file-reading collaborator

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// RawRow - one untyped spreadsheet row: column name → cell value.
///
/// Cells arrive as whatever the reader produced (strings, numbers, nulls).
/// Rows are never retained past the parse step; the typed records own
/// their data outright.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    cells: HashMap<String, Value>,
}

impl RawRow {
    pub fn new() -> Self {
        RawRow {
            cells: HashMap::new(),
        }
    }

    /// Builder pattern: set one cell
    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.cells.insert(column.to_string(), value.into());
        self
    }

    /// Cell lookup by source column name
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.cells.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.cells.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl FromIterator<(String, Value)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        RawRow {
            cells: iter.into_iter().collect(),
        }
    }
}
