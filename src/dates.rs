// Date resolution - ambiguous spreadsheet date strings → NaiveDate
//
// Exports mix regional conventions: "10/2/2020" may be October 2 or
// February 10. The resolver tries an explicit ordered list of candidate
// formats and reports a single typed failure only when all are exhausted.
// For day <= 12 the string is inherently ambiguous and the configured
// priority order decides; there is no further signal in the inputs.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which slash-delimited encoding is tried first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateOrder {
    /// MM/DD/YYYY, then DD/MM/YYYY (the observed exports' convention)
    #[default]
    MonthFirst,
    /// DD/MM/YYYY, then MM/DD/YYYY
    DayFirst,
}

impl DateOrder {
    /// Candidate formats in resolution priority order.
    fn candidates(self) -> [&'static str; 2] {
        match self {
            DateOrder::MonthFirst => ["%m/%d/%Y", "%d/%m/%Y"],
            DateOrder::DayFirst => ["%d/%m/%Y", "%m/%d/%Y"],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("date {input:?} matched none of the candidate formats")]
pub struct DateParseError {
    pub input: String,
}

/// Resolve a date string to a canonical calendar date (no time, no zone).
///
/// ISO `YYYY-MM-DD` is accepted ahead of the slash forms since it is
/// unambiguous and cannot shadow them.
pub fn resolve_date(input: &str, order: DateOrder) -> Result<NaiveDate, DateParseError> {
    let trimmed = input.trim();

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }

    for format in order.candidates() {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Ok(date);
        }
    }

    Err(DateParseError {
        input: input.to_string(),
    })
}
