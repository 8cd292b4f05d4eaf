// Batch ingestion driver - filter, parse and account for every row
//
// The pipeline core never decides what to do with a malformed row; that
// policy belongs here. Either rejected rows are collected alongside the
// accepted records (the default), or the first failure aborts the batch.
// Every row is accounted for: accepted, rejected or sentinel - nothing is
// silently dropped.

use crate::filter::SentinelRowFilter;
use crate::parser::{DealerProfitEntry, ParseError, RecordParser, SalesRecord};
use crate::row::RawRow;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

// ============================================================================
// POLICY AND OUTCOME TYPES
// ============================================================================

/// Per-row failure handling for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorPolicy {
    /// Keep going; collect rejected rows next to the accepted records.
    #[default]
    SkipAndCollect,
    /// Fail the whole batch on the first malformed row.
    AbortOnFirst,
}

/// One rejected row: where it was and why it failed.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("row {row_index}: {error}")]
pub struct RowError {
    pub row_index: usize,
    pub error: ParseError,
}

/// Outcome of one batch: accepted records plus full accounting of
/// everything that was not accepted.
#[derive(Debug, Clone)]
pub struct BatchResult<T> {
    pub records: Vec<T>,
    pub rejected: Vec<RowError>,
    pub sentinel_rows: usize,
    pub total_rows: usize,
}

impl<T> BatchResult<T> {
    /// Condense the outcome into reportable counts plus the first
    /// `first_n` error messages.
    pub fn summary(&self, first_n: usize) -> BatchSummary {
        BatchSummary {
            total_rows: self.total_rows,
            accepted_count: self.records.len(),
            rejected_count: self.rejected.len(),
            sentinel_rows: self.sentinel_rows,
            first_errors: self
                .rejected
                .iter()
                .take(first_n)
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_rows: usize,
    pub accepted_count: usize,
    pub rejected_count: usize,
    pub sentinel_rows: usize,
    pub first_errors: Vec<String>,
}

impl BatchSummary {
    pub fn summary(&self) -> String {
        format!(
            "{} rows: {} accepted, {} rejected, {} sentinel",
            self.total_rows, self.accepted_count, self.rejected_count, self.sentinel_rows
        )
    }
}

// ============================================================================
// INGESTOR
// ============================================================================

/// BatchIngestor - drives filter → parse over a row sequence.
#[derive(Debug, Clone)]
pub struct BatchIngestor {
    parser: RecordParser,
    filter: SentinelRowFilter,
    policy: ErrorPolicy,
}

impl BatchIngestor {
    pub fn new(parser: RecordParser, filter: SentinelRowFilter) -> Self {
        BatchIngestor {
            parser,
            filter,
            policy: ErrorPolicy::default(),
        }
    }

    /// Builder pattern: override the per-row error policy
    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Ingest a sales-transaction sheet.
    pub fn ingest_sales<I>(&self, rows: I) -> Result<BatchResult<SalesRecord>>
    where
        I: IntoIterator<Item = RawRow>,
    {
        self.ingest_with(rows, |parser, row| parser.parse_sales(row))
    }

    /// Ingest a dealer-profit pivot sheet.
    pub fn ingest_dealers<I>(&self, rows: I) -> Result<BatchResult<DealerProfitEntry>>
    where
        I: IntoIterator<Item = RawRow>,
    {
        self.ingest_with(rows, |parser, row| parser.parse_dealer(row))
    }

    fn ingest_with<I, T>(
        &self,
        rows: I,
        parse: impl Fn(&RecordParser, &RawRow) -> Result<T, ParseError>,
    ) -> Result<BatchResult<T>>
    where
        I: IntoIterator<Item = RawRow>,
    {
        let mut records = Vec::new();
        let mut rejected = Vec::new();
        let mut sentinel_rows = 0usize;
        let mut total_rows = 0usize;

        for (row_index, row) in rows.into_iter().enumerate() {
            total_rows += 1;

            // Sentinel rows are structure, not data: drop before coercion
            if self.filter.is_sentinel(&row) {
                sentinel_rows += 1;
                debug!(row_index, "skipping sentinel row");
                continue;
            }

            match parse(&self.parser, &row) {
                Ok(record) => records.push(record),
                Err(error) => {
                    let row_error = RowError { row_index, error };
                    match self.policy {
                        ErrorPolicy::AbortOnFirst => {
                            return Err(anyhow::Error::new(row_error))
                                .context("batch aborted on first malformed row");
                        }
                        ErrorPolicy::SkipAndCollect => {
                            warn!(row_index, error = %row_error, "rejecting malformed row");
                            rejected.push(row_error);
                        }
                    }
                }
            }
        }

        debug!(
            total_rows,
            accepted = records.len(),
            rejected = rejected.len(),
            sentinel_rows,
            "batch complete"
        );

        Ok(BatchResult {
            records,
            rejected,
            sentinel_rows,
            total_rows,
        })
    }

    // ========================================================================
    // PARALLEL PARSE (feature = "parallel")
    // ========================================================================

    /// Parallel variant of [`ingest_sales`](Self::ingest_sales). Rows are
    /// parsed independently and merged in index order, so the outcome is
    /// identical to the sequential path.
    #[cfg(feature = "parallel")]
    pub fn ingest_sales_parallel(&self, rows: Vec<RawRow>) -> Result<BatchResult<SalesRecord>> {
        self.ingest_parallel(rows, |parser, row| parser.parse_sales(row))
    }

    /// Parallel variant of [`ingest_dealers`](Self::ingest_dealers).
    #[cfg(feature = "parallel")]
    pub fn ingest_dealers_parallel(
        &self,
        rows: Vec<RawRow>,
    ) -> Result<BatchResult<DealerProfitEntry>> {
        self.ingest_parallel(rows, |parser, row| parser.parse_dealer(row))
    }

    #[cfg(feature = "parallel")]
    fn ingest_parallel<T: Send>(
        &self,
        rows: Vec<RawRow>,
        parse: impl Fn(&RecordParser, &RawRow) -> Result<T, ParseError> + Sync,
    ) -> Result<BatchResult<T>> {
        enum Outcome<T> {
            Sentinel,
            Accepted(T),
            Rejected(RowError),
        }

        let total_rows = rows.len();
        let outcomes: Vec<Outcome<T>> = rows
            .into_par_iter()
            .enumerate()
            .map(|(row_index, row)| {
                if self.filter.is_sentinel(&row) {
                    return Outcome::Sentinel;
                }
                match parse(&self.parser, &row) {
                    Ok(record) => Outcome::Accepted(record),
                    Err(error) => Outcome::Rejected(RowError { row_index, error }),
                }
            })
            .collect();

        // Single-threaded merge in index order keeps the result identical
        // to the sequential path.
        let mut records = Vec::new();
        let mut rejected = Vec::new();
        let mut sentinel_rows = 0usize;

        for outcome in outcomes {
            match outcome {
                Outcome::Sentinel => sentinel_rows += 1,
                Outcome::Accepted(record) => records.push(record),
                Outcome::Rejected(row_error) => match self.policy {
                    ErrorPolicy::AbortOnFirst => {
                        return Err(anyhow::Error::new(row_error))
                            .context("batch aborted on first malformed row");
                    }
                    ErrorPolicy::SkipAndCollect => {
                        warn!(row_index = row_error.row_index, error = %row_error, "rejecting malformed row");
                        rejected.push(row_error);
                    }
                },
            }
        }

        Ok(BatchResult {
            records,
            rejected,
            sentinel_rows,
            total_rows,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
