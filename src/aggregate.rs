// Aggregation - group validated records by dimensions, compute metrics
//
// Grouping uses an explicit key → accumulator structure instead of ad-hoc
// maps. Sums accumulate in integral thousandths of a unit (the inputs are
// currency with at most 3 fractional digits), which makes the result
// independent of input order; means use Welford's incremental update so
// no intermediate rounding leaks into the output. Rounding happens only
// when values are rendered.

use crate::parser::DealerProfitEntry;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// ============================================================================
// KEYS
// ============================================================================

/// One dimension value of an aggregation key (dealer id, model, year,
/// calendar period). Structural equality, hashing and ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Dimension {
    Int(i64),
    Text(String),
    Date(NaiveDate),
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Int(i) => write!(f, "{}", i),
            Dimension::Text(s) => write!(f, "{}", s),
            Dimension::Date(d) => write!(f, "{}", d),
        }
    }
}

impl From<i64> for Dimension {
    fn from(v: i64) -> Self {
        Dimension::Int(v)
    }
}

impl From<u32> for Dimension {
    fn from(v: u32) -> Self {
        Dimension::Int(v as i64)
    }
}

impl From<i32> for Dimension {
    fn from(v: i32) -> Self {
        Dimension::Int(v as i64)
    }
}

impl From<&str> for Dimension {
    fn from(v: &str) -> Self {
        Dimension::Text(v.to_string())
    }
}

impl From<String> for Dimension {
    fn from(v: String) -> Self {
        Dimension::Text(v)
    }
}

impl From<NaiveDate> for Dimension {
    fn from(v: NaiveDate) -> Self {
        Dimension::Date(v)
    }
}

/// Ordered tuple of dimension values; unique within one result.
pub type AggregationKey = Vec<Dimension>;

/// Key for grouping by calendar month: first day of the record's month.
/// Matches the monthly sales/profit charts' period grouping.
pub fn month_of(date: NaiveDate) -> Dimension {
    Dimension::Date(date.with_day(1).expect("day 1 is valid for every month"))
}

// ============================================================================
// ACCUMULATION
// ============================================================================

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot compute a mean over zero records")]
pub struct EmptyInputError;

#[derive(Debug, Clone)]
struct Accumulator {
    first_seen: usize,
    count: u64,
    sum_milli: i64,
    mean: f64,
}

impl Accumulator {
    fn new(first_seen: usize) -> Self {
        Accumulator {
            first_seen,
            count: 0,
            sum_milli: 0,
            mean: 0.0,
        }
    }

    fn push(&mut self, value: f64) {
        self.count += 1;
        self.sum_milli += (value * 1000.0).round() as i64;
        // Welford incremental mean
        self.mean += (value - self.mean) / self.count as f64;
    }

    fn sum(&self) -> f64 {
        self.sum_milli as f64 / 1000.0
    }
}

/// Group records by a caller-supplied key extractor and accumulate the
/// named numeric field. The grouped metrics are projected into an
/// [`AggregationResult`] via [`GroupedMetrics::sums`], `means` or `counts`.
pub fn aggregate<'a, R, I, K, V>(records: I, key_fn: K, value_fn: V) -> GroupedMetrics
where
    R: 'a,
    I: IntoIterator<Item = &'a R>,
    K: Fn(&R) -> AggregationKey,
    V: Fn(&R) -> f64,
{
    let mut groups: BTreeMap<AggregationKey, Accumulator> = BTreeMap::new();
    let mut total_records = 0usize;

    for (index, record) in records.into_iter().enumerate() {
        total_records += 1;
        let key = key_fn(record);
        groups
            .entry(key)
            .or_insert_with(|| Accumulator::new(index))
            .push(value_fn(record));
    }

    GroupedMetrics {
        groups,
        total_records,
    }
}

/// Accumulated per-key statistics, ready to project into a result.
#[derive(Debug, Clone)]
pub struct GroupedMetrics {
    groups: BTreeMap<AggregationKey, Accumulator>,
    total_records: usize,
}

impl GroupedMetrics {
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Per-key sums of the accumulated field. Zero records → empty result.
    pub fn sums(&self) -> AggregationResult {
        self.project(|acc| acc.sum())
    }

    /// Per-key arithmetic means. Asking for a mean over zero records is
    /// the one undefined aggregation.
    pub fn means(&self) -> Result<AggregationResult, EmptyInputError> {
        if self.total_records == 0 {
            return Err(EmptyInputError);
        }
        Ok(self.project(|acc| acc.mean))
    }

    /// Per-key record counts. Zero records → empty result.
    pub fn counts(&self) -> AggregationResult {
        self.project(|acc| acc.count as f64)
    }

    fn project(&self, metric: impl Fn(&Accumulator) -> f64) -> AggregationResult {
        let entries = self
            .groups
            .iter()
            .map(|(key, acc)| AggregationEntry {
                key: key.clone(),
                value: metric(acc),
                percentage: None,
                first_seen: acc.first_seen,
            })
            .collect();

        AggregationResult { entries }
    }
}

// ============================================================================
// RESULTS
// ============================================================================

/// Requested output ordering. Ties break by ascending key, then by
/// first-seen order in the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    KeyAscending,
    ValueAscending,
    ValueDescending,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationEntry {
    pub key: AggregationKey,
    pub value: f64,
    /// Share of the grand total, populated by `with_percentages`.
    pub percentage: Option<f64>,
    #[serde(skip)]
    first_seen: usize,
}

// first_seen is a sort tie-breaker, not part of the result's identity
impl PartialEq for AggregationEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.value == other.value && self.percentage == other.percentage
    }
}

/// AggregationResult - mapping from key to metric value, carried as an
/// ordered sequence for the presentation collaborator. Keys are unique;
/// base order is ascending by key until a sort is requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationResult {
    entries: Vec<AggregationEntry>,
}

impl AggregationResult {
    pub fn entries(&self) -> &[AggregationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Metric value for a key, if present.
    pub fn get(&self, key: &[Dimension]) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.key.as_slice() == key)
            .map(|e| e.value)
    }

    /// Sum of all per-key values.
    pub fn grand_total(&self) -> f64 {
        // Values came from milli-accurate sums; re-summing stays exact
        // at the same scale.
        let milli: i64 = self
            .entries
            .iter()
            .map(|e| (e.value * 1000.0).round() as i64)
            .sum();
        milli as f64 / 1000.0
    }

    /// Attach each key's percentage share of the grand total. A zero
    /// grand total is a legitimate "no data" state: every share is 0.
    pub fn with_percentages(mut self) -> Self {
        let grand_total = self.grand_total();
        for entry in &mut self.entries {
            entry.percentage = Some(if grand_total == 0.0 {
                0.0
            } else {
                entry.value / grand_total * 100.0
            });
        }
        self
    }

    /// Reorder entries for presentation.
    pub fn sorted(mut self, order: SortOrder) -> Self {
        match order {
            SortOrder::KeyAscending => {
                self.entries
                    .sort_by(|a, b| a.key.cmp(&b.key).then(a.first_seen.cmp(&b.first_seen)));
            }
            SortOrder::ValueAscending => {
                self.entries.sort_by(|a, b| {
                    a.value
                        .total_cmp(&b.value)
                        .then_with(|| a.key.cmp(&b.key))
                        .then(a.first_seen.cmp(&b.first_seen))
                });
            }
            SortOrder::ValueDescending => {
                self.entries.sort_by(|a, b| {
                    b.value
                        .total_cmp(&a.value)
                        .then_with(|| a.key.cmp(&b.key))
                        .then(a.first_seen.cmp(&b.first_seen))
                });
            }
        }
        self
    }
}

// ============================================================================
// BATCH TOTALS
// ============================================================================

/// Headline figures for the sales dashboard: total profit plus total and
/// average quantity sold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub total_profit: f64,
    pub total_quantity_sold: u64,
    pub average_quantity_sold: f64,
}

impl Totals {
    pub fn from_dealer_entries(entries: &[DealerProfitEntry]) -> Result<Self, EmptyInputError> {
        if entries.is_empty() {
            return Err(EmptyInputError);
        }

        let profit_milli: i64 = entries
            .iter()
            .map(|e| (e.profit * 1000.0).round() as i64)
            .sum();

        let quantities: Vec<u64> = entries
            .iter()
            .filter_map(|e| e.quantity_sold.map(u64::from))
            .collect();
        let total_quantity_sold: u64 = quantities.iter().sum();
        let average_quantity_sold = if quantities.is_empty() {
            0.0
        } else {
            total_quantity_sold as f64 / quantities.len() as f64
        };

        Ok(Totals {
            total_profit: profit_milli as f64 / 1000.0,
            total_quantity_sold,
            average_quantity_sold,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
