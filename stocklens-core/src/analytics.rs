//! Windowed queries over the series store.
//!
//! Read-only. An N-day window covers the N calendar dates ending at an
//! explicit `today`, so the date exactly N days back is excluded; the plain
//! forms anchor on the local calendar date. Symbols are normalized before
//! every lookup.

use crate::domain::{Company, DailyRecord, Symbol};
use crate::store::{SeriesStore, StoreError};
use chrono::{Duration, Local, NaiveDate};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Marker returned in a comparison for a symbol with no rows in the window.
pub const NO_DATA_MARKER: &str = "No data found";

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Default window sizes for each query shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindows {
    /// Rows returned by the recent window.
    pub recent_rows: usize,
    /// Calendar days covered by the summary.
    pub summary_days: u32,
    /// Calendar days covered by a comparison.
    pub compare_days: u32,
}

impl Default for QueryWindows {
    fn default() -> Self {
        Self {
            recent_rows: 30,
            summary_days: 365,
            compare_days: 90,
        }
    }
}

/// Trailing-year price summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    #[serde(rename = "52_week_high")]
    pub high: f64,
    #[serde(rename = "52_week_low")]
    pub low: f64,
    /// Mean close, rounded to 2 decimals.
    #[serde(rename = "52_week_avg_close")]
    pub avg_close: f64,
}

/// Parallel date and close arrays, ascending by date.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClosingSeries {
    pub dates: Vec<NaiveDate>,
    pub closes: Vec<f64>,
}

impl ClosingSeries {
    fn from_records(records: &[DailyRecord]) -> Self {
        Self {
            dates: records.iter().map(|r| r.date).collect(),
            closes: records.iter().map(|r| r.close).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum CompareEntry {
    Series(ClosingSeries),
    NoData,
}

impl Serialize for CompareEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CompareEntry::Series(series) => series.serialize(serializer),
            CompareEntry::NoData => serializer.serialize_str(NO_DATA_MARKER),
        }
    }
}

/// Per-symbol comparison results in request order, serialized as a map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Comparison {
    entries: Vec<(Symbol, CompareEntry)>,
}

impl Comparison {
    pub fn get(&self, symbol: &Symbol) -> Option<&CompareEntry> {
        self.entries
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, entry)| entry)
    }

    pub fn entries(&self) -> &[(Symbol, CompareEntry)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Comparison {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (symbol, entry) in &self.entries {
            map.serialize_entry(symbol.as_str(), entry)?;
        }
        map.end()
    }
}

/// Query service over a store handle.
#[derive(Debug, Clone)]
pub struct AnalyticsService {
    store: SeriesStore,
    windows: QueryWindows,
}

impl AnalyticsService {
    pub fn new(store: SeriesStore) -> Self {
        Self::with_windows(store, QueryWindows::default())
    }

    pub fn with_windows(store: SeriesStore, windows: QueryWindows) -> Self {
        Self { store, windows }
    }

    pub fn windows(&self) -> QueryWindows {
        self.windows
    }

    /// Every company, ordered by symbol. An empty store is `NotFound`.
    pub fn list_companies(&self) -> Result<Vec<Company>, QueryError> {
        let companies = self.store.list_companies()?;
        if companies.is_empty() {
            return Err(QueryError::NotFound("no companies found".to_string()));
        }
        Ok(companies)
    }

    /// The most recent rows for a symbol, newest first.
    pub fn recent_window(&self, symbol: &str) -> Result<Vec<DailyRecord>, QueryError> {
        self.recent_rows(symbol, self.windows.recent_rows)
    }

    pub fn recent_rows(&self, symbol: &str, rows: usize) -> Result<Vec<DailyRecord>, QueryError> {
        let symbol = parse_symbol(symbol)?;
        if rows == 0 {
            return Err(QueryError::InvalidInput("row count must be positive".to_string()));
        }
        debug!(%symbol, rows, "recent window");
        let records = self.store.query_recent(&symbol, rows)?;
        if records.is_empty() {
            return Err(QueryError::NotFound(format!("no data found for symbol {symbol}")));
        }
        Ok(records)
    }

    pub fn summary(&self, symbol: &str) -> Result<Summary, QueryError> {
        self.summary_as_of(symbol, today())
    }

    /// High, low and rounded mean close over `(today - summary_days, today]`.
    pub fn summary_as_of(&self, symbol: &str, today: NaiveDate) -> Result<Summary, QueryError> {
        let symbol = parse_symbol(symbol)?;
        let from = window_start(today, self.windows.summary_days);
        debug!(%symbol, %from, %today, "summary");
        let records = self.store.query_range(&symbol, from, today)?;
        summarize(&records)
            .ok_or_else(|| QueryError::NotFound(format!("no summary data found for symbol {symbol}")))
    }

    pub fn compare(&self, a: &str, b: &str) -> Result<Comparison, QueryError> {
        self.compare_as_of(a, b, self.windows.compare_days, today())
    }

    /// Closing series for both symbols over `(today - window_days, today]`.
    /// A symbol without rows gets [`CompareEntry::NoData`]; the other is
    /// unaffected.
    ///
    /// Entries are keyed by the normalized symbol, not the caller's
    /// spelling: `compare("tcs", "INFY")` yields `TCS.NS` and `INFY.NS`, and
    /// two inputs that normalize to the same symbol yield a single entry.
    pub fn compare_as_of(
        &self,
        a: &str,
        b: &str,
        window_days: u32,
        today: NaiveDate,
    ) -> Result<Comparison, QueryError> {
        let symbols = [parse_symbol(a)?, parse_symbol(b)?];
        if window_days == 0 {
            return Err(QueryError::InvalidInput("window must be at least one day".to_string()));
        }
        let from = window_start(today, window_days);
        debug!(a = %symbols[0], b = %symbols[1], %from, %today, "compare");

        let mut comparison = Comparison::default();
        for symbol in symbols {
            if comparison.get(&symbol).is_some() {
                continue;
            }
            let records = self.store.query_range(&symbol, from, today)?;
            let entry = if records.is_empty() {
                CompareEntry::NoData
            } else {
                CompareEntry::Series(ClosingSeries::from_records(&records))
            };
            comparison.entries.push((symbol, entry));
        }
        Ok(comparison)
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// First date of an N-day window ending at `today`.
fn window_start(today: NaiveDate, days: u32) -> NaiveDate {
    today
        .checked_sub_signed(Duration::days(i64::from(days.saturating_sub(1))))
        .unwrap_or(NaiveDate::MIN)
}

fn parse_symbol(raw: &str) -> Result<Symbol, QueryError> {
    let symbol = Symbol::normalize(raw);
    if symbol.is_blank() {
        return Err(QueryError::InvalidInput(format!("blank symbol {raw:?}")));
    }
    Ok(symbol)
}

fn summarize(records: &[DailyRecord]) -> Option<Summary> {
    if records.is_empty() {
        return None;
    }
    let high = records.iter().map(|r| r.high).fold(f64::NEG_INFINITY, f64::max);
    let low = records.iter().map(|r| r.low).fold(f64::INFINITY, f64::min);
    let mean = records.iter().map(|r| r.close).sum::<f64>() / records.len() as f64;
    Some(Summary {
        high,
        low,
        avg_close: round2(mean),
    })
}

/// Round half away from zero to 2 decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
