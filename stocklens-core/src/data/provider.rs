//! Raw bar source trait and structured error types.
//!
//! The RawBarSource trait abstracts over where daily bars come from (Yahoo
//! Finance, a directory of CSV exports) so the pipeline can swap
//! implementations and tests can script one.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw daily OHLCV bar from a source, before validation.
///
/// Any field may be missing; the feature transformer drops incomplete rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<u64>,
}

impl RawBar {
    /// A bar with every field present.
    pub fn complete(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: u64) -> Self {
        Self {
            date,
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close: Some(close),
            volume: Some(volume),
        }
    }
}

/// Inclusive calendar span of requested history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistorySpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl HistorySpan {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// `years` calendar years ending at `end`.
    pub fn trailing_years(end: NaiveDate, years: u32) -> Self {
        let start = end
            .checked_sub_months(Months::new(years.saturating_mul(12)))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Structured error types for source operations.
///
/// During ingestion every variant is a per-ticker failure; none aborts a run.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("no display name available for {symbol}")]
    NameUnavailable { symbol: String },

    #[error("hard stop: data source has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("malformed source data: {0}")]
    Malformed(String),

    #[error("data error: {0}")]
    Other(String),
}

/// Trait for raw bar sources (Yahoo Finance, CSV directory, test scripts).
///
/// Implementations handle the specifics of one source. They know nothing
/// about the store; an empty `Ok` vector means the source had no rows.
pub trait RawBarSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Fetch daily bars for a symbol over a span, ascending by date where the
    /// source can guarantee it.
    fn fetch_history(&self, symbol: &str, span: HistorySpan) -> Result<Vec<RawBar>, DataError>;

    /// Resolve a display name for a symbol.
    fn resolve_name(&self, symbol: &str) -> Result<String, DataError>;

    /// Check if the source is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool;
}
