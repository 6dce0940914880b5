//! DailyRecord: one enriched trading day for a symbol.

use super::symbol::Symbol;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A daily OHLCV bar plus the derived fields computed at ingestion time.
///
/// Derived fields are stored and never recomputed at query time. A record only
/// exists once both trailing windows (7 closes, 30 returns) are complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    #[serde(skip_serializing, default)]
    pub symbol: Symbol,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    /// `(close - open) / open` for this row alone.
    pub daily_return: f64,
    /// Mean close over this row and the 6 preceding rows.
    pub seven_day_ma: f64,
    /// Sample standard deviation of `daily_return` over this row and the 29 preceding rows.
    pub volatility_30d: f64,
}
