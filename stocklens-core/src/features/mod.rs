//! Feature transformer: raw daily bars to the enriched series.
//!
//! Steps, in order:
//! 1. Reject rows with a missing field, a non-finite price, or a
//!    non-positive open (daily return undefined).
//! 2. Sort ascending by date; on a repeated date the first row in input
//!    order wins.
//! 3. `daily_return = (close - open) / open` per row.
//! 4. Trailing 7-close mean and trailing 30-return sample stdev. Rows
//!    without both windows full are dropped, so the output holds
//!    `max(0, valid - 29)` rows.
//!
//! The transformer is pure; the pipeline logs the [`TransformReport`].

pub mod rolling;

use crate::data::RawBar;
use crate::domain::{DailyRecord, Symbol};
use chrono::NaiveDate;
use serde::Serialize;

/// Closes in the moving-average window.
pub const MA_WINDOW: usize = 7;

/// Daily returns in the volatility window.
pub const VOLATILITY_WINDOW: usize = 30;

/// Counts describing what the transformer did with one symbol's bars.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransformReport {
    pub raw_rows: usize,
    /// Rows with a missing field or a non-finite price.
    pub incomplete_rows: usize,
    /// Rows whose open is zero or negative.
    pub non_positive_open_rows: usize,
    /// Later rows that repeated an earlier date.
    pub duplicate_dates: usize,
    /// Kept rows with `low > min(open, close)` or `high < max(open, close)`.
    pub ohlc_anomalies: usize,
    /// Rows surviving validation and deduplication.
    pub valid_rows: usize,
    /// Rows emitted with both windows full.
    pub enriched_rows: usize,
}

impl TransformReport {
    pub fn dropped_rows(&self) -> usize {
        self.incomplete_rows + self.non_positive_open_rows + self.duplicate_dates
    }
}

/// Enriched records plus the report that produced them.
#[derive(Debug, Clone)]
pub struct Enriched {
    pub records: Vec<DailyRecord>,
    pub report: TransformReport,
}

#[derive(Debug, Clone, Copy)]
struct ValidBar {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: u64,
}

impl ValidBar {
    fn is_sane(&self) -> bool {
        self.low <= self.open.min(self.close) && self.high >= self.open.max(self.close)
    }
}

enum Rejection {
    Incomplete,
    NonPositiveOpen,
}

fn validate(bar: &RawBar) -> Result<ValidBar, Rejection> {
    let (Some(open), Some(high), Some(low), Some(close), Some(volume)) =
        (bar.open, bar.high, bar.low, bar.close, bar.volume)
    else {
        return Err(Rejection::Incomplete);
    };
    if ![open, high, low, close].iter().all(|p| p.is_finite()) {
        return Err(Rejection::Incomplete);
    }
    if open <= 0.0 {
        return Err(Rejection::NonPositiveOpen);
    }
    Ok(ValidBar {
        date: bar.date,
        open,
        high,
        low,
        close,
        volume,
    })
}

/// Computes derived fields over a full per-symbol series.
#[derive(Debug, Clone, Copy)]
pub struct FeatureTransformer {
    ma_window: usize,
    volatility_window: usize,
}

impl Default for FeatureTransformer {
    fn default() -> Self {
        Self {
            ma_window: MA_WINDOW,
            volatility_window: VOLATILITY_WINDOW,
        }
    }
}

impl FeatureTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transform(&self, symbol: &Symbol, raw: &[RawBar]) -> Enriched {
        let mut report = TransformReport {
            raw_rows: raw.len(),
            ..TransformReport::default()
        };

        let mut bars = Vec::with_capacity(raw.len());
        for bar in raw {
            match validate(bar) {
                Ok(valid) => bars.push(valid),
                Err(Rejection::Incomplete) => report.incomplete_rows += 1,
                Err(Rejection::NonPositiveOpen) => report.non_positive_open_rows += 1,
            }
        }

        // Stable sort keeps input order among equal dates, so dedup keeps the first.
        bars.sort_by_key(|bar| bar.date);
        let before_dedup = bars.len();
        bars.dedup_by_key(|bar| bar.date);
        report.duplicate_dates = before_dedup - bars.len();
        report.valid_rows = bars.len();
        report.ohlc_anomalies = bars.iter().filter(|bar| !bar.is_sane()).count();

        let closes: Vec<f64> = bars.iter().map(|bar| bar.close).collect();
        let returns: Vec<f64> = bars
            .iter()
            .map(|bar| (bar.close - bar.open) / bar.open)
            .collect();
        let ma = rolling::trailing_mean(&closes, self.ma_window);
        let volatility = rolling::trailing_sample_std(&returns, self.volatility_window);

        let records: Vec<DailyRecord> = bars
            .iter()
            .enumerate()
            .filter_map(|(i, bar)| {
                let (seven_day_ma, volatility_30d) = (ma[i]?, volatility[i]?);
                Some(DailyRecord {
                    symbol: symbol.clone(),
                    date: bar.date,
                    open: bar.open,
                    high: bar.high,
                    low: bar.low,
                    close: bar.close,
                    volume: bar.volume,
                    daily_return: returns[i],
                    seven_day_ma,
                    volatility_30d,
                })
            })
            .collect();

        report.enriched_rows = records.len();
        Enriched { records, report }
    }
}
