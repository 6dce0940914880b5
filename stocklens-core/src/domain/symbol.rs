//! Canonical ticker symbols.
//!
//! Every symbol that enters or leaves the store passes through
//! [`Symbol::normalize`]: trimmed, uppercased, and carrying a market suffix.
//! Tickers without a recognized suffix are assumed to trade on the NSE.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Suffix appended to tickers that carry no recognized market suffix.
pub const DEFAULT_SUFFIX: &str = ".NS";

/// Market suffixes accepted as already canonical (NSE, BSE).
pub const MARKET_SUFFIXES: [&str; 2] = [".NS", ".BO"];

/// A normalized ticker symbol such as `TCS.NS`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Normalize user input into the canonical stored form.
    ///
    /// Idempotent and case-insensitive: `tcs`, `TCS` and `tcs.ns` all map to
    /// `TCS.NS`.
    pub fn normalize(raw: &str) -> Self {
        let mut symbol = raw.trim().to_uppercase();
        if !MARKET_SUFFIXES.iter().any(|suffix| symbol.ends_with(suffix)) {
            symbol.push_str(DEFAULT_SUFFIX);
        }
        Self(symbol)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Text before the first `.`, used as the fallback display name.
    pub fn base(&self) -> &str {
        self.0.split('.').next().unwrap_or(&self.0)
    }

    /// True when the raw input had nothing but whitespace before normalization.
    pub fn is_blank(&self) -> bool {
        self.base().is_empty()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
