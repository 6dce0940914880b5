//! Universe configuration: the fixed ticker list the pipeline ingests.
//!
//! Stored as a TOML table with a name and a ticker list. Tickers may be given
//! in any case with or without a market suffix; [`Universe::symbols`] returns
//! them normalized, deduplicated, in file order.

use crate::domain::Symbol;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Default NSE large-cap universe.
const NSE_LARGE_CAPS: [&str; 15] = [
    "RELIANCE.NS",
    "TCS.NS",
    "INFY.NS",
    "HDFCBANK.NS",
    "ICICIBANK.NS",
    "LT.NS",
    "SBIN.NS",
    "AXISBANK.NS",
    "WIPRO.NS",
    "TECHM.NS",
    "MARUTI.NS",
    "HINDUNILVR.NS",
    "ITC.NS",
    "BHARTIARTL.NS",
    "ASIANPAINT.NS",
];

/// A named list of tickers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Universe {
    #[serde(default = "default_name")]
    pub name: String,
    pub tickers: Vec<String>,
}

fn default_name() -> String {
    "custom".to_string()
}

impl Universe {
    /// Load a universe from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("read universe file: {e}"))?;
        Self::from_toml(&content)
    }

    /// Parse a universe from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("parse universe TOML: {e}"))
    }

    /// The 15 NSE large caps tracked by default.
    pub fn default_nse() -> Self {
        Self {
            name: "nse_large_caps".to_string(),
            tickers: NSE_LARGE_CAPS.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Normalized symbols in file order, blanks and duplicates removed.
    pub fn symbols(&self) -> Vec<Symbol> {
        let mut seen = HashSet::new();
        self.tickers
            .iter()
            .map(|t| Symbol::normalize(t))
            .filter(|s| !s.is_blank())
            .filter(|s| seen.insert(s.clone()))
            .collect()
    }

    pub fn ticker_count(&self) -> usize {
        self.symbols().len()
    }
}

impl Default for Universe {
    fn default() -> Self {
        Self::default_nse()
    }
}
