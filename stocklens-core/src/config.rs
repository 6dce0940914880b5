//! Runtime configuration loaded from TOML.
//!
//! Every field is optional; an empty file yields the defaults below.
//!
//! ```toml
//! database_path = "data/stocklens.db"
//! history_years = 5
//! log_filter = "stocklens=debug"
//!
//! [universe]
//! name = "banks"
//! tickers = ["HDFCBANK", "ICICIBANK", "SBIN"]
//! ```

use crate::analytics::QueryWindows;
use crate::data::{HistorySpan, Universe};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_DATABASE_PATH: &str = "data/stocklens.db";
pub const DEFAULT_LOG_FILTER: &str = "stocklens=info";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LensConfig {
    pub database_path: PathBuf,
    /// Calendar years of history requested per ticker.
    pub history_years: u32,
    /// Rows in the recent window.
    pub recent_days: usize,
    pub compare_days: u32,
    pub summary_days: u32,
    /// `tracing` filter directive, used when `RUST_LOG` is unset.
    pub log_filter: String,
    pub universe: Universe,
}

impl Default for LensConfig {
    fn default() -> Self {
        let windows = QueryWindows::default();
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            history_years: 5,
            recent_days: windows.recent_rows,
            compare_days: windows.compare_days,
            summary_days: windows.summary_days,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            universe: Universe::default(),
        }
    }
}

impl LensConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_years == 0 {
            return Err(ConfigError::Invalid("history_years must be at least 1".into()));
        }
        if self.recent_days == 0 || self.compare_days == 0 || self.summary_days == 0 {
            return Err(ConfigError::Invalid("query windows must be positive".into()));
        }
        if self.universe.symbols().is_empty() {
            return Err(ConfigError::Invalid("universe has no tickers".into()));
        }
        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database_path is empty".into()));
        }
        Ok(())
    }

    pub fn query_windows(&self) -> QueryWindows {
        QueryWindows {
            recent_rows: self.recent_days,
            summary_days: self.summary_days,
            compare_days: self.compare_days,
        }
    }

    /// History requested from the source, ending at `end`.
    pub fn history_span(&self, end: NaiveDate) -> HistorySpan {
        HistorySpan::trailing_years(end, self.history_years)
    }
}
