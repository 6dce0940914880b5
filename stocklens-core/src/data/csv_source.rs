//! CSV directory source.
//!
//! Layout: `{dir}/{SYMBOL}.csv` with header `date,open,high,low,close,volume`.
//! Empty or unparseable OHLCV cells are missing values, so one bad cell costs
//! its row rather than the file. An unreadable file or date is `Malformed`.
//! Display names come from an optional
//! `{dir}/names.csv` with header `symbol,name`.

use super::provider::{DataError, HistorySpan, RawBar, RawBarSource};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

const NAMES_FILE: &str = "names.csv";

#[derive(Debug, Deserialize)]
struct CsvBar {
    date: NaiveDate,
    #[serde(deserialize_with = "csv::invalid_option")]
    open: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    high: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    low: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    close: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    volume: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct CsvName {
    symbol: String,
    name: String,
}

/// Reads per-symbol CSV exports from a directory.
pub struct CsvSource {
    dir: PathBuf,
    names: HashMap<String, String>,
}

impl CsvSource {
    /// Open a CSV directory, loading `names.csv` if present.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, DataError> {
        let dir = dir.into();
        let names_path = dir.join(NAMES_FILE);
        let names = if names_path.exists() {
            load_names(&names_path)?
        } else {
            HashMap::new()
        };
        debug!(dir = %dir.display(), names = names.len(), "opened CSV source");
        Ok(Self { dir, names })
    }

    /// Path to a symbol's file: `{dir}/{SYMBOL}.csv`.
    pub fn symbol_path(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }
}

fn load_names(path: &Path) -> Result<HashMap<String, String>, DataError> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| DataError::Malformed(format!("{}: {e}", path.display())))?;
    let mut names = HashMap::new();
    for row in reader.deserialize::<CsvName>() {
        let row = row.map_err(|e| DataError::Malformed(format!("{}: {e}", path.display())))?;
        names.insert(row.symbol.trim().to_uppercase(), row.name.trim().to_string());
    }
    Ok(names)
}

impl RawBarSource for CsvSource {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch_history(&self, symbol: &str, span: HistorySpan) -> Result<Vec<RawBar>, DataError> {
        let path = self.symbol_path(symbol);
        if !path.exists() {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&path)
            .map_err(|e| DataError::Malformed(format!("{}: {e}", path.display())))?;

        let mut bars = Vec::new();
        for row in reader.deserialize::<CsvBar>() {
            let row = row.map_err(|e| DataError::Malformed(format!("{}: {e}", path.display())))?;
            if !span.contains(row.date) {
                continue;
            }
            bars.push(RawBar {
                date: row.date,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }
        bars.sort_by_key(|bar| bar.date);
        Ok(bars)
    }

    fn resolve_name(&self, symbol: &str) -> Result<String, DataError> {
        self.names
            .get(&symbol.to_uppercase())
            .filter(|name| !name.is_empty())
            .cloned()
            .ok_or_else(|| DataError::NameUnavailable {
                symbol: symbol.to_string(),
            })
    }

    fn is_available(&self) -> bool {
        self.dir.is_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Symbol;
    use crate::features::FeatureTransformer;

    fn write(dir: &Path, file: &str, content: &str) {
        std::fs::write(dir.join(file), content).unwrap();
    }

    fn span_2024() -> HistorySpan {
        HistorySpan::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        )
    }

    #[test]
    fn reads_bars_with_missing_cells_as_none() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "TCS.NS.csv",
            "date,open,high,low,close,volume\n\
             2024-01-03,101,103,100,102,900\n\
             2024-01-02,100,102,99,101,\n",
        );
        let source = CsvSource::open(tmp.path()).unwrap();
        let bars = source.fetch_history("TCS.NS", span_2024()).unwrap();

        assert_eq!(bars.len(), 2);
        // Sorted ascending regardless of file order
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[0].volume, None);
        assert_eq!(bars[1].volume, Some(900));
    }

    #[test]
    fn unparseable_cells_are_missing_values() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "ITC.NS.csv",
            "date,open,high,low,close,volume\n\
             2024-01-02,440,445,438,null,1200\n\
             2024-01-03,441,446,439,443,1200.0\n\
             2024-01-04,442,447,440,444,1300\n",
        );
        let source = CsvSource::open(tmp.path()).unwrap();
        let bars = source.fetch_history("ITC.NS", span_2024()).unwrap();

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].close, None);
        assert_eq!(bars[0].volume, Some(1200));
        assert_eq!(bars[1].close, Some(443.0));
        assert_eq!(bars[1].volume, None);
        assert_eq!(bars[2].close, Some(444.0));
        assert_eq!(bars[2].volume, Some(1300));

        // Only the two damaged rows are lost downstream
        let enriched = FeatureTransformer::new().transform(&Symbol::normalize("itc"), &bars);
        assert_eq!(enriched.report.incomplete_rows, 2);
        assert_eq!(enriched.report.valid_rows, 1);
    }

    #[test]
    fn filters_rows_outside_span() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "INFY.NS.csv",
            "date,open,high,low,close,volume\n\
             2023-12-29,1,1,1,1,1\n\
             2024-01-02,1,1,1,1,1\n",
        );
        let source = CsvSource::open(tmp.path()).unwrap();
        let bars = source.fetch_history("INFY.NS", span_2024()).unwrap();
        assert_eq!(bars.len(), 1);
    }

    #[test]
    fn missing_file_is_symbol_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let source = CsvSource::open(tmp.path()).unwrap();
        let err = source.fetch_history("NOPE.NS", span_2024()).unwrap_err();
        assert!(matches!(err, DataError::SymbolNotFound { .. }));
    }

    #[test]
    fn resolves_names_from_names_file() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), NAMES_FILE, "symbol,name\ntcs.ns,Tata Consultancy Services\n");
        let source = CsvSource::open(tmp.path()).unwrap();
        assert_eq!(
            source.resolve_name("TCS.NS").unwrap(),
            "Tata Consultancy Services"
        );
        assert!(matches!(
            source.resolve_name("WIPRO.NS"),
            Err(DataError::NameUnavailable { .. })
        ));
    }

    #[test]
    fn malformed_row_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "BAD.NS.csv",
            "date,open,high,low,close,volume\nnot-a-date,1,1,1,1,1\n",
        );
        let source = CsvSource::open(tmp.path()).unwrap();
        let err = source.fetch_history("BAD.NS", span_2024()).unwrap_err();
        assert!(matches!(err, DataError::Malformed(_)));
    }
}
