//! Ingestion pipeline: fetch, transform and persist each ticker exactly once.
//!
//! Write-once per symbol. A ticker whose company row exists is skipped
//! before anything is fetched, so re-running over a populated store is a
//! no-op. Each loaded ticker is one transaction: company plus all records,
//! or nothing.

use crate::data::{HistorySpan, RawBarSource};
use crate::domain::{Company, NameSource, ResolvedName, Symbol};
use crate::features::FeatureTransformer;
use crate::store::{SeriesStore, StoreError};
use rayon::prelude::*;
use std::fmt;
use tracing::{debug, info, warn};

/// Why a ticker was not loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// A company row already exists (or another writer won the race).
    AlreadyPresent,
    /// The source returned no rows.
    NoData,
    /// Fewer valid rows than the widest trailing window.
    InsufficientHistory { valid_rows: usize },
    /// The source failed or is refusing requests.
    SourceUnavailable(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyPresent => write!(f, "already present"),
            SkipReason::NoData => write!(f, "no data"),
            SkipReason::InsufficientHistory { valid_rows } => {
                write!(f, "insufficient history ({valid_rows} valid rows)")
            }
            SkipReason::SourceUnavailable(reason) => write!(f, "source unavailable: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickerOutcome {
    Loaded { rows: usize, name_source: NameSource },
    Skipped(SkipReason),
}

impl TickerOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, TickerOutcome::Loaded { .. })
    }
}

impl fmt::Display for TickerOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TickerOutcome::Loaded { rows, name_source } => {
                write!(f, "loaded {rows} rows (name: {name_source:?})")
            }
            TickerOutcome::Skipped(reason) => write!(f, "skipped: {reason}"),
        }
    }
}

/// Outcome for one ticker, in universe order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerReport {
    pub symbol: Symbol,
    pub outcome: TickerOutcome,
}

/// Result of a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct IngestSummary {
    pub tickers: Vec<TickerReport>,
}

impl IngestSummary {
    pub fn total(&self) -> usize {
        self.tickers.len()
    }

    pub fn loaded(&self) -> usize {
        self.tickers.iter().filter(|t| t.outcome.is_loaded()).count()
    }

    pub fn skipped(&self) -> usize {
        self.total() - self.loaded()
    }

    pub fn rows_written(&self) -> usize {
        self.tickers
            .iter()
            .map(|t| match t.outcome {
                TickerOutcome::Loaded { rows, .. } => rows,
                TickerOutcome::Skipped(_) => 0,
            })
            .sum()
    }

    pub fn outcome(&self, symbol: &Symbol) -> Option<&TickerOutcome> {
        self.tickers
            .iter()
            .find(|t| &t.symbol == symbol)
            .map(|t| &t.outcome)
    }
}

/// Progress callbacks for a pipeline run.
pub trait IngestProgress: Send + Sync {
    fn on_start(&self, symbol: &Symbol, index: usize, total: usize);

    fn on_complete(&self, symbol: &Symbol, index: usize, total: usize, outcome: &TickerOutcome);

    fn on_batch_complete(&self, summary: &IngestSummary);
}

/// Reports progress through `tracing`.
pub struct LogProgress;

impl IngestProgress for LogProgress {
    fn on_start(&self, symbol: &Symbol, index: usize, total: usize) {
        debug!(%symbol, "[{}/{}] ingesting", index + 1, total);
    }

    fn on_complete(&self, symbol: &Symbol, index: usize, total: usize, outcome: &TickerOutcome) {
        match outcome {
            TickerOutcome::Loaded { .. } => info!(%symbol, "[{}/{}] {outcome}", index + 1, total),
            TickerOutcome::Skipped(SkipReason::AlreadyPresent) => {
                info!(%symbol, "[{}/{}] {outcome}", index + 1, total)
            }
            TickerOutcome::Skipped(_) => warn!(%symbol, "[{}/{}] {outcome}", index + 1, total),
        }
    }

    fn on_batch_complete(&self, summary: &IngestSummary) {
        info!(
            total = summary.total(),
            loaded = summary.loaded(),
            skipped = summary.skipped(),
            rows = summary.rows_written(),
            "ingestion complete"
        );
    }
}

/// Orchestrates source, transformer and store for a ticker universe.
pub struct IngestionPipeline<'a> {
    source: &'a dyn RawBarSource,
    store: &'a SeriesStore,
    transformer: FeatureTransformer,
    span: HistorySpan,
}

impl<'a> IngestionPipeline<'a> {
    pub fn new(source: &'a dyn RawBarSource, store: &'a SeriesStore, span: HistorySpan) -> Self {
        Self {
            source,
            store,
            transformer: FeatureTransformer::new(),
            span,
        }
    }

    /// Process tickers in order. Stops only on a fatal storage error.
    pub fn run(
        &self,
        symbols: &[Symbol],
        progress: &dyn IngestProgress,
    ) -> Result<IngestSummary, StoreError> {
        let total = symbols.len();
        let mut summary = IngestSummary::default();

        for (i, symbol) in symbols.iter().enumerate() {
            progress.on_start(symbol, i, total);
            let outcome = self.ingest_one(symbol)?;
            progress.on_complete(symbol, i, total, &outcome);
            summary.tickers.push(TickerReport {
                symbol: symbol.clone(),
                outcome,
            });
        }

        progress.on_batch_complete(&summary);
        Ok(summary)
    }

    /// Process tickers concurrently on the rayon pool. The summary keeps
    /// universe order.
    pub fn run_parallel(
        &self,
        symbols: &[Symbol],
        progress: &dyn IngestProgress,
    ) -> Result<IngestSummary, StoreError> {
        let total = symbols.len();
        let tickers = symbols
            .par_iter()
            .enumerate()
            .map(|(i, symbol)| {
                progress.on_start(symbol, i, total);
                let outcome = self.ingest_one(symbol)?;
                progress.on_complete(symbol, i, total, &outcome);
                Ok(TickerReport {
                    symbol: symbol.clone(),
                    outcome,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let summary = IngestSummary { tickers };
        progress.on_batch_complete(&summary);
        Ok(summary)
    }

    /// Ingest one ticker. `Err` only for fatal storage errors.
    pub fn ingest_one(&self, symbol: &Symbol) -> Result<TickerOutcome, StoreError> {
        if self.store.company_exists(symbol)? {
            return Ok(TickerOutcome::Skipped(SkipReason::AlreadyPresent));
        }
        if !self.source.is_available() {
            return Ok(TickerOutcome::Skipped(SkipReason::SourceUnavailable(format!(
                "{} is refusing requests",
                self.source.name()
            ))));
        }

        let raw = match self.source.fetch_history(symbol.as_str(), self.span) {
            Ok(raw) => raw,
            Err(e) => return Ok(TickerOutcome::Skipped(SkipReason::SourceUnavailable(e.to_string()))),
        };
        if raw.is_empty() {
            return Ok(TickerOutcome::Skipped(SkipReason::NoData));
        }

        let enriched = self.transformer.transform(symbol, &raw);
        let report = &enriched.report;
        if report.dropped_rows() > 0 {
            debug!(
                %symbol,
                incomplete = report.incomplete_rows,
                non_positive_open = report.non_positive_open_rows,
                duplicates = report.duplicate_dates,
                "dropped invalid rows"
            );
        }
        if report.ohlc_anomalies > 0 {
            warn!(%symbol, anomalies = report.ohlc_anomalies, "rows with OHLC outside low/high bounds");
        }
        if enriched.records.is_empty() {
            return Ok(TickerOutcome::Skipped(SkipReason::InsufficientHistory {
                valid_rows: report.valid_rows,
            }));
        }

        let resolved = self.resolve_name(symbol);
        let company = Company::new(symbol.clone(), resolved.name);
        let written = self.store.write(|unit| {
            if !unit.upsert_company(&company)? {
                return Err(StoreError::Conflict {
                    symbol: symbol.to_string(),
                });
            }
            unit.bulk_insert_records(symbol, &enriched.records)
        });

        match written {
            Ok(rows) => Ok(TickerOutcome::Loaded {
                rows,
                name_source: resolved.source,
            }),
            Err(e) if e.is_conflict() => {
                debug!(%symbol, error = %e, "lost write race");
                Ok(TickerOutcome::Skipped(SkipReason::AlreadyPresent))
            }
            Err(e) => Err(e),
        }
    }

    fn resolve_name(&self, symbol: &Symbol) -> ResolvedName {
        match self.source.resolve_name(symbol.as_str()) {
            Ok(name) if !name.trim().is_empty() => ResolvedName::provider(name.trim()),
            Ok(_) => ResolvedName::fallback(symbol),
            Err(e) => {
                debug!(%symbol, error = %e, "name resolution failed, using symbol base");
                ResolvedName::fallback(symbol)
            }
        }
    }
}
