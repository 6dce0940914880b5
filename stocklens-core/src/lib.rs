//! StockLens Core: daily bar ingestion, rolling features, series store, windowed queries.
//!
//! This crate contains the whole engine:
//! - Domain types (symbols, companies, enriched daily records)
//! - Raw bar sources behind one trait (Yahoo Finance, CSV directory)
//! - Feature transformer (daily return, 7-day mean close, 30-day return volatility)
//! - SQLite series store with explicit migrations
//! - Write-once ingestion pipeline, sequential or on the rayon pool
//! - Analytics queries: company list, recent window, 52-week summary, comparison

pub mod analytics;
pub mod config;
pub mod data;
pub mod domain;
pub mod features;
pub mod pipeline;
pub mod store;

pub use analytics::{AnalyticsService, CompareEntry, Comparison, QueryError, QueryWindows, Summary};
pub use config::{ConfigError, LensConfig};
pub use domain::{Company, DailyRecord, NameSource, Symbol};
pub use features::FeatureTransformer;
pub use pipeline::{IngestSummary, IngestionPipeline, SkipReason, TickerOutcome};
pub use store::{SeriesStore, StoreError};
