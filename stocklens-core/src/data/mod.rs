//! Raw data sources: trait, Yahoo Finance, CSV directory, ticker universe

pub mod circuit_breaker;
pub mod csv_source;
pub mod provider;
pub mod universe;
pub mod yahoo;

pub use circuit_breaker::CircuitBreaker;
pub use csv_source::CsvSource;
pub use provider::{DataError, HistorySpan, RawBar, RawBarSource};
pub use universe::Universe;
pub use yahoo::YahooSource;
