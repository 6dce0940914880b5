//! Domain types for StockLens

pub mod company;
pub mod record;
pub mod symbol;

pub use company::{Company, NameSource, ResolvedName};
pub use record::DailyRecord;
pub use symbol::Symbol;
