//! Company: one row per tracked symbol.

use super::symbol::Symbol;
use serde::{Deserialize, Serialize};

/// A tracked company. The symbol is immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub symbol: Symbol,
    pub name: String,
}

impl Company {
    pub fn new(symbol: Symbol, name: impl Into<String>) -> Self {
        Self {
            symbol,
            name: name.into(),
        }
    }
}

/// Where a company's display name came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameSource {
    /// Resolved by the data source.
    Provider,
    /// Derived from the symbol base because resolution failed.
    Fallback,
}

/// A display name tagged with its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedName {
    pub name: String,
    pub source: NameSource,
}

impl ResolvedName {
    pub fn provider(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: NameSource::Provider,
        }
    }

    /// The symbol base, e.g. `TCS` for `TCS.NS`.
    pub fn fallback(symbol: &Symbol) -> Self {
        Self {
            name: symbol.base().to_string(),
            source: NameSource::Fallback,
        }
    }
}
