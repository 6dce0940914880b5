//! SeriesStore: durable storage for companies and their enriched series.
//!
//! A pooled SQLite file in WAL mode, so readers never wait on the ingest
//! writer. The store never migrates on open; call [`SeriesStore::migrate`]
//! once before use. Writes go through [`SeriesStore::write`], which runs one
//! `BEGIN IMMEDIATE` transaction per unit of work.

mod migrations;

use crate::domain::{Company, DailyRecord, Symbol};
use chrono::NaiveDate;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{ffi, params, Connection, Row, TransactionBehavior};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Pooled connections per store handle.
pub const DEFAULT_POOL_SIZE: u32 = 8;

const CONNECTION_PRAGMAS: &str = "PRAGMA busy_timeout = 5000;
     PRAGMA journal_mode = WAL;
     PRAGMA synchronous = NORMAL;
     PRAGMA foreign_keys = ON;";

const RECORD_COLUMNS: &str =
    "symbol, date, open, high, low, close, volume, daily_return, seven_day_ma, volatility_30d";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{symbol} is already present")]
    Conflict { symbol: String },

    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

impl StoreError {
    /// A uniqueness conflict: another writer got there first.
    pub fn is_conflict(&self) -> bool {
        match self {
            StoreError::Conflict { .. } => true,
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.extended_code,
                ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE
            ),
            _ => false,
        }
    }

    /// Whether an ingestion run must stop. Only conflicts are survivable.
    pub fn is_fatal(&self) -> bool {
        !self.is_conflict()
    }
}

/// Per-symbol coverage, for operator status output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesStats {
    pub symbol: Symbol,
    pub name: String,
    pub records: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

/// Cloneable handle to the store; clones share one pool.
#[derive(Clone)]
pub struct SeriesStore {
    pool: Pool<SqliteConnectionManager>,
    path: PathBuf,
}

impl std::fmt::Debug for SeriesStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeriesStore")
            .field("path", &self.path)
            .field("pool", &self.pool.state())
            .finish()
    }
}

impl SeriesStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_pool_size(path, DEFAULT_POOL_SIZE)
    }

    /// Open (creating if needed) the database file with a pool of `size`
    /// connections. The parent directory is created if missing.
    pub fn open_with_pool_size(path: impl AsRef<Path>, size: u32) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let manager = SqliteConnectionManager::file(&path)
            .with_init(|conn| conn.execute_batch(CONNECTION_PRAGMAS));
        let pool = Pool::builder().max_size(size.max(1)).build(manager)?;
        debug!(path = %path.display(), size, "opened series store");
        Ok(Self { pool, path })
    }

    /// Apply pending schema migrations. Returns how many ran.
    pub fn migrate(&self) -> Result<usize, StoreError> {
        let mut conn = self.pool.get()?;
        Ok(migrations::run_migrations(&mut conn)?)
    }

    pub fn company_exists(&self, symbol: &Symbol) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;
        let exists = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM companies WHERE symbol = ?1)",
            [symbol.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Run `f` inside one immediate transaction. Commits if `f` returns `Ok`,
    /// rolls back otherwise.
    pub fn write<T>(
        &self,
        f: impl FnOnce(&SeriesUnit<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&SeriesUnit { conn: &tx })?;
        tx.commit()?;
        Ok(value)
    }

    /// All companies ordered by symbol.
    pub fn list_companies(&self) -> Result<Vec<Company>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT symbol, name FROM companies ORDER BY symbol")?;
        let companies = stmt
            .query_map([], |row| {
                let symbol: String = row.get(0)?;
                Ok(Company::new(Symbol::normalize(&symbol), row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(companies)
    }

    /// The `n` most recent records, newest first.
    pub fn query_recent(&self, symbol: &Symbol, n: usize) -> Result<Vec<DailyRecord>, StoreError> {
        let limit = i64::try_from(n).unwrap_or(i64::MAX);
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {RECORD_COLUMNS} FROM daily_records
             WHERE symbol = ?1 ORDER BY date DESC LIMIT ?2"
        ))?;
        let records = stmt
            .query_map(params![symbol.as_str(), limit], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Records with `from <= date <= to`, oldest first.
    pub fn query_range(
        &self,
        symbol: &Symbol,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyRecord>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {RECORD_COLUMNS} FROM daily_records
             WHERE symbol = ?1 AND date >= ?2 AND date <= ?3 ORDER BY date ASC"
        ))?;
        let records = stmt
            .query_map(params![symbol.as_str(), from, to], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn record_count(&self, symbol: &Symbol) -> Result<usize, StoreError> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM daily_records WHERE symbol = ?1",
            [symbol.as_str()],
            |row| row.get(0),
        )?;
        Ok(count_to_usize(count))
    }

    /// Coverage for every company, including ones with no records.
    pub fn series_stats(&self) -> Result<Vec<SeriesStats>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT c.symbol, c.name, COUNT(d.date), MIN(d.date), MAX(d.date)
             FROM companies c LEFT JOIN daily_records d ON d.symbol = c.symbol
             GROUP BY c.symbol, c.name
             ORDER BY c.symbol",
        )?;
        let stats = stmt
            .query_map([], |row| {
                let symbol: String = row.get(0)?;
                Ok(SeriesStats {
                    symbol: Symbol::normalize(&symbol),
                    name: row.get(1)?,
                    records: count_to_usize(row.get(2)?),
                    first_date: row.get(3)?,
                    last_date: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(stats)
    }
}

/// One atomic unit of work, borrowed from [`SeriesStore::write`].
pub struct SeriesUnit<'a> {
    conn: &'a Connection,
}

impl SeriesUnit<'_> {
    /// Insert a company unless its symbol exists. Returns `true` when a row
    /// was created; an existing company is never modified.
    pub fn upsert_company(&self, company: &Company) -> Result<bool, StoreError> {
        let inserted = self.conn.execute(
            "INSERT INTO companies (symbol, name) VALUES (?1, ?2)
             ON CONFLICT(symbol) DO NOTHING",
            params![company.symbol.as_str(), company.name],
        )?;
        Ok(inserted == 1)
    }

    /// Insert records for `symbol`. Any existing (symbol, date) fails the unit.
    pub fn bulk_insert_records(
        &self,
        symbol: &Symbol,
        records: &[DailyRecord],
    ) -> Result<usize, StoreError> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "INSERT INTO daily_records ({RECORD_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
        ))?;

        for record in records {
            if &record.symbol != symbol {
                return Err(StoreError::InvalidRecord(format!(
                    "record for {} on {} in batch for {symbol}",
                    record.symbol, record.date
                )));
            }
            let volume = i64::try_from(record.volume).map_err(|_| {
                StoreError::InvalidRecord(format!(
                    "volume {} on {} exceeds storage range",
                    record.volume, record.date
                ))
            })?;
            stmt.execute(params![
                symbol.as_str(),
                record.date,
                record.open,
                record.high,
                record.low,
                record.close,
                volume,
                record.daily_return,
                record.seven_day_ma,
                record.volatility_30d,
            ])?;
        }
        Ok(records.len())
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<DailyRecord> {
    let symbol: String = row.get(0)?;
    let volume: i64 = row.get(6)?;
    Ok(DailyRecord {
        symbol: Symbol::normalize(&symbol),
        date: row.get(1)?,
        open: row.get(2)?,
        high: row.get(3)?,
        low: row.get(4)?,
        close: row.get(5)?,
        volume: u64::try_from(volume)
            .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(6, volume))?,
        daily_return: row.get(7)?,
        seven_day_ma: row.get(8)?,
        volatility_30d: row.get(9)?,
    })
}

fn count_to_usize(count: i64) -> usize {
    usize::try_from(count).unwrap_or(0)
}
