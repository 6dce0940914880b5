//! Schema migrations, applied in order and recorded by name.

use rusqlite::Connection;
use tracing::info;

const MIGRATIONS: [(&str, &str); 2] = [
    ("001_companies", CREATE_COMPANIES_TABLE),
    ("002_daily_records", CREATE_DAILY_RECORDS_TABLE),
];

/// Apply every pending migration. Returns how many ran.
pub fn run_migrations(conn: &mut Connection) -> rusqlite::Result<usize> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let mut applied = 0;
    for (name, sql) in MIGRATIONS {
        if run_migration(conn, name, sql)? {
            applied += 1;
        }
    }

    info!(applied, "database migrations completed");
    Ok(applied)
}

fn run_migration(conn: &mut Connection, name: &str, sql: &str) -> rusqlite::Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM migrations WHERE name = ?1)",
        [name],
        |row| row.get(0),
    )?;
    if exists {
        return Ok(false);
    }

    info!(migration = name, "running migration");
    let tx = conn.transaction()?;
    tx.execute_batch(sql)?;
    tx.execute("INSERT INTO migrations (name) VALUES (?1)", [name])?;
    tx.commit()?;
    Ok(true)
}

const CREATE_COMPANIES_TABLE: &str = r#"
CREATE TABLE companies (
    symbol TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL
);
"#;

const CREATE_DAILY_RECORDS_TABLE: &str = r#"
CREATE TABLE daily_records (
    symbol TEXT NOT NULL REFERENCES companies(symbol),
    date TEXT NOT NULL,
    open REAL NOT NULL,
    high REAL NOT NULL,
    low REAL NOT NULL,
    close REAL NOT NULL,
    volume INTEGER NOT NULL CHECK (volume >= 0),
    daily_return REAL NOT NULL,
    seven_day_ma REAL NOT NULL,
    volatility_30d REAL NOT NULL,
    PRIMARY KEY (symbol, date)
) WITHOUT ROWID;
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(run_migrations(&mut conn).unwrap(), MIGRATIONS.len());
        assert_eq!(run_migrations(&mut conn).unwrap(), 0);

        let recorded: i64 = conn
            .query_row("SELECT COUNT(*) FROM migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(recorded, MIGRATIONS.len() as i64);
    }

    #[test]
    fn daily_records_reject_duplicate_dates() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        conn.execute("INSERT INTO companies VALUES ('TCS.NS', 'TCS')", [])
            .unwrap();
        let insert = "INSERT INTO daily_records VALUES
            ('TCS.NS', '2024-01-02', 1, 1, 1, 1, 1, 0, 1, 0)";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }
}
