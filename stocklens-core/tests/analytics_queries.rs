//! Integration tests for the analytics queries over a seeded SQLite store.

use chrono::{Duration, NaiveDate};
use stocklens_core::analytics::ClosingSeries;
use stocklens_core::{
    AnalyticsService, Company, CompareEntry, DailyRecord, QueryError, SeriesStore, Symbol,
};

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
}

fn days_ago(n: i64) -> NaiveDate {
    today() - Duration::days(n)
}

fn record(symbol: &Symbol, date: NaiveDate, high: f64, low: f64, close: f64) -> DailyRecord {
    DailyRecord {
        symbol: symbol.clone(),
        date,
        open: close,
        high,
        low,
        close,
        volume: 5_000,
        daily_return: 0.0,
        seven_day_ma: close,
        volatility_30d: 0.0,
    }
}

fn temp_service() -> (tempfile::TempDir, SeriesStore, AnalyticsService) {
    let dir = tempfile::tempdir().unwrap();
    let store = SeriesStore::open(dir.path().join("analytics.db")).unwrap();
    store.migrate().unwrap();
    let service = AnalyticsService::new(store.clone());
    (dir, store, service)
}

fn seed(store: &SeriesStore, ticker: &str, records: Vec<DailyRecord>) {
    let symbol = Symbol::normalize(ticker);
    let records: Vec<DailyRecord> = records
        .into_iter()
        .map(|mut r| {
            r.symbol = symbol.clone();
            r
        })
        .collect();
    store
        .write(|unit| {
            unit.upsert_company(&Company::new(symbol.clone(), symbol.base()))?;
            unit.bulk_insert_records(&symbol, &records)
        })
        .unwrap();
}

/// One record per day for the last `n` days, close rising toward today.
fn daily_series(ticker: &str, n: i64) -> Vec<DailyRecord> {
    let symbol = Symbol::normalize(ticker);
    (0..n)
        .map(|i| {
            let close = 1000.0 - i as f64;
            record(&symbol, days_ago(i), close + 5.0, close - 5.0, close)
        })
        .collect()
}

// ──────────────────────────────────────────────
// ListCompanies / RecentWindow
// ──────────────────────────────────────────────

#[test]
fn empty_store_has_no_companies() {
    let (_dir, _store, service) = temp_service();
    assert!(matches!(
        service.list_companies(),
        Err(QueryError::NotFound(_))
    ));
}

#[test]
fn companies_are_listed_by_symbol() {
    let (_dir, store, service) = temp_service();
    seed(&store, "wipro", daily_series("wipro", 1));
    seed(&store, "bhartiartl", daily_series("bhartiartl", 1));

    let symbols: Vec<String> = service
        .list_companies()
        .unwrap()
        .iter()
        .map(|c| c.symbol.to_string())
        .collect();
    assert_eq!(symbols, vec!["BHARTIARTL.NS", "WIPRO.NS"]);
}

#[test]
fn recent_window_returns_thirty_newest_first() {
    let (_dir, store, service) = temp_service();
    seed(&store, "tcs", daily_series("tcs", 45));

    let recent = service.recent_window("tcs").unwrap();
    assert_eq!(recent.len(), 30);
    assert_eq!(recent[0].date, today());
    assert_eq!(recent[29].date, days_ago(29));
    assert!(recent.windows(2).all(|w| w[0].date > w[1].date));
}

#[test]
fn recent_window_accepts_any_symbol_spelling() {
    let (_dir, store, service) = temp_service();
    seed(&store, "infy", daily_series("infy", 3));

    for spelling in ["infy", "INFY", " Infy.ns "] {
        assert_eq!(service.recent_window(spelling).unwrap().len(), 3);
    }
}

#[test]
fn recent_window_for_unknown_symbol_is_not_found() {
    let (_dir, _store, service) = temp_service();
    let err = service.recent_window("nosuch").unwrap_err();
    assert!(matches!(err, QueryError::NotFound(_)));
    assert!(err.to_string().contains("NOSUCH.NS"));
}

#[test]
fn blank_symbol_is_invalid_input() {
    let (_dir, _store, service) = temp_service();
    assert!(matches!(
        service.recent_window("   "),
        Err(QueryError::InvalidInput(_))
    ));
    assert!(matches!(
        service.summary_as_of("", today()),
        Err(QueryError::InvalidInput(_))
    ));
}

// ──────────────────────────────────────────────
// Summary
// ──────────────────────────────────────────────

#[test]
fn summary_ignores_rows_older_than_365_days() {
    let (_dir, store, service) = temp_service();
    let sym = Symbol::normalize("reliance");
    seed(
        &store,
        "reliance",
        vec![
            record(&sym, days_ago(366), 9_999.0, 1.0, 5_000.0),
            record(&sym, days_ago(1), 2_950.0, 2_880.0, 2_912.456),
        ],
    );

    let summary = service.summary_as_of("reliance", today()).unwrap();
    assert_eq!(summary.high, 2_950.0);
    assert_eq!(summary.low, 2_880.0);
    assert_eq!(summary.avg_close, 2_912.46);
}

#[test]
fn summary_window_spans_365_dates_ending_today() {
    let (_dir, store, service) = temp_service();
    let sym = Symbol::normalize("hdfcbank");
    seed(
        &store,
        "hdfcbank",
        vec![
            // a full year back falls just outside the window
            record(&sym, days_ago(365), 1_900.0, 1_400.0, 1_800.0),
            record(&sym, days_ago(364), 1_750.0, 1_520.0, 1_610.0),
            record(&sym, today(), 1_700.0, 1_550.0, 1_650.0),
        ],
    );

    let summary = service.summary_as_of("HDFCBANK.NS", today()).unwrap();
    assert_eq!(summary.high, 1_750.0);
    assert_eq!(summary.low, 1_520.0);
    assert_eq!(summary.avg_close, 1_630.0);
}

#[test]
fn summary_without_rows_in_window_is_not_found() {
    let (_dir, store, service) = temp_service();
    let sym = Symbol::normalize("asianpaint");
    seed(
        &store,
        "asianpaint",
        vec![record(&sym, days_ago(400), 3_000.0, 2_900.0, 2_950.0)],
    );

    assert!(matches!(
        service.summary_as_of("asianpaint", today()),
        Err(QueryError::NotFound(_))
    ));
}

// ──────────────────────────────────────────────
// Compare
// ──────────────────────────────────────────────

#[test]
fn compare_marks_only_the_empty_side() {
    let (_dir, store, service) = temp_service();
    let sym = Symbol::normalize("tcs");
    seed(
        &store,
        "tcs",
        vec![
            record(&sym, days_ago(2), 0.0, 0.0, 3_900.0),
            record(&sym, days_ago(1), 0.0, 0.0, 3_950.5),
        ],
    );

    let comparison = service.compare_as_of("tcs", "infy", 90, today()).unwrap();
    assert_eq!(comparison.len(), 2);
    assert_eq!(
        comparison.get(&Symbol::normalize("tcs")),
        Some(&CompareEntry::Series(ClosingSeries {
            dates: vec![days_ago(2), days_ago(1)],
            closes: vec![3_900.0, 3_950.5],
        }))
    );
    assert_eq!(
        comparison.get(&Symbol::normalize("infy")),
        Some(&CompareEntry::NoData)
    );

    let json = serde_json::to_value(&comparison).unwrap();
    assert_eq!(json["INFY.NS"], "No data found");
    assert_eq!(json["TCS.NS"]["closes"][1], 3_950.5);
}

#[test]
fn compare_window_holds_exactly_its_day_count() {
    let (_dir, store, service) = temp_service();
    seed(&store, "sbin", daily_series("sbin", 120));

    let comparison = service.compare_as_of("sbin", "sbin.ns", 90, today()).unwrap();
    assert_eq!(comparison.len(), 1);
    match comparison.get(&Symbol::normalize("sbin")) {
        Some(CompareEntry::Series(series)) => {
            assert_eq!(series.len(), 90);
            assert_eq!(series.dates[0], days_ago(89));
            assert_eq!(*series.dates.last().unwrap(), today());
        }
        other => panic!("expected a series, got {other:?}"),
    }
}

#[test]
fn compare_with_zero_window_is_invalid() {
    let (_dir, _store, service) = temp_service();
    assert!(matches!(
        service.compare_as_of("tcs", "infy", 0, today()),
        Err(QueryError::InvalidInput(_))
    ));
}

#[test]
fn compare_with_neither_side_present_returns_two_markers() {
    let (_dir, _store, service) = temp_service();
    let comparison = service.compare_as_of("lt", "itc", 90, today()).unwrap();
    assert!(comparison
        .entries()
        .iter()
        .all(|(_, entry)| *entry == CompareEntry::NoData));
}
