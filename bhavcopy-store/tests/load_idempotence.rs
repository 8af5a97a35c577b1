//! Staging-and-upsert load protocol: idempotence, overwrite, tie-break, atomicity.

use bhavcopy_core::CanonicalRecord;
use bhavcopy_store::{BhavStore, StoreError};
use chrono::NaiveDate;

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn record(date: &str, symbol: &str, series: &str, close: f64) -> CanonicalRecord {
    let mut r = CanonicalRecord::new(d(date), symbol, series);
    r.open = Some(close - 10.0);
    r.high = Some(close + 5.0);
    r.low = Some(close - 15.0);
    r.close = Some(close);
    r.last_price = Some(close);
    r.prev_close = Some(close - 2.0);
    r.volume = Some(1_000_000);
    r.turnover = Some(close * 1_000_000.0);
    r.total_trades = Some(50_000);
    r.isin = Some(format!("INE{symbol}"));
    r
}

fn week() -> Vec<CanonicalRecord> {
    let mut rows = Vec::new();
    for date in ["2024-01-01", "2024-01-02", "2024-01-03"] {
        rows.push(record(date, "RELIANCE", "EQ", 2830.0));
        rows.push(record(date, "TCS", "EQ", 3520.0));
        rows.push(record(date, "INFY", "BE", 1520.0));
        rows.push(record(date, "INFY", "EQ", 1525.0));
    }
    rows
}

#[test]
fn loading_the_same_set_twice_changes_nothing() {
    let store = BhavStore::open_in_memory().unwrap();
    store.load(&week()).unwrap();
    let count = store.row_count().unwrap();
    let fingerprint = store.fingerprint().unwrap();

    let report = store.load(&week()).unwrap();
    assert_eq!(report.inserted, 0);
    assert_eq!(report.updated, 12);
    assert_eq!(store.row_count().unwrap(), count);
    assert_eq!(store.fingerprint().unwrap(), fingerprint);
}

#[test]
fn reload_with_changed_close_overwrites_in_place() {
    let store = BhavStore::open_in_memory().unwrap();
    store.load(&week()).unwrap();

    let mut changed = week();
    for r in changed.iter_mut().filter(|r| r.symbol == "TCS") {
        r.close = Some(3600.0);
    }
    store.load(&changed).unwrap();

    assert_eq!(store.row_count().unwrap(), 12);
    let tcs = store.history("TCS", "EQ", None, None).unwrap();
    assert_eq!(tcs.len(), 3);
    assert!(tcs.iter().all(|r| r.close == Some(3600.0)));
}

#[test]
fn duplicate_identity_in_one_load_keeps_the_last_row() {
    let store = BhavStore::open_in_memory().unwrap();
    let rows = vec![
        record("2024-01-03", "TCS", "EQ", 100.0),
        record("2024-01-03", "INFY", "EQ", 1.0),
        record("2024-01-03", "TCS", "EQ", 200.0),
    ];
    let report = store.load(&rows).unwrap();
    assert_eq!(report.staged, 3);
    assert_eq!(report.upserted, 2);
    assert_eq!(report.inserted, 2);

    let tcs = store.history("TCS", "EQ", None, None).unwrap();
    assert_eq!(tcs.len(), 1);
    assert_eq!(tcs[0].close, Some(200.0));
}

#[test]
fn same_symbol_under_two_series_is_two_rows() {
    let store = BhavStore::open_in_memory().unwrap();
    store.load(&week()).unwrap();
    assert_eq!(store.history("INFY", "EQ", None, None).unwrap().len(), 3);
    assert_eq!(store.history("INFY", "BE", None, None).unwrap().len(), 3);
}

#[test]
fn null_identity_aborts_the_whole_load() {
    let store = BhavStore::open_in_memory().unwrap();
    store.load(&week()).unwrap();
    let before = store.fingerprint().unwrap();

    let mut bad = vec![record("2024-01-04", "TCS", "EQ", 3600.0)];
    bad.push(record("2024-01-04", "", "EQ", 1.0));
    let err = store.load(&bad).unwrap_err();
    assert!(matches!(err, StoreError::DuckDb(_)));

    assert_eq!(store.fingerprint().unwrap(), before);
    assert_eq!(store.row_count().unwrap(), 12);
    assert_eq!(store.staging_len().unwrap(), 0);

    // The connection stays usable after the rollback.
    store.load(&bad[..1]).unwrap();
    assert_eq!(store.row_count().unwrap(), 13);
}

#[test]
fn nulls_round_trip_as_nulls() {
    let store = BhavStore::open_in_memory().unwrap();
    let bare = CanonicalRecord::new(d("2024-01-03"), "SGBMAR29", "GB");
    store.load(std::slice::from_ref(&bare)).unwrap();
    let rows = store.history("SGBMAR29", "GB", None, None).unwrap();
    assert_eq!(rows, vec![bare]);
}
