//! Durable bhav copy table and the staging-and-upsert load protocol.
//!
//! Every `load` is one transaction:
//! 1. clear the connection's temporary staging table
//! 2. write every record into staging, tagged with its input position
//! 3. upsert one row per natural identity into `bhav_copy`, the latest
//!    input position winning when an identity repeats
//! 4. clear staging and commit
//!
//! Any error (a NOT NULL violation on the durable table, a count too large for
//! BIGINT, the load timeout) rolls the whole transaction back, so the durable
//! table is never partially updated and staging is empty afterwards either way.
//! The timeout interrupts a statement that is still running at the deadline.

use bhavcopy_core::CanonicalRecord;
use duckdb::{Connection, ToSql};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    DuckDb(#[from] duckdb::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("load timed out after {timeout_ms}ms")]
    LoadTimeout { timeout_ms: u64 },

    #[error("{field} {value} for {symbol} on {date} does not fit a BIGINT column")]
    CountOutOfRange {
        field: &'static str,
        value: u64,
        symbol: String,
        date: chrono::NaiveDate,
    },

    #[error("stored trading date '{0}' is not a valid date")]
    CorruptDate(String),

    #[error("invalid date range: {from} is after {to}")]
    InvalidRange {
        from: chrono::NaiveDate,
        to: chrono::NaiveDate,
    },
}

/// Outcome of one committed load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Rows written to staging (input length).
    pub staged: usize,
    /// Distinct identities written to the durable table.
    pub upserted: usize,
    /// Identities that did not exist before this load.
    pub inserted: usize,
    /// Identities that existed and were overwritten.
    pub updated: usize,
}

const CREATE_TABLE_SQL: &str = "
    CREATE TABLE IF NOT EXISTS bhav_copy (
        trading_date DATE    NOT NULL,
        symbol       VARCHAR NOT NULL,
        series       VARCHAR NOT NULL,
        open         DOUBLE,
        high         DOUBLE,
        low          DOUBLE,
        close        DOUBLE,
        last_price   DOUBLE,
        prev_close   DOUBLE,
        volume       BIGINT,
        turnover     DOUBLE,
        total_trades BIGINT,
        isin         VARCHAR,
        PRIMARY KEY (trading_date, symbol, series)
    );";

// No constraints: duplicates and nulls are allowed here and resolved on upsert.
const CREATE_STAGING_SQL: &str = "
    CREATE TEMP TABLE IF NOT EXISTS bhav_staging (
        seq          BIGINT,
        trading_date DATE,
        symbol       VARCHAR,
        series       VARCHAR,
        open         DOUBLE,
        high         DOUBLE,
        low          DOUBLE,
        close        DOUBLE,
        last_price   DOUBLE,
        prev_close   DOUBLE,
        volume       BIGINT,
        turnover     DOUBLE,
        total_trades BIGINT,
        isin         VARCHAR
    );";

const STAGE_ROW_SQL: &str = "
    INSERT INTO bhav_staging
        (seq, trading_date, symbol, series, open, high, low, close,
         last_price, prev_close, volume, turnover, total_trades, isin)
    VALUES (?, TRY_CAST(? AS DATE), NULLIF(?, ''), NULLIF(?, ''), ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

const COUNT_DISTINCT_SQL: &str = "
    SELECT COUNT(*) FROM (
        SELECT DISTINCT trading_date, symbol, series FROM bhav_staging
    )";

const COUNT_EXISTING_SQL: &str = "
    SELECT COUNT(*) FROM (
        SELECT DISTINCT s.trading_date, s.symbol, s.series
        FROM bhav_staging s
        JOIN bhav_copy b
          ON b.trading_date = s.trading_date
         AND b.symbol = s.symbol
         AND b.series = s.series
    )";

const UPSERT_SQL: &str = "
    INSERT INTO bhav_copy
        (trading_date, symbol, series, open, high, low, close,
         last_price, prev_close, volume, turnover, total_trades, isin)
    SELECT trading_date, symbol, series, open, high, low, close,
           last_price, prev_close, volume, turnover, total_trades, isin
    FROM (
        SELECT *,
               ROW_NUMBER() OVER (
                   PARTITION BY trading_date, symbol, series ORDER BY seq DESC
               ) AS rn
        FROM bhav_staging
    ) AS latest
    WHERE rn = 1
    ON CONFLICT (trading_date, symbol, series) DO UPDATE SET
        open         = EXCLUDED.open,
        high         = EXCLUDED.high,
        low          = EXCLUDED.low,
        close        = EXCLUDED.close,
        last_price   = EXCLUDED.last_price,
        prev_close   = EXCLUDED.prev_close,
        volume       = EXCLUDED.volume,
        turnover     = EXCLUDED.turnover,
        total_trades = EXCLUDED.total_trades,
        isin         = EXCLUDED.isin";

/// Handle to the bhav copy database.
pub struct BhavStore {
    pub(crate) connection: Connection,
    load_timeout: Duration,
}

impl BhavStore {
    /// Open (or create) the database file, creating its parent directory.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let store = Self {
            connection: Connection::open(path)?,
            load_timeout: DEFAULT_LOAD_TIMEOUT,
        };
        store.initialize()?;
        debug!(path = %path.display(), "opened bhav copy store");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            connection: Connection::open_in_memory()?,
            load_timeout: DEFAULT_LOAD_TIMEOUT,
        };
        store.initialize()?;
        Ok(store)
    }

    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    pub fn load_timeout(&self) -> Duration {
        self.load_timeout
    }

    /// Create the durable table and this connection's staging table.
    pub fn initialize(&self) -> Result<(), StoreError> {
        self.connection.execute_batch(CREATE_TABLE_SQL)?;
        self.connection.execute_batch(CREATE_STAGING_SQL)?;
        Ok(())
    }

    /// Stage and upsert `records` in a single transaction.
    pub fn load(&self, records: &[CanonicalRecord]) -> Result<LoadReport, StoreError> {
        if records.is_empty() {
            return Ok(LoadReport::default());
        }

        let started = Instant::now();
        let connection = &self.connection;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = with_deadline(connection, self.load_timeout, || {
            connection.execute_batch("DELETE FROM bhav_staging")?;

            let mut stage = connection.prepare(STAGE_ROW_SQL)?;
            for (seq, record) in records.iter().enumerate() {
                stage_row(&mut stage, seq, record)?;
                ensure_timeout(started, self.load_timeout)?;
            }
            drop(stage);

            let distinct: i64 = connection.query_row(COUNT_DISTINCT_SQL, [], |row| row.get(0))?;
            let existing: i64 = connection.query_row(COUNT_EXISTING_SQL, [], |row| row.get(0))?;

            let upserted = connection.execute(UPSERT_SQL, [])?;
            connection.execute_batch("DELETE FROM bhav_staging")?;
            ensure_timeout(started, self.load_timeout)?;

            let existing = existing.max(0) as usize;
            Ok(LoadReport {
                staged: records.len(),
                upserted,
                inserted: (distinct.max(0) as usize).saturating_sub(existing),
                updated: existing,
            })
        });

        match &result {
            Ok(report) => info!(
                staged = report.staged,
                upserted = report.upserted,
                inserted = report.inserted,
                updated = report.updated,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "load committed"
            ),
            Err(e) => warn!(error = %e, staged = records.len(), "load rolled back"),
        }

        finalize_transaction(connection, result)
    }

    /// Rows currently in the staging table. Always zero between loads.
    pub fn staging_len(&self) -> Result<usize, StoreError> {
        let n: i64 = self
            .connection
            .query_row("SELECT COUNT(*) FROM bhav_staging", [], |row| row.get(0))?;
        Ok(n.max(0) as usize)
    }
}

fn stage_row(
    stage: &mut duckdb::Statement<'_>,
    seq: usize,
    record: &CanonicalRecord,
) -> Result<(), StoreError> {
    let seq = i64::try_from(seq).unwrap_or(i64::MAX);
    let date = record.trading_date.format("%Y-%m-%d").to_string();
    let volume = bigint(record, "volume", record.volume)?;
    let total_trades = bigint(record, "total_trades", record.total_trades)?;
    let params: [&dyn ToSql; 14] = [
        &seq,
        &date,
        &record.symbol,
        &record.series,
        &record.open,
        &record.high,
        &record.low,
        &record.close,
        &record.last_price,
        &record.prev_close,
        &volume,
        &record.turnover,
        &total_trades,
        &record.isin,
    ];
    stage.execute(params.as_slice())?;
    Ok(())
}

fn bigint(
    record: &CanonicalRecord,
    field: &'static str,
    value: Option<u64>,
) -> Result<Option<i64>, StoreError> {
    value
        .map(|v| {
            i64::try_from(v).map_err(|_| StoreError::CountOutOfRange {
                field,
                value: v,
                symbol: record.symbol.clone(),
                date: record.trading_date,
            })
        })
        .transpose()
}

/// Commit on success, roll back on failure.
fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, StoreError>,
) -> Result<T, StoreError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

fn ensure_timeout(started: Instant, timeout: Duration) -> Result<(), StoreError> {
    if started.elapsed() > timeout {
        return Err(timed_out(timeout));
    }
    Ok(())
}

fn timed_out(timeout: Duration) -> StoreError {
    StoreError::LoadTimeout {
        timeout_ms: timeout.as_millis().min(u128::from(u64::MAX)) as u64,
    }
}

/// Run `work` while a watchdog thread interrupts whatever statement the
/// connection is executing once `timeout` has elapsed. A statement failing
/// after the interrupt is reported as a load timeout.
fn with_deadline<T>(
    connection: &Connection,
    timeout: Duration,
    work: impl FnOnce() -> Result<T, StoreError>,
) -> Result<T, StoreError> {
    let interrupt = connection.interrupt_handle();
    let fired = AtomicBool::new(false);
    let fired_flag = &fired;
    let (done_tx, done_rx) = mpsc::channel::<()>();

    let result = thread::scope(|scope| {
        scope.spawn(move || {
            if let Err(RecvTimeoutError::Timeout) = done_rx.recv_timeout(timeout) {
                fired_flag.store(true, Ordering::SeqCst);
                interrupt.interrupt();
            }
        });
        let result = work();
        let _ = done_tx.send(());
        result
    });

    match result {
        Err(StoreError::DuckDb(e)) if fired.load(Ordering::SeqCst) => {
            debug!(error = %e, "statement interrupted at load deadline");
            Err(timed_out(timeout))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn record(date: &str, symbol: &str, series: &str, close: f64) -> CanonicalRecord {
        let mut r = CanonicalRecord::new(d(date), symbol, series);
        r.open = Some(close - 1.0);
        r.close = Some(close);
        r.volume = Some(1000);
        r.isin = Some(format!("INE{symbol}"));
        r
    }

    fn sample() -> Vec<CanonicalRecord> {
        vec![
            record("2024-01-03", "RELIANCE", "EQ", 2830.0),
            record("2024-01-03", "TCS", "EQ", 3520.0),
            record("2024-01-03", "INFY", "BE", 1520.0),
        ]
    }

    #[test]
    fn first_load_inserts_everything() {
        let store = BhavStore::open_in_memory().unwrap();
        let report = store.load(&sample()).unwrap();
        assert_eq!(report.staged, 3);
        assert_eq!(report.upserted, 3);
        assert_eq!(report.inserted, 3);
        assert_eq!(report.updated, 0);
        assert_eq!(store.row_count().unwrap(), 3);
    }

    #[test]
    fn reload_updates_instead_of_duplicating() {
        let store = BhavStore::open_in_memory().unwrap();
        store.load(&sample()).unwrap();
        let report = store.load(&sample()).unwrap();
        assert_eq!(report.inserted, 0);
        assert_eq!(report.updated, 3);
        assert_eq!(store.row_count().unwrap(), 3);
    }

    #[test]
    fn empty_load_is_a_no_op() {
        let store = BhavStore::open_in_memory().unwrap();
        assert_eq!(store.load(&[]).unwrap(), LoadReport::default());
        assert_eq!(store.row_count().unwrap(), 0);
    }

    #[test]
    fn staging_is_empty_after_commit() {
        let store = BhavStore::open_in_memory().unwrap();
        store.load(&sample()).unwrap();
        assert_eq!(store.staging_len().unwrap(), 0);
    }

    #[test]
    fn zero_timeout_rolls_back() {
        let store = BhavStore::open_in_memory()
            .unwrap()
            .with_load_timeout(Duration::ZERO);
        let err = store.load(&sample()).unwrap_err();
        assert!(matches!(err, StoreError::LoadTimeout { .. }));
        assert_eq!(store.row_count().unwrap(), 0);
        assert_eq!(store.staging_len().unwrap(), 0);
    }

    #[test]
    fn deadline_interrupts_a_running_statement() {
        let store = BhavStore::open_in_memory().unwrap();
        let started = Instant::now();
        let err = with_deadline(&store.connection, Duration::from_millis(200), || {
            let n: i64 = store.connection.query_row(
                "SELECT COUNT(*) FROM range(100000000000) t(i) WHERE i % 7 = 3",
                [],
                |row| row.get(0),
            )?;
            Ok(n)
        })
        .unwrap_err();
        assert!(matches!(err, StoreError::LoadTimeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(60));

        // The connection keeps working after an interrupt.
        store.load(&sample()).unwrap();
        assert_eq!(store.row_count().unwrap(), 3);
    }

    #[test]
    fn work_finishing_before_the_deadline_is_untouched() {
        let store = BhavStore::open_in_memory().unwrap();
        let n = with_deadline(&store.connection, Duration::from_secs(30), || {
            Ok(store.connection.query_row("SELECT 42", [], |row| row.get::<_, i64>(0))?)
        })
        .unwrap();
        assert_eq!(n, 42);
    }

    #[test]
    fn count_beyond_bigint_aborts_the_whole_load() {
        let store = BhavStore::open_in_memory().unwrap();
        let mut rows = sample();
        rows[1].volume = Some(u64::MAX);

        let err = store.load(&rows).unwrap_err();
        match err {
            StoreError::CountOutOfRange { field, value, symbol, .. } => {
                assert_eq!(field, "volume");
                assert_eq!(value, u64::MAX);
                assert_eq!(symbol, "TCS");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.row_count().unwrap(), 0);
        assert_eq!(store.staging_len().unwrap(), 0);

        rows[1].volume = None;
        rows[2].total_trades = Some(u64::MAX);
        assert!(matches!(
            store.load(&rows),
            Err(StoreError::CountOutOfRange { field: "total_trades", .. })
        ));
        assert_eq!(store.row_count().unwrap(), 0);
    }

    #[test]
    fn file_backed_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("bhav.duckdb");
        {
            let store = BhavStore::open(&path).unwrap();
            store.load(&sample()).unwrap();
        }
        let store = BhavStore::open(&path).unwrap();
        assert_eq!(store.row_count().unwrap(), 3);
    }
}
