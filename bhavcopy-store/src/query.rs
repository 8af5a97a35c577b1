//! Read-side queries over the durable table.

use crate::store::{BhavStore, StoreError};
use bhavcopy_core::CanonicalRecord;
use chrono::NaiveDate;
use duckdb::ToSql;

const SELECT_COLUMNS: &str = "strftime(trading_date, '%Y-%m-%d'), symbol, series, open, high, low, close, \
     last_price, prev_close, volume, turnover, total_trades, isin";

/// A stored row with its date still in text form.
type StoredRow = (String, CanonicalRecord);

fn read_row(row: &duckdb::Row<'_>) -> duckdb::Result<StoredRow> {
    let date_text: String = row.get(0)?;
    let symbol: String = row.get(1)?;
    let series: String = row.get(2)?;
    let mut record = CanonicalRecord::new(NaiveDate::MIN, symbol, series);
    record.open = row.get(3)?;
    record.high = row.get(4)?;
    record.low = row.get(5)?;
    record.close = row.get(6)?;
    record.last_price = row.get(7)?;
    record.prev_close = row.get(8)?;
    record.volume = row.get::<_, Option<i64>>(9)?.and_then(|v| u64::try_from(v).ok());
    record.turnover = row.get(10)?;
    record.total_trades = row.get::<_, Option<i64>>(11)?.and_then(|v| u64::try_from(v).ok());
    record.isin = row.get(12)?;
    Ok((date_text, record))
}

fn with_date((date_text, mut record): StoredRow) -> Result<CanonicalRecord, StoreError> {
    record.trading_date = NaiveDate::parse_from_str(&date_text, "%Y-%m-%d")
        .map_err(|_| StoreError::CorruptDate(date_text.clone()))?;
    Ok(record)
}

impl BhavStore {
    pub fn row_count(&self) -> Result<usize, StoreError> {
        let n: i64 = self
            .connection
            .query_row("SELECT COUNT(*) FROM bhav_copy", [], |row| row.get(0))?;
        Ok(n.max(0) as usize)
    }

    /// Distinct symbols, sorted, optionally restricted to one series.
    pub fn symbols(&self, series: Option<&str>) -> Result<Vec<String>, StoreError> {
        let series = series.map(|s| s.trim().to_uppercase());
        let mut stmt = self.connection.prepare(
            "SELECT DISTINCT symbol FROM bhav_copy \
             WHERE series = COALESCE(?, series) \
             ORDER BY symbol",
        )?;
        let params: [&dyn ToSql; 1] = [&series];
        let rows = stmt.query_map(params.as_slice(), |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// One symbol's rows in a series, ordered by date. Bounds are inclusive;
    /// a missing bound is open.
    pub fn history(
        &self,
        symbol: &str,
        series: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<CanonicalRecord>, StoreError> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(StoreError::InvalidRange { from, to });
            }
        }
        let symbol = symbol.trim().to_uppercase();
        let series = series.trim().to_uppercase();
        let from = from.map_or_else(|| "0001-01-01".to_string(), |d| d.format("%Y-%m-%d").to_string());
        let to = to.map_or_else(|| "9999-12-31".to_string(), |d| d.format("%Y-%m-%d").to_string());

        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM bhav_copy \
             WHERE symbol = ? AND series = ? \
               AND trading_date BETWEEN CAST(? AS DATE) AND CAST(? AS DATE) \
             ORDER BY trading_date"
        );
        let mut stmt = self.connection.prepare(&sql)?;
        let params: [&dyn ToSql; 4] = [&symbol, &series, &from, &to];
        let rows = stmt.query_map(params.as_slice(), read_row)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(with_date(row?)?);
        }
        Ok(out)
    }

    /// Earliest and latest stored trading dates.
    pub fn date_bounds(&self) -> Result<Option<(NaiveDate, NaiveDate)>, StoreError> {
        let (min, max): (Option<String>, Option<String>) = self.connection.query_row(
            "SELECT strftime(MIN(trading_date), '%Y-%m-%d'), strftime(MAX(trading_date), '%Y-%m-%d') \
             FROM bhav_copy",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        match (min, max) {
            (Some(min), Some(max)) => {
                let parse = |s: String| {
                    NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|_| StoreError::CorruptDate(s))
                };
                Ok(Some((parse(min)?, parse(max)?)))
            }
            _ => Ok(None),
        }
    }

    /// BLAKE3 digest of the full table content in identity order.
    ///
    /// Two stores with equal fingerprints hold identical rows.
    pub fn fingerprint(&self) -> Result<String, StoreError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM bhav_copy ORDER BY trading_date, symbol, series");
        let mut stmt = self.connection.prepare(&sql)?;
        let rows = stmt.query_map([], read_row)?;

        let mut hasher = blake3::Hasher::new();
        for row in rows {
            let (date, r) = row?;
            let line = format!(
                "{date}|{}|{}|{:?}|{:?}|{:?}|{:?}|{:?}|{:?}|{:?}|{:?}|{:?}|{:?}\n",
                r.symbol,
                r.series,
                r.open,
                r.high,
                r.low,
                r.close,
                r.last_price,
                r.prev_close,
                r.volume,
                r.turnover,
                r.total_trades,
                r.isin,
            );
            hasher.update(line.as_bytes());
        }
        Ok(hasher.finalize().to_hex().to_string())
    }
}
