//! Raw bhav copy table → canonical records.
//!
//! Both layouts are handled by the same code path: the variant only decides
//! which column map is applied. Numeric cells that are empty or hold a sentinel
//! become null, never zero. The trading date column of the payload is ignored
//! and replaced by the requested date.

use crate::record::CanonicalRecord;
use crate::schema::{CanonicalField, SchemaVariant};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::io::Read;
use thiserror::Error;
use tracing::debug;

/// Cell values that mean "no value" in exchange files.
const NULL_SENTINELS: [&str; 7] = ["", "-", "NA", "N/A", "NAN", "NULL", "NONE"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("{variant} layout is missing required columns: {}", .missing.join(", "))]
    MissingColumns {
        variant: SchemaVariant,
        missing: Vec<String>,
    },
}

/// A parsed CSV payload: trimmed header names plus rows of raw cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Read a CSV payload. Header names and cells are trimmed; short rows are
    /// tolerated and read as empty cells.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, csv::Error> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Map `table` onto the canonical schema for `variant`, stamping every record
/// with `trading_date`.
///
/// Rows with an empty symbol or series are dropped. A table that lacks any of
/// the variant's mapped columns is rejected as a whole.
pub fn normalize(
    table: &RawTable,
    trading_date: NaiveDate,
    variant: SchemaVariant,
) -> Result<Vec<CanonicalRecord>, NormalizeError> {
    let positions: HashMap<&str, usize> = table
        .headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.as_str(), i))
        .collect();

    let mut columns: Vec<(CanonicalField, usize)> = Vec::with_capacity(13);
    let mut missing = Vec::new();
    for (raw, field) in variant.column_map() {
        match positions.get(raw) {
            Some(&idx) => columns.push((*field, idx)),
            None => missing.push((*raw).to_string()),
        }
    }
    if !missing.is_empty() {
        return Err(NormalizeError::MissingColumns { variant, missing });
    }

    let mut records = Vec::with_capacity(table.rows.len());
    let mut dropped = 0usize;
    let mut coerced = 0usize;

    for row in &table.rows {
        let cell = |idx: usize| row.get(idx).map(|c| c.trim()).unwrap_or("");
        let mut record = CanonicalRecord::new(trading_date, String::new(), String::new());

        for &(field, idx) in &columns {
            let raw = cell(idx);
            match field {
                CanonicalField::TradingDate => {}
                CanonicalField::Symbol => record.symbol = raw.to_string(),
                CanonicalField::Series => record.series = raw.to_string(),
                CanonicalField::Isin => record.isin = text(raw),
                CanonicalField::Open => record.open = decimal(raw, &mut coerced),
                CanonicalField::High => record.high = decimal(raw, &mut coerced),
                CanonicalField::Low => record.low = decimal(raw, &mut coerced),
                CanonicalField::Close => record.close = decimal(raw, &mut coerced),
                CanonicalField::LastPrice => record.last_price = decimal(raw, &mut coerced),
                CanonicalField::PrevClose => record.prev_close = decimal(raw, &mut coerced),
                CanonicalField::Turnover => record.turnover = decimal(raw, &mut coerced),
                CanonicalField::Volume => record.volume = count(raw, &mut coerced),
                CanonicalField::TotalTrades => record.total_trades = count(raw, &mut coerced),
            }
        }

        if record.symbol.is_empty() || record.series.is_empty() {
            dropped += 1;
            continue;
        }
        records.push(record);
    }

    if dropped > 0 || coerced > 0 {
        debug!(
            %trading_date,
            %variant,
            dropped,
            coerced,
            "normalization dropped rows without identity or nulled unparsable cells"
        );
    }

    Ok(records)
}

fn is_null_sentinel(raw: &str) -> bool {
    NULL_SENTINELS.iter().any(|s| raw.eq_ignore_ascii_case(s))
}

fn text(raw: &str) -> Option<String> {
    if is_null_sentinel(raw) {
        None
    } else {
        Some(raw.to_string())
    }
}

fn decimal(raw: &str, coerced: &mut usize) -> Option<f64> {
    if is_null_sentinel(raw) {
        return None;
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => {
            *coerced += 1;
            None
        }
    }
}

/// Non-negative integer. Integral floats such as `1000.0` are accepted.
fn count(raw: &str, coerced: &mut usize) -> Option<u64> {
    if is_null_sentinel(raw) {
        return None;
    }
    if let Ok(v) = raw.parse::<u64>() {
        return Some(v);
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= u64::MAX as f64 => {
            Some(v as u64)
        }
        _ => {
            *coerced += 1;
            None
        }
    }
}
