//! CanonicalRecord: one instrument's trading activity for one session.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Column order of the canonical schema, as written to intermediate files.
/// Matches the serde field order of [`CanonicalRecord`].
pub const CANONICAL_HEADER: [&str; 13] = [
    "date",
    "symbol",
    "series",
    "open",
    "high",
    "low",
    "close",
    "last_price",
    "prev_close",
    "volume",
    "turnover",
    "total_trades",
    "isin",
];

/// A normalized bhav copy row.
///
/// `trading_date` is always the date that was requested from the exchange,
/// never a value parsed out of the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    #[serde(rename = "date")]
    pub trading_date: NaiveDate,
    pub symbol: String,
    pub series: String,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub last_price: Option<f64>,
    pub prev_close: Option<f64>,
    pub volume: Option<u64>,
    pub turnover: Option<f64>,
    pub total_trades: Option<u64>,
    pub isin: Option<String>,
}

/// Natural identity of a record: unique per session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NaturalKey {
    pub trading_date: NaiveDate,
    pub symbol: String,
    pub series: String,
}

impl CanonicalRecord {
    /// An empty record for the given identity, all measures null.
    pub fn new(trading_date: NaiveDate, symbol: impl Into<String>, series: impl Into<String>) -> Self {
        Self {
            trading_date,
            symbol: symbol.into(),
            series: series.into(),
            open: None,
            high: None,
            low: None,
            close: None,
            last_price: None,
            prev_close: None,
            volume: None,
            turnover: None,
            total_trades: None,
            isin: None,
        }
    }

    pub fn key(&self) -> NaturalKey {
        NaturalKey {
            trading_date: self.trading_date,
            symbol: self.symbol.clone(),
            series: self.series.clone(),
        }
    }

    /// Case-insensitive exact match on the series code.
    pub fn matches_series(&self, series: &str) -> bool {
        self.series.eq_ignore_ascii_case(series.trim())
    }

    /// Ordering used for merged output: (trading_date, symbol, series).
    pub fn cmp_identity(&self, other: &Self) -> std::cmp::Ordering {
        self.trading_date
            .cmp(&other.trading_date)
            .then_with(|| self.symbol.cmp(&other.symbol))
            .then_with(|| self.series.cmp(&other.series))
    }
}
