//! Trading-day candidates and date selection modes.
//!
//! The exchange does not publish on weekends, so relative modes (`--days`,
//! `--from/--to`, `--all`) only ever produce Monday–Friday candidates. Public
//! holidays are not known here; they surface later as `not_found` soft
//! failures from the fetch unit.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use thiserror::Error;

/// First session of equity trading on the exchange.
pub const EXCHANGE_START_DATE: NaiveDate = match NaiveDate::from_ymd_opt(1994, 11, 3) {
    Some(d) => d,
    None => NaiveDate::MIN,
};

const ACCEPTED_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalendarError {
    #[error("cannot parse date '{0}'; expected YYYY-MM-DD, e.g. 2025-01-31")]
    Unparseable(String),

    #[error("range start {from} is later than range end {to}")]
    RangeInverted { from: NaiveDate, to: NaiveDate },

    #[error("day count must be a positive integer")]
    NonPositiveDays,
}

/// Parse a user-supplied date in one of the accepted layouts.
pub fn parse_date(input: &str) -> Result<NaiveDate, CalendarError> {
    let trimmed = input.trim();
    ACCEPTED_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| CalendarError::Unparseable(input.to_string()))
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// All Monday–Friday dates in `[start, end]`, ascending. Empty when start > end.
pub fn weekdays(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    if start > end {
        return Vec::new();
    }
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !is_weekend(*d))
        .collect()
}

/// How the caller chose which sessions to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateSelection {
    /// Today's session only.
    Today,
    /// The previous calendar day (not weekday-adjusted).
    Yesterday,
    /// The last N weekday candidates up to and including today.
    LastDays(u32),
    /// One specific date.
    Single(NaiveDate),
    /// Weekdays in `[from, to]`; `to` defaults to today.
    Range { from: NaiveDate, to: Option<NaiveDate> },
    /// Every weekday since the exchange started trading.
    All,
}

impl DateSelection {
    /// Resolve the selection into an ordered, duplicate-free list of candidate dates.
    ///
    /// Range validation happens here, before anything touches the network.
    pub fn resolve(&self, today: NaiveDate) -> Result<Vec<NaiveDate>, CalendarError> {
        match self {
            Self::Today => Ok(vec![today]),
            Self::Yesterday => Ok(vec![today.pred_opt().unwrap_or(today)]),
            Self::LastDays(n) => {
                if *n == 0 {
                    return Err(CalendarError::NonPositiveDays);
                }
                let lookback = u64::from(*n) * 3 + 10;
                let pool_start = today
                    .checked_sub_days(Days::new(lookback))
                    .unwrap_or(EXCHANGE_START_DATE)
                    .max(EXCHANGE_START_DATE);
                let pool = weekdays(pool_start, today);
                let keep = (*n as usize).min(pool.len());
                Ok(pool[pool.len() - keep..].to_vec())
            }
            Self::Single(date) => Ok(vec![*date]),
            Self::Range { from, to } => {
                let end = to.unwrap_or(today);
                if *from > end {
                    return Err(CalendarError::RangeInverted { from: *from, to: end });
                }
                Ok(weekdays(*from, end))
            }
            Self::All => Ok(weekdays(EXCHANGE_START_DATE, today)),
        }
    }

    /// Short human description for the run plan.
    pub fn describe(&self, today: NaiveDate) -> String {
        match self {
            Self::Today => "today".to_string(),
            Self::Yesterday => "yesterday".to_string(),
            Self::LastDays(n) => format!("last {n} trading-day candidates"),
            Self::Single(d) => format!("specific date {d}"),
            Self::Range { from, to } => format!("range {from} to {}", to.unwrap_or(today)),
            Self::All => format!("all data since {EXCHANGE_START_DATE}"),
        }
    }

    pub fn is_today(&self) -> bool {
        matches!(self, Self::Today)
    }
}
