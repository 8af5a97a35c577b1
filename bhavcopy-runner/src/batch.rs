//! Batch orchestrator: drives the fetch unit across an ordered list of dates.
//!
//! Dates are fetched strictly one at a time in the order supplied. A soft
//! failure is recorded against its date and the batch moves on; a hard
//! failure stops the remaining dates. Missing dates are never filled in.

use crate::progress::BatchProgress;
use bhavcopy_core::{
    CanonicalRecord, DateFetcher, FailureReason, FetchError, FetchOutcome, SchemaVariant,
};
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("hard failure while fetching {date}: {source}")]
    Fetch {
        date: NaiveDate,
        #[source]
        source: FetchError,
    },

    #[error(
        "bhav copy for {date} is not published yet; the exchange releases it after \
         market close (~4-5 PM IST). Try again later or use --yesterday"
    )]
    SessionNotPublished { date: NaiveDate },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOptions {
    /// Keep only rows whose series matches, case-insensitively.
    pub series_filter: Option<String>,
    /// Combine all dates into one output unit.
    pub merge: bool,
    /// A `not_found` for this date is a hard stop instead of a soft failure.
    pub require_published: Option<NaiveDate>,
}

/// What happened to one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DayStatus {
    Fetched { variant: SchemaVariant, rows: usize },
    SoftFailed { reason: FailureReason, detail: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayReport {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub status: DayStatus,
}

/// One payload for the output sink: a date range and its records.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputUnit {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub records: Vec<CanonicalRecord>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResult {
    /// One report per requested date, in request order.
    pub days: Vec<DayReport>,
    pub units: Vec<OutputUnit>,
}

impl BatchResult {
    pub fn fetched(&self) -> usize {
        self.days
            .iter()
            .filter(|d| matches!(d.status, DayStatus::Fetched { .. }))
            .count()
    }

    pub fn soft_failed(&self) -> usize {
        self.days.len() - self.fetched()
    }

    pub fn total_records(&self) -> usize {
        self.units.iter().map(|u| u.records.len()).sum()
    }

    pub fn records(&self) -> impl Iterator<Item = &CanonicalRecord> {
        self.units.iter().flat_map(|u| u.records.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

pub struct BatchOrchestrator<'a> {
    fetcher: &'a dyn DateFetcher,
    progress: &'a dyn BatchProgress,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(fetcher: &'a dyn DateFetcher, progress: &'a dyn BatchProgress) -> Self {
        Self { fetcher, progress }
    }

    pub fn run(&self, dates: &[NaiveDate], options: &BatchOptions) -> Result<BatchResult, BatchError> {
        let total = dates.len();
        info!(
            total,
            merge = options.merge,
            series = options.series_filter.as_deref().unwrap_or("all"),
            "batch started"
        );

        let mut days = Vec::with_capacity(total);
        let mut units = Vec::new();

        for (i, &date) in dates.iter().enumerate() {
            self.progress.on_start(date, i, total);

            let outcome = self.fetcher.fetch(date).map_err(|source| {
                warn!(%date, error = %source, "hard failure, stopping batch");
                BatchError::Fetch { date, source }
            })?;

            let status = match outcome {
                FetchOutcome::Data {
                    mut records,
                    variant,
                } => {
                    if let Some(series) = options.series_filter.as_deref() {
                        records.retain(|r| r.matches_series(series));
                    }
                    let rows = records.len();
                    units.push(OutputUnit {
                        start: date,
                        end: date,
                        records,
                    });
                    DayStatus::Fetched { variant, rows }
                }
                FetchOutcome::SoftFailure(failure) => {
                    if failure.reason == FailureReason::NotFound
                        && options.require_published == Some(date)
                    {
                        return Err(BatchError::SessionNotPublished { date });
                    }
                    warn!(%date, reason = %failure.reason, detail = %failure.detail, "date skipped");
                    DayStatus::SoftFailed {
                        reason: failure.reason,
                        detail: failure.detail,
                    }
                }
            };

            self.progress.on_complete(date, i, total, &status);
            days.push(DayReport { date, status });
        }

        let result = BatchResult {
            units: if options.merge {
                merge_units(units, dates)
            } else {
                units
            },
            days,
        };

        self.progress
            .on_batch_complete(result.fetched(), result.soft_failed(), total);
        info!(
            fetched = result.fetched(),
            soft_failed = result.soft_failed(),
            records = result.total_records(),
            "batch finished"
        );
        Ok(result)
    }
}

/// Fold per-date units into one unit spanning the requested range, ordered by
/// (trading_date, symbol, series).
fn merge_units(units: Vec<OutputUnit>, dates: &[NaiveDate]) -> Vec<OutputUnit> {
    let (Some(&start), Some(&end)) = (dates.first(), dates.last()) else {
        return Vec::new();
    };
    if units.is_empty() {
        return Vec::new();
    }
    let mut records: Vec<CanonicalRecord> = units.into_iter().flat_map(|u| u.records).collect();
    records.sort_by(|a, b| a.cmp_identity(b));
    vec![OutputUnit {
        start,
        end,
        records,
    }]
}
