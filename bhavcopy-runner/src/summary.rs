//! End-of-batch summary, printable as text or JSON.

use crate::batch::{BatchResult, DayStatus};
use bhavcopy_core::FailureReason;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedDate {
    pub date: NaiveDate,
    pub reason: FailureReason,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub candidate_dates: usize,
    pub fetched: usize,
    pub skipped: Vec<SkippedDate>,
    pub total_records: usize,
    pub unique_symbols: usize,
    pub series_breakdown: BTreeMap<String, usize>,
    pub close_range: Option<(f64, f64)>,
    pub outputs: Vec<PathBuf>,
}

impl BatchSummary {
    pub fn from_result(result: &BatchResult, outputs: Vec<PathBuf>) -> Self {
        let skipped = result
            .days
            .iter()
            .filter_map(|day| match &day.status {
                DayStatus::SoftFailed { reason, detail } => Some(SkippedDate {
                    date: day.date,
                    reason: *reason,
                    detail: detail.clone(),
                }),
                DayStatus::Fetched { .. } => None,
            })
            .collect();

        let mut symbols = BTreeSet::new();
        let mut series_breakdown = BTreeMap::new();
        let mut close_range: Option<(f64, f64)> = None;
        for r in result.records() {
            symbols.insert(r.symbol.as_str());
            *series_breakdown.entry(r.series.clone()).or_insert(0) += 1;
            if let Some(close) = r.close {
                close_range = Some(match close_range {
                    Some((lo, hi)) => (lo.min(close), hi.max(close)),
                    None => (close, close),
                });
            }
        }

        Self {
            candidate_dates: result.days.len(),
            fetched: result.fetched(),
            skipped,
            total_records: result.total_records(),
            unique_symbols: symbols.len(),
            series_breakdown,
            close_range,
            outputs,
        }
    }

    /// Reasons with their date counts, for a one-line overview.
    pub fn skip_reasons(&self) -> BTreeMap<FailureReason, usize> {
        let mut counts = BTreeMap::new();
        for s in &self.skipped {
            *counts.entry(s.reason).or_insert(0) += 1;
        }
        counts
    }

    pub fn render_text(&self) -> String {
        let rule = "─".repeat(56);
        let mut out = String::new();
        let _ = writeln!(out, "{rule}\n  SUMMARY\n{rule}");
        let _ = writeln!(out, "  Candidate dates   : {}", self.candidate_dates);
        let _ = writeln!(out, "  Trading days got  : {}", self.fetched);
        let _ = writeln!(out, "  Skipped           : {}", self.skipped.len());
        for s in &self.skipped {
            let _ = writeln!(out, "    {}  {} ({})", s.date, s.reason, s.detail);
        }
        let _ = writeln!(out, "  Total records     : {}", self.total_records);
        let _ = writeln!(out, "  Unique symbols    : {}", self.unique_symbols);

        if !self.series_breakdown.is_empty() {
            let mut by_count: Vec<(&String, &usize)> = self.series_breakdown.iter().collect();
            by_count.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
            let breakdown: Vec<String> = by_count.iter().map(|(s, c)| format!("{s}={c}")).collect();
            let _ = writeln!(out, "  Series breakdown  : {}", breakdown.join("  "));
        }
        if let Some((lo, hi)) = self.close_range {
            let _ = writeln!(out, "  Close price range : {lo:.2} - {hi:.2}");
        }
        for path in &self.outputs {
            let _ = writeln!(out, "  Output file       : {}", path.display());
        }
        let _ = write!(out, "{rule}");
        out
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
