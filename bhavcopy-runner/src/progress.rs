//! Progress callbacks for batch downloads and file loads.
//!
//! Library code never prints; the CLI picks an implementation.

use crate::batch::DayStatus;
use crate::load::FileOutcome;
use chrono::NaiveDate;

pub trait BatchProgress: Send {
    /// Called before a date is fetched.
    fn on_start(&self, date: NaiveDate, index: usize, total: usize);

    /// Called after a date's outcome (post series filter) is known.
    fn on_complete(&self, date: NaiveDate, index: usize, total: usize, status: &DayStatus);

    /// Called once after the last date.
    fn on_batch_complete(&self, fetched: usize, soft_failed: usize, total: usize);
}

pub trait LoadProgress: Send {
    /// Called after each file has been loaded or rejected.
    fn on_file(&self, index: usize, total: usize, outcome: &FileOutcome);
}

/// Prints one line per date (or file) to stdout.
pub struct StdoutProgress;

impl BatchProgress for StdoutProgress {
    fn on_start(&self, date: NaiveDate, index: usize, total: usize) {
        println!("[{}/{}] {date}  ({})", index + 1, total, date.format("%A"));
    }

    fn on_complete(&self, _date: NaiveDate, _index: usize, _total: usize, status: &DayStatus) {
        match status {
            DayStatus::Fetched { variant, rows } => {
                println!("  OK: {rows} records ({variant} layout)")
            }
            DayStatus::SoftFailed { reason, detail } => println!("  SKIP: {reason} ({detail})"),
        }
    }

    fn on_batch_complete(&self, fetched: usize, soft_failed: usize, total: usize) {
        println!("\nDownload complete: {fetched}/{total} fetched, {soft_failed} skipped");
    }
}

impl LoadProgress for StdoutProgress {
    fn on_file(&self, _index: usize, _total: usize, outcome: &FileOutcome) {
        let name = outcome
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match &outcome.error {
            None => println!("  {name:<42} {:>9} rows  ok", outcome.rows),
            Some(e) => println!("  {name:<42} ERROR: {e}"),
        }
    }
}

/// Reports nothing. Used with `--quiet` and in tests.
pub struct SilentProgress;

impl BatchProgress for SilentProgress {
    fn on_start(&self, _date: NaiveDate, _index: usize, _total: usize) {}
    fn on_complete(&self, _date: NaiveDate, _index: usize, _total: usize, _status: &DayStatus) {}
    fn on_batch_complete(&self, _fetched: usize, _soft_failed: usize, _total: usize) {}
}

impl LoadProgress for SilentProgress {
    fn on_file(&self, _index: usize, _total: usize, _outcome: &FileOutcome) {}
}
