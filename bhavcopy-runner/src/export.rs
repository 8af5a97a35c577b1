//! Intermediate CSV files: atomic write, read-back, and discovery by file name.
//!
//! One file per date is named `bhav_YYYYMMDD.csv`; a merged range is
//! `bhav_YYYYMMDD_to_YYYYMMDD.csv`. The header is the canonical column order
//! and nulls are empty fields.

use crate::batch::OutputUnit;
use bhavcopy_core::{CanonicalRecord, CANONICAL_HEADER};
use chrono::NaiveDate;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path} does not start with the canonical header ({})", CANONICAL_HEADER.join(","))]
    UnexpectedHeader { path: PathBuf },
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> ExportError + '_ {
    move |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn csv_err(path: &Path) -> impl FnOnce(csv::Error) -> ExportError + '_ {
    move |source| ExportError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

// ── File names ───────────────────────────────────────────────────────

pub fn file_name(start: NaiveDate, end: NaiveDate) -> String {
    if start == end {
        format!("bhav_{}.csv", start.format("%Y%m%d"))
    } else {
        format!(
            "bhav_{}_to_{}.csv",
            start.format("%Y%m%d"),
            end.format("%Y%m%d")
        )
    }
}

/// Parse `bhav_YYYYMMDD.csv` or `bhav_YYYYMMDD_to_YYYYMMDD.csv` into (start, end).
pub fn parse_file_name(name: &str) -> Option<(NaiveDate, NaiveDate)> {
    let stem = name.strip_prefix("bhav_")?.strip_suffix(".csv")?;
    let parse = |s: &str| {
        if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
            NaiveDate::parse_from_str(s, "%Y%m%d").ok()
        } else {
            None
        }
    };
    match stem.split_once("_to_") {
        Some((start, end)) => Some((parse(start)?, parse(end)?)),
        None => {
            let date = parse(stem)?;
            Some((date, date))
        }
    }
}

// ── Write ────────────────────────────────────────────────────────────

/// Write one output unit into `dir`. The file appears atomically: it is
/// written to a `.tmp` sibling and renamed into place.
pub fn write_unit(dir: &Path, unit: &OutputUnit) -> Result<PathBuf, ExportError> {
    fs::create_dir_all(dir).map_err(io_err(dir))?;
    let path = dir.join(file_name(unit.start, unit.end));
    let tmp_path = path.with_extension("csv.tmp");

    let written = write_records(&tmp_path, &unit.records);
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    fs::rename(&tmp_path, &path).map_err(|source| {
        let _ = fs::remove_file(&tmp_path);
        ExportError::Io {
            path: path.clone(),
            source,
        }
    })?;

    debug!(path = %path.display(), rows = unit.records.len(), "wrote output unit");
    Ok(path)
}

fn write_records(path: &Path, records: &[CanonicalRecord]) -> Result<(), ExportError> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(csv_err(path))?;
    wtr.write_record(CANONICAL_HEADER).map_err(csv_err(path))?;
    for record in records {
        wtr.serialize(record).map_err(csv_err(path))?;
    }
    wtr.flush().map_err(io_err(path))?;
    Ok(())
}

// ── Read ─────────────────────────────────────────────────────────────

/// Read a canonical CSV back into records.
pub fn read_records(path: &Path) -> Result<Vec<CanonicalRecord>, ExportError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err(path))?;

    let headers = rdr.headers().map_err(csv_err(path))?;
    if !headers.iter().eq(CANONICAL_HEADER.iter().copied()) {
        return Err(ExportError::UnexpectedHeader {
            path: path.to_path_buf(),
        });
    }

    let mut records = Vec::new();
    for row in rdr.deserialize() {
        records.push(row.map_err(csv_err(path))?);
    }
    Ok(records)
}

// ── Discovery ────────────────────────────────────────────────────────

/// An intermediate file and the date range embedded in its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BhavFile {
    pub path: PathBuf,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl BhavFile {
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    /// Files to load, ordered by start date.
    pub files: Vec<BhavFile>,
    /// Merged files excluded by `since` although they reach past it.
    pub spanning: Vec<BhavFile>,
}

/// Find `bhav_*.csv` files in `dir`, ordered by embedded start date.
///
/// With `since`, only files starting on or after it are kept. A merged file
/// that starts before `since` but ends on or after it is reported in
/// `spanning` so the caller can warn about it.
pub fn discover_files(dir: &Path, since: Option<NaiveDate>) -> Result<Discovery, ExportError> {
    let mut all = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err(dir))? {
        let entry = entry.map_err(io_err(dir))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with("bhav_") || !name.ends_with(".csv") {
            continue;
        }
        match parse_file_name(&name) {
            Some((start, end)) => all.push(BhavFile {
                path: entry.path(),
                start,
                end,
            }),
            None => warn!(file = %name, "ignoring file without a parsable date in its name"),
        }
    }
    all.sort_by(|a, b| (a.start, a.end, &a.path).cmp(&(b.start, b.end, &b.path)));

    let Some(since) = since else {
        return Ok(Discovery {
            files: all,
            spanning: Vec::new(),
        });
    };

    let mut discovery = Discovery::default();
    for file in all {
        if file.start >= since {
            discovery.files.push(file);
        } else if file.end >= since {
            discovery.spanning.push(file);
        }
    }
    Ok(discovery)
}
