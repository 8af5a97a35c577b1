//! Loads discovered intermediate files into the store, one transaction per file.
//!
//! A file that cannot be read or whose load is rolled back is recorded and the
//! next file proceeds; earlier committed files are unaffected.

use crate::export::{read_records, BhavFile};
use crate::progress::LoadProgress;
use bhavcopy_store::{BhavStore, LoadReport};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileOutcome {
    pub file: PathBuf,
    /// Rows read from the file (zero when the file itself was unreadable).
    pub rows: usize,
    pub report: Option<LoadReport>,
    pub error: Option<String>,
}

impl FileOutcome {
    pub fn accepted(&self) -> usize {
        self.report.map_or(0, |r| r.upserted)
    }

    pub fn rejected(&self) -> usize {
        if self.error.is_some() {
            self.rows
        } else {
            0
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadSummary {
    pub files: Vec<FileOutcome>,
}

impl LoadSummary {
    pub fn processed(&self) -> usize {
        self.files.iter().filter(|f| f.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.files.len() - self.processed()
    }

    pub fn total_rows(&self) -> usize {
        self.files.iter().filter(|f| f.is_ok()).map(|f| f.rows).sum()
    }

    pub fn upserted(&self) -> usize {
        self.files.iter().map(FileOutcome::accepted).sum()
    }

    pub fn first_error(&self) -> Option<&str> {
        self.files.iter().find_map(|f| f.error.as_deref())
    }
}

pub fn load_files(
    store: &BhavStore,
    files: &[BhavFile],
    progress: &dyn LoadProgress,
) -> LoadSummary {
    let total = files.len();
    let mut summary = LoadSummary::default();

    for (i, file) in files.iter().enumerate() {
        let outcome = load_one(store, file);
        match &outcome.error {
            None => info!(file = %file.name(), rows = outcome.rows, "file loaded"),
            Some(e) => warn!(file = %file.name(), error = %e, "file skipped"),
        }
        progress.on_file(i, total, &outcome);
        summary.files.push(outcome);
    }

    summary
}

fn load_one(store: &BhavStore, file: &BhavFile) -> FileOutcome {
    let records = match read_records(&file.path) {
        Ok(r) => r,
        Err(e) => {
            return FileOutcome {
                file: file.path.clone(),
                rows: 0,
                report: None,
                error: Some(e.to_string()),
            }
        }
    };

    let rows = records.len();
    match store.load(&records) {
        Ok(report) => FileOutcome {
            file: file.path.clone(),
            rows,
            report: Some(report),
            error: None,
        },
        Err(e) => FileOutcome {
            file: file.path.clone(),
            rows,
            report: None,
            error: Some(e.to_string()),
        },
    }
}
