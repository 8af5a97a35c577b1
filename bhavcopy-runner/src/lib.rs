//! bhavcopy runner: batch orchestration and everything around it.
//!
//! - `batch`: drives the fetch unit across dates with the continue-on-failure contract
//! - `progress`: progress callbacks for downloads and loads
//! - `summary`: end-of-batch summary (text and JSON)
//! - `export`: intermediate CSV write/read and file discovery
//! - `load`: per-file transactional loading into the store
//! - `config`: TOML configuration with defaults and validation
//! - `plan`: merge defaulting and large-range notice

pub mod batch;
pub mod config;
pub mod export;
pub mod load;
pub mod plan;
pub mod progress;
pub mod summary;

pub use batch::{BatchError, BatchOptions, BatchOrchestrator, BatchResult, DayReport, DayStatus, OutputUnit};
pub use config::{AppConfig, ConfigError};
pub use export::{discover_files, read_records, write_unit, BhavFile, Discovery, ExportError};
pub use load::{load_files, FileOutcome, LoadSummary};
pub use progress::{BatchProgress, LoadProgress, SilentProgress, StdoutProgress};
pub use summary::BatchSummary;

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<BatchResult>();
        require_sync::<BatchResult>();
        require_send::<BatchSummary>();
        require_send::<LoadSummary>();
        require_send::<AppConfig>();
        require_sync::<AppConfig>();
    }
}
