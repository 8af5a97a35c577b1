//! bhavcopy store: the durable DuckDB table and the staging loader.
//!
//! - `store`: opening the database, schema, and the transactional staging-and-upsert load
//! - `query`: read-side queries (symbols, history, row count, content fingerprint)

pub mod query;
pub mod store;

pub use store::{BhavStore, LoadReport, StoreError, DEFAULT_LOAD_TIMEOUT};
