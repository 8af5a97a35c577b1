//! bhavcopy core: canonical record, trading calendar, dual-schema resolution,
//! normalization and the per-date fetch unit.
//!
//! This crate contains everything needed to turn one calendar date into a set
//! of canonical records:
//! - `record`: the 13-field canonical record and its natural identity
//! - `calendar`: weekday filtering and date selection modes
//! - `schema`: legacy/unified layout resolution around a configurable cutover
//! - `normalize`: raw table → canonical records with the trading date override
//! - `provider`: fetch outcome types and the traits the fetch unit is built on
//! - `http`: the blocking reqwest-backed HTTP source
//! - `fetch`: download, unzip, parse and classify one date

pub mod calendar;
pub mod fetch;
pub mod http;
pub mod normalize;
pub mod provider;
pub mod record;
pub mod schema;

pub use calendar::{parse_date, weekdays, CalendarError, DateSelection, EXCHANGE_START_DATE};
pub use fetch::BhavFetcher;
pub use http::ReqwestSource;
pub use normalize::{normalize, NormalizeError, RawTable};
pub use provider::{
    DateFetcher, FailureReason, FetchError, FetchOutcome, HttpResponse, HttpSource, SoftFailure,
    TransportError,
};
pub use record::{CanonicalRecord, NaturalKey, CANONICAL_HEADER};
pub use schema::{ResolvedSchema, SchemaResolver, SchemaVariant, SourceConfig};
