//! The per-date fetch unit: resolve, download, unzip, parse, normalize.
//!
//! Every expected failure class is folded into `FetchOutcome::SoftFailure`:
//! - HTTP 404 → `not_found` (holiday, weekend, or not yet published)
//! - HTTP 429 → `rate_limited`
//! - any other non-200 status → `other`
//! - transport timeout → `timeout`
//! - undecodable archive, unreadable CSV, wrong column set → `malformed`
//!
//! Only an endpoint that does not form a valid URL is a hard error.

use crate::normalize::{normalize, RawTable};
use crate::provider::{
    DateFetcher, FailureReason, FetchError, FetchOutcome, HttpSource, TransportError,
};
use crate::schema::SchemaResolver;
use chrono::NaiveDate;
use std::io::Cursor;
use tracing::{debug, info, warn};
use zip::ZipArchive;

pub struct BhavFetcher<S: HttpSource> {
    source: S,
    resolver: SchemaResolver,
}

impl<S: HttpSource> BhavFetcher<S> {
    pub fn new(source: S, resolver: SchemaResolver) -> Self {
        Self { source, resolver }
    }

    pub fn resolver(&self) -> &SchemaResolver {
        &self.resolver
    }
}

impl<S: HttpSource> DateFetcher for BhavFetcher<S> {
    fn fetch(&self, date: NaiveDate) -> Result<FetchOutcome, FetchError> {
        let schema = self.resolver.resolve(date);
        let url = schema.endpoint(date);
        reqwest::Url::parse(&url).map_err(|e| FetchError::InvalidEndpoint {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        debug!(%date, variant = %schema.variant, %url, "fetching bhav copy");

        let response = match self.source.get(&url) {
            Ok(r) => r,
            Err(TransportError::Timeout(detail)) => {
                warn!(%date, "request timed out");
                return Ok(FetchOutcome::soft(FailureReason::Timeout, detail));
            }
            Err(TransportError::Other(detail)) => {
                warn!(%date, error = %detail, "request failed");
                return Ok(FetchOutcome::soft(FailureReason::Other, detail));
            }
        };

        match response.status {
            200 => {}
            404 => {
                return Ok(FetchOutcome::soft(
                    FailureReason::NotFound,
                    format!("HTTP 404: no bhav copy published for {date} (holiday or not yet published)"),
                ))
            }
            429 => {
                return Ok(FetchOutcome::soft(
                    FailureReason::RateLimited,
                    "HTTP 429: rate limited by exchange archive",
                ))
            }
            status => {
                return Ok(FetchOutcome::soft(
                    FailureReason::Other,
                    format!("HTTP {status}"),
                ))
            }
        }

        let table = match extract_table(&response.body) {
            Ok(t) => t,
            Err(detail) => return Ok(FetchOutcome::soft(FailureReason::Malformed, detail)),
        };

        match normalize(&table, date, schema.variant) {
            Ok(records) => {
                info!(
                    %date,
                    variant = %schema.variant,
                    raw_rows = table.len(),
                    rows = records.len(),
                    "fetched bhav copy"
                );
                Ok(FetchOutcome::Data {
                    records,
                    variant: schema.variant,
                })
            }
            Err(e) => Ok(FetchOutcome::soft(FailureReason::Malformed, e.to_string())),
        }
    }
}

/// Open the archive and parse its first entry as CSV.
fn extract_table(body: &[u8]) -> Result<RawTable, String> {
    let mut archive =
        ZipArchive::new(Cursor::new(body)).map_err(|e| format!("undecodable archive: {e}"))?;
    if archive.len() == 0 {
        return Err("archive contains no entries".to_string());
    }
    let entry = archive
        .by_index(0)
        .map_err(|e| format!("unreadable archive entry: {e}"))?;
    RawTable::from_csv_reader(entry).map_err(|e| format!("unreadable CSV payload: {e}"))
}
