//! Fetch outcome types and the traits the fetch unit is built on.
//!
//! `HttpSource` abstracts the network so the fetch unit can be driven by a mock
//! in tests. `DateFetcher` abstracts the fetch unit itself so the batch
//! orchestrator can be driven by a scripted fetcher.

use crate::record::CanonicalRecord;
use crate::schema::SchemaVariant;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why a date produced no data. These are expected conditions, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    NotFound,
    RateLimited,
    Malformed,
    Timeout,
    Other,
}

impl FailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::RateLimited => "rate_limited",
            Self::Malformed => "malformed",
            Self::Timeout => "timeout",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftFailure {
    pub reason: FailureReason,
    pub detail: String,
}

impl SoftFailure {
    pub fn new(reason: FailureReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for SoftFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.reason, self.detail)
    }
}

/// Result of one date's retrieval attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Data {
        records: Vec<CanonicalRecord>,
        variant: SchemaVariant,
    },
    SoftFailure(SoftFailure),
}

impl FetchOutcome {
    pub fn soft(reason: FailureReason, detail: impl Into<String>) -> Self {
        Self::SoftFailure(SoftFailure::new(reason, detail))
    }

    pub fn is_data(&self) -> bool {
        matches!(self, Self::Data { .. })
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            Self::Data { .. } => None,
            Self::SoftFailure(f) => Some(f.reason),
        }
    }
}

/// Hard fetch failures. These stop a batch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid endpoint URL '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
}

/// Status and body of a completed GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// A GET that did not complete.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("transport error: {0}")]
    Other(String),
}

/// Blocking GET with the session's headers already applied.
pub trait HttpSource: Send + Sync {
    fn get(&self, url: &str) -> Result<HttpResponse, TransportError>;
}

/// Retrieves and normalizes one date.
///
/// Expected failure classes come back as `FetchOutcome::SoftFailure`; only
/// configuration or programming errors are returned as `Err`.
pub trait DateFetcher {
    fn fetch(&self, date: NaiveDate) -> Result<FetchOutcome, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_render_as_snake_case() {
        assert_eq!(FailureReason::NotFound.to_string(), "not_found");
        assert_eq!(FailureReason::RateLimited.to_string(), "rate_limited");
        assert_eq!(FailureReason::Timeout.as_str(), "timeout");
    }

    #[test]
    fn outcome_helpers() {
        let soft = FetchOutcome::soft(FailureReason::NotFound, "holiday");
        assert!(!soft.is_data());
        assert_eq!(soft.failure_reason(), Some(FailureReason::NotFound));

        let data = FetchOutcome::Data {
            records: Vec::new(),
            variant: SchemaVariant::Legacy,
        };
        assert!(data.is_data());
        assert_eq!(data.failure_reason(), None);
    }

    #[test]
    fn soft_failure_display_includes_reason_and_detail() {
        let f = SoftFailure::new(FailureReason::Other, "HTTP 503");
        assert_eq!(f.to_string(), "other: HTTP 503");
    }
}
