//! Blocking reqwest-backed HTTP source.

use crate::provider::{FetchError, HttpResponse, HttpSource, TransportError};
use crate::schema::SourceConfig;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER};
use std::time::Duration;

/// One HTTP session for a whole batch: browser-like headers, bounded timeout.
pub struct ReqwestSource {
    client: reqwest::blocking::Client,
}

impl ReqwestSource {
    pub fn new(config: &SourceConfig) -> Result<Self, FetchError> {
        let header = |value: &str, name: &str| {
            HeaderValue::from_str(value)
                .map_err(|e| FetchError::ClientBuild(format!("invalid {name} header: {e}")))
        };

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/zip,*/*"));
        headers.insert(ACCEPT_LANGUAGE, header(&config.accept_language, "accept-language")?);
        headers.insert(REFERER, header(&config.referer, "referer")?);

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(|e| FetchError::ClientBuild(e.to_string()))?;

        Ok(Self { client })
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

impl HttpSource for ReqwestSource {
    fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let resp = self.client.get(url).send().map_err(classify)?;
        let status = resp.status().as_u16();
        let body = resp.bytes().map_err(classify)?.to_vec();
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_default_config() {
        assert!(ReqwestSource::new(&SourceConfig::default()).is_ok());
    }

    #[test]
    fn rejects_header_values_with_control_characters() {
        let config = SourceConfig {
            referer: "https://example.test/\n".to_string(),
            ..SourceConfig::default()
        };
        let err = ReqwestSource::new(&config).err().unwrap();
        assert!(err.to_string().contains("referer"));
    }
}
