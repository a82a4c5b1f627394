//! HTTP transport to the log collector
//!
//! Probes and batches are both plain JSON POSTs to one endpoint. Any success
//! status means delivered; everything else, including a request that never
//! got an answer, is reported as an error the monitor treats as unreachable.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};

use crate::config::DeliveryConfig;
use crate::error::{Error, Result};

use super::events::Payload;

/// Delivers payloads to the collector
///
/// Futures returned by implementations run on the client's single-threaded
/// executor and need not be `Send`.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// POST one payload. `Ok` only for a success status.
    async fn send(&self, payload: &Payload<'_>) -> Result<()>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    endpoint_url: String,
    http_client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport from configuration
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: &DeliveryConfig) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .default_headers(headers)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            endpoint_url: config.endpoint_url.clone(),
            http_client,
        })
    }

    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }
}

impl Transport for HttpTransport {
    async fn send(&self, payload: &Payload<'_>) -> Result<()> {
        let response = self
            .http_client
            .post(&self.endpoint_url)
            .json(payload)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            tracing::debug!(
                event_type = %payload.event_type(),
                status = status.as_u16(),
                "Collector rejected request"
            );
            Err(Error::Status(status.as_u16()))
        }
    }
}

fn classify_request_error(error: reqwest::Error) -> Error {
    if error.is_timeout() {
        Error::Transport(format!("request timed out: {}", error))
    } else {
        Error::Transport(format!("HTTP request failed: {}", error))
    }
}
