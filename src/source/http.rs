//! HTTP transport for web and web-like locators.
//!
//! This module provides [`HttpSource`], which wraps one reusable
//! `reqwest::Client` so every retrieval shares its connection pool.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tracing::{debug, instrument};

use super::{ByteStream, StreamSource, TransportSettings};
use crate::error::FetchError;
use crate::locator::Locator;
use crate::user_agent;

/// Streaming HTTP GET source.
///
/// Clones share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    /// Creates a source with a client configured from `settings`.
    ///
    /// Configuration:
    /// - Connect timeout: `settings.connect_timeout_secs`
    /// - Request timeout: `settings.read_timeout_secs`
    /// - Gzip decompression: enabled
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidConfiguration`] if the client fails to build.
    pub fn new(settings: TransportSettings) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .timeout(Duration::from_secs(settings.read_timeout_secs))
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()
            .map_err(|e| {
                FetchError::invalid_configuration(format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl StreamSource for HttpSource {
    #[instrument(skip(self), fields(locator = %locator))]
    async fn open(&self, locator: &Locator) -> Result<ByteStream, FetchError> {
        let response = self
            .client
            .get(locator.url().clone())
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_timeout() {
                    "request timed out".to_string()
                } else {
                    e.to_string()
                };
                FetchError::unreachable(locator.as_str(), reason)
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::unreachable(
                locator.as_str(),
                format!("HTTP {}", status.as_u16()),
            ));
        }

        debug!(
            status = status.as_u16(),
            content_length = response.content_length(),
            "response stream opened"
        );

        let url = locator.to_string();
        Ok(response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| FetchError::stream_read(url.as_str(), e)))
            .boxed())
    }
}
