//! Byte-stream sources for web, FTP and local resources.
//!
//! Every transport is reached through the [`StreamSource`] trait, which turns
//! a [`Locator`] into a [`ByteStream`]. Fetchers and the hasher never talk to a
//! transport directly, so tests can substitute a fake source with controllable
//! latency and failures.
//!
//! # Scheme dispatch
//!
//! [`SchemeSource`] picks a transport from the locator's [`Scheme`]:
//! - [`Scheme::FileTransfer`] - passive-mode FTP download ([`FtpSource`])
//! - [`Scheme::LocalFile`] - local file read ([`FileSource`])
//! - [`Scheme::Web`] and [`Scheme::Other`] - streaming HTTP GET ([`HttpSource`])
//!
//! # Example
//!
//! ```no_run
//! use fetcher_core::source::{SchemeSource, TransportSettings, read_text};
//! use fetcher_core::Locator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = SchemeSource::new(TransportSettings::default())?;
//! let locator = Locator::parse("https://example.com/")?;
//! let text = read_text(&source, &locator).await?;
//! println!("{} bytes", text.len());
//! # Ok(())
//! # }
//! ```

mod constants;
mod file;
mod ftp;
mod http;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, instrument};

use crate::error::FetchError;
use crate::locator::{Locator, Scheme};

pub use constants::{CHUNK_SIZE, CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
pub use file::FileSource;
pub use ftp::FtpSource;
pub use http::HttpSource;

/// A fully owned stream of content chunks.
///
/// Dropping the stream releases the underlying socket or file handle,
/// whether or not it was consumed to the end.
pub type ByteStream = BoxStream<'static, Result<Bytes, FetchError>>;

/// Produces a readable byte stream for a locator.
#[async_trait]
pub trait StreamSource: Send + Sync {
    /// Opens a stream over the resource's content.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::UnreachableResource`] if the transport cannot be
    /// established or the resource does not exist.
    async fn open(&self, locator: &Locator) -> Result<ByteStream, FetchError>;
}

#[async_trait]
impl<T: StreamSource + ?Sized> StreamSource for Arc<T> {
    async fn open(&self, locator: &Locator) -> Result<ByteStream, FetchError> {
        (**self).open(locator).await
    }
}

/// Timeouts applied to network transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportSettings {
    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Read timeout in seconds: the whole request for HTTP, each data-channel
    /// read and the completion reply for FTP.
    pub read_timeout_secs: u64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
        }
    }
}

/// Dispatches each locator to the transport its scheme calls for.
#[derive(Debug, Clone)]
pub struct SchemeSource {
    http: HttpSource,
    ftp: FtpSource,
    file: FileSource,
}

impl SchemeSource {
    /// Creates a dispatcher with fresh transports using the given timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidConfiguration`] if the HTTP client cannot be built.
    pub fn new(settings: TransportSettings) -> Result<Self, FetchError> {
        Ok(Self::with_http(HttpSource::new(settings)?, settings))
    }

    /// Creates a dispatcher around an existing HTTP source.
    #[must_use]
    pub fn with_http(http: HttpSource, settings: TransportSettings) -> Self {
        Self {
            http,
            ftp: FtpSource::new(settings),
            file: FileSource::new(),
        }
    }
}

#[async_trait]
impl StreamSource for SchemeSource {
    async fn open(&self, locator: &Locator) -> Result<ByteStream, FetchError> {
        debug!(locator = %locator, scheme = ?locator.scheme(), "dispatching by scheme");
        match locator.scheme() {
            Scheme::FileTransfer => self.ftp.open(locator).await,
            Scheme::LocalFile => self.file.open(locator).await,
            Scheme::Web | Scheme::Other(_) => self.http.open(locator).await,
        }
    }
}

/// Retrieves a resource's full content as text.
///
/// Invalid UTF-8 sequences are replaced with U+FFFD rather than failing the
/// retrieval.
///
/// # Errors
///
/// Propagates [`FetchError::UnreachableResource`] from opening the stream and
/// [`FetchError::StreamReadFailure`] from reading it.
#[instrument(level = "debug", skip(source), fields(locator = %locator))]
pub async fn read_text<S>(source: &S, locator: &Locator) -> Result<String, FetchError>
where
    S: StreamSource + ?Sized,
{
    let mut stream = source.open(locator).await?;
    let mut buffer = Vec::new();
    while let Some(chunk) = stream.next().await {
        buffer.extend_from_slice(&chunk?);
    }
    debug!(bytes = buffer.len(), "content retrieved");

    Ok(String::from_utf8(buffer)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned()))
}

/// Adapts an async reader into a [`ByteStream`] of [`CHUNK_SIZE`] reads.
///
/// The reader is dropped as soon as it reports end-of-file or an error.
pub(crate) fn reader_stream<R>(reader: R, locator: String) -> ByteStream
where
    R: AsyncRead + Unpin + Send + 'static,
{
    stream::unfold(Some(reader), move |state| {
        let locator = locator.clone();
        async move {
            let Some(mut reader) = state else {
                return None;
            };
            let mut buffer = BytesMut::with_capacity(CHUNK_SIZE);
            match reader.read_buf(&mut buffer).await {
                Ok(0) => None,
                Ok(_) => Some((Ok(buffer.freeze()), Some(reader))),
                Err(e) => Some((Err(FetchError::stream_read(locator, e)), None)),
            }
        }
    })
    .boxed()
}
