//! Content-integrity digests over any stream source.
//!
//! [`IntegrityHasher`] streams a resource through a [`sha2::Digest`]
//! implementation and renders the result as uppercase hex. The algorithm is
//! a type parameter; SHA-256 is the default.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use fetcher_core::{IntegrityHasher, Locator, SchemeSource, TransportSettings};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = Arc::new(SchemeSource::new(TransportSettings::default())?);
//! let hasher = IntegrityHasher::new(source);
//! let digest = hasher.digest(&Locator::parse("file:///etc/hostname")?).await?;
//! println!("{digest}");
//! # Ok(())
//! # }
//! ```

use std::marker::PhantomData;
use std::sync::Arc;

use futures_util::StreamExt;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use crate::error::FetchError;
use crate::locator::Locator;
use crate::source::StreamSource;

/// Streams resources through digest algorithm `D`.
pub struct IntegrityHasher<D = Sha256> {
    source: Arc<dyn StreamSource>,
    algorithm: PhantomData<fn() -> D>,
}

impl IntegrityHasher {
    /// Creates a SHA-256 hasher over `source`.
    #[must_use]
    pub fn new(source: Arc<dyn StreamSource>) -> Self {
        Self::with_algorithm(source)
    }
}

impl<D> IntegrityHasher<D>
where
    D: Digest + Send,
{
    /// Creates a hasher using algorithm `D`, e.g. `IntegrityHasher::<Sha512>::with_algorithm`.
    #[must_use]
    pub fn with_algorithm(source: Arc<dyn StreamSource>) -> Self {
        Self {
            source,
            algorithm: PhantomData,
        }
    }

    /// Output length of the algorithm in bytes.
    #[must_use]
    pub fn output_len() -> usize {
        <D as Digest>::output_size()
    }

    /// Consumes the whole resource and returns its digest as uppercase hex.
    ///
    /// The stream is released on every exit path, including a failure mid-stream.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::UnreachableResource`] if the resource cannot be
    /// opened, or [`FetchError::StreamReadFailure`] if its stream ends abnormally.
    #[instrument(skip(self), fields(locator = %locator))]
    pub async fn digest(&self, locator: &Locator) -> Result<String, FetchError> {
        let mut stream = self.source.open(locator).await?;
        let mut hasher = D::new();
        let mut bytes: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            bytes += chunk.len() as u64;
            hasher.update(&chunk);
        }

        let digest = to_upper_hex(&hasher.finalize());
        debug!(bytes, %digest, "digest computed");
        Ok(digest)
    }

    /// Hashes several locators one after another.
    ///
    /// Each locator gets its own outcome; a failure does not stop the rest.
    pub async fn digest_all(
        &self,
        locators: &[Locator],
    ) -> Vec<(Locator, Result<String, FetchError>)> {
        let mut outcomes = Vec::with_capacity(locators.len());
        for locator in locators {
            let outcome = self.digest(locator).await;
            if let Err(e) = &outcome {
                warn!(locator = %locator, error = %e, "digest failed");
            }
            outcomes.push((locator.clone(), outcome));
        }
        outcomes
    }
}

/// Renders bytes as two uppercase hex digits each, in order, without separators.
#[must_use]
pub fn to_upper_hex(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}
