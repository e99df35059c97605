//! One-at-a-time baseline fetcher.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use super::{CancelHandle, FetchReport, FetchResult};
use crate::locator::Locator;
use crate::source::{StreamSource, read_text};

/// Retrieves locators strictly in order, one at a time.
///
/// Retrieval `i` starts only after retrieval `i - 1` has fully completed. A
/// failing locator is recorded and the batch moves on to the next one.
pub struct SequentialFetcher {
    source: Arc<dyn StreamSource>,
    cancel: CancelHandle,
}

impl SequentialFetcher {
    /// Creates a fetcher over a shared stream source.
    #[must_use]
    pub fn new(source: Arc<dyn StreamSource>) -> Self {
        Self {
            source,
            cancel: CancelHandle::new(),
        }
    }

    /// Uses `cancel` to stop the batch between retrievals.
    #[must_use]
    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    /// Retrieves every locator in input order.
    ///
    /// Individual failures never abort the batch; they appear as failed
    /// results at their position.
    #[instrument(skip(self, locators), fields(count = locators.len()))]
    pub async fn fetch_all(&self, locators: &[Locator]) -> FetchReport {
        let started = Instant::now();
        let mut results = Vec::with_capacity(locators.len());
        let mut not_started = Vec::new();
        let mut cancelled = false;

        info!("starting sequential fetch");

        for (index, locator) in locators.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!(remaining = locators.len() - index, "cancellation requested; stopping");
                cancelled = true;
                not_started.extend(index..locators.len());
                break;
            }

            debug!(index, locator = %locator, "retrieving");
            let outcome = read_text(self.source.as_ref(), locator).await;
            if let Err(e) = &outcome {
                warn!(index, locator = %locator, error = %e, "retrieval failed");
            }
            results.push(FetchResult {
                index,
                locator: locator.clone(),
                outcome,
            });
        }

        let peak_in_flight = usize::from(!results.is_empty());
        let report = FetchReport::new(
            results,
            not_started,
            cancelled,
            peak_in_flight,
            started.elapsed(),
        );
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            cancelled,
            elapsed_ms = report.elapsed().as_millis(),
            "sequential fetch complete"
        );
        report
    }
}
