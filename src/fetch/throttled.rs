//! Bounded-concurrency fetcher.
//!
//! [`ThrottledFetcher`] keeps at most `K = min(max_concurrent, n)` retrievals
//! in flight. Each retrieval runs in its own Tokio task inside a [`JoinSet`];
//! the coordinating task waits for whichever one finishes first, records its
//! result, and hands the freed slot the next pending locator.
//!
//! # Concurrency Model
//!
//! - The first `K` locators start immediately
//! - `JoinSet::join_next_with_id` is the only suspension point of the scheduler
//! - The pending cursor and the result slots are owned by the coordinating task
//! - A failed or panicked retrieval still frees its slot and yields a result
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use fetcher_core::{Locator, SchemeSource, ThrottledFetcher, TransportSettings};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = Arc::new(SchemeSource::new(TransportSettings::default())?);
//! let fetcher = ThrottledFetcher::new(source, 4)?;
//! let locators = vec![
//!     Locator::parse("https://example.com/a")?,
//!     Locator::parse("https://example.com/b")?,
//! ];
//! let report = fetcher.fetch_all(&locators).await;
//! println!("{} succeeded, {} failed", report.succeeded(), report.failed());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::task::{self, JoinSet};
use tracing::{debug, info, instrument, warn};

use super::{CancelHandle, FetchReport, FetchResult};
use crate::error::FetchError;
use crate::locator::Locator;
use crate::source::{StreamSource, read_text};

/// Minimum allowed concurrency ceiling.
const MIN_CONCURRENCY: usize = 1;

/// Default concurrency ceiling if not specified.
pub const DEFAULT_CONCURRENCY: usize = 10;

type SlotOutput = (usize, Result<String, FetchError>);

/// Fetcher that caps simultaneous retrievals at a configured ceiling.
pub struct ThrottledFetcher {
    source: Arc<dyn StreamSource>,
    max_concurrent: usize,
    cancel: CancelHandle,
}

impl ThrottledFetcher {
    /// Creates a fetcher with the given concurrency ceiling.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidConfiguration`] if `max_concurrent` is zero.
    /// No retrieval is attempted in that case.
    #[instrument(level = "debug", skip(source))]
    pub fn new(source: Arc<dyn StreamSource>, max_concurrent: usize) -> Result<Self, FetchError> {
        if max_concurrent < MIN_CONCURRENCY {
            return Err(FetchError::invalid_configuration(format!(
                "max_concurrent must be at least {MIN_CONCURRENCY}, got {max_concurrent}"
            )));
        }

        debug!(max_concurrent, "creating throttled fetcher");
        Ok(Self {
            source,
            max_concurrent,
            cancel: CancelHandle::new(),
        })
    }

    /// Uses `cancel` to stop assigning pending locators to freed slots.
    #[must_use]
    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the configured concurrency ceiling.
    #[must_use]
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Retrieves every locator with at most `max_concurrent` in flight.
    ///
    /// Results are returned in input order regardless of completion order.
    /// Individual failures are reported per position and never stop sibling
    /// retrievals. If the cancel handle is raised, running retrievals drain
    /// and the report lists the positions that were never started.
    #[instrument(skip(self, locators), fields(count = locators.len(), max_concurrent = self.max_concurrent))]
    pub async fn fetch_all(&self, locators: &[Locator]) -> FetchReport {
        let started = Instant::now();
        if locators.is_empty() {
            debug!("no locators; nothing to schedule");
            return FetchReport::default();
        }

        let total = locators.len();
        let slots = self.max_concurrent.min(total);
        let mut in_flight: JoinSet<SlotOutput> = JoinSet::new();
        // Maps a running task back to its input position so panics stay attributable.
        let mut positions: HashMap<task::Id, usize> = HashMap::with_capacity(slots);
        let mut results: Vec<FetchResult> = Vec::with_capacity(total);
        let mut next = 0usize;
        let mut peak_in_flight = 0usize;
        let mut cancelled = false;

        info!(slots, "starting throttled fetch");

        while next < slots {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            self.start_slot(&mut in_flight, &mut positions, locators, next);
            next += 1;
        }
        peak_in_flight = peak_in_flight.max(in_flight.len());

        while let Some(joined) = in_flight.join_next_with_id().await {
            let (index, outcome) = match joined {
                Ok((id, (index, outcome))) => {
                    positions.remove(&id);
                    (index, outcome)
                }
                Err(join_error) => {
                    let Some(index) = positions.remove(&join_error.id()) else {
                        warn!(error = %join_error, "unattributed retrieval task failure");
                        continue;
                    };
                    warn!(index, error = %join_error, "retrieval task panicked");
                    (index, Err(FetchError::aborted(locators[index].as_str())))
                }
            };

            match &outcome {
                Ok(content) => debug!(index, bytes = content.len(), "slot completed"),
                Err(e) => warn!(index, locator = %locators[index], error = %e, "retrieval failed"),
            }
            results.push(FetchResult {
                index,
                locator: locators[index].clone(),
                outcome,
            });

            if next < total && !cancelled {
                if self.cancel.is_cancelled() {
                    info!(
                        in_flight = in_flight.len(),
                        "cancellation requested; draining in-flight retrievals"
                    );
                    cancelled = true;
                } else {
                    self.start_slot(&mut in_flight, &mut positions, locators, next);
                    next += 1;
                    peak_in_flight = peak_in_flight.max(in_flight.len());
                }
            }
        }

        let not_started = if cancelled {
            (next..total).collect()
        } else {
            Vec::new()
        };
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
            not_started = report.not_started().len(),
            peak_in_flight,
            elapsed_ms = report.elapsed().as_millis(),
            "throttled fetch complete"
        );
        report
    }

    /// Binds a free slot to the locator at `index` and starts its retrieval.
    fn start_slot(
        &self,
        in_flight: &mut JoinSet<SlotOutput>,
        positions: &mut HashMap<task::Id, usize>,
        locators: &[Locator],
        index: usize,
    ) {
        let source = Arc::clone(&self.source);
        let locator = locators[index].clone();
        debug!(index, locator = %locator, "assigning slot");

        let handle = in_flight.spawn(async move {
            let outcome = read_text(source.as_ref(), &locator).await;
            (index, outcome)
        });
        positions.insert(handle.id(), index);
    }
}
