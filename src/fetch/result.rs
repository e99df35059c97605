//! Tagged per-locator results and the batch report.

use std::time::Duration;

use crate::error::FetchError;
use crate::locator::Locator;

/// Outcome of retrieving one locator, tagged with its input position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    /// Position of the locator in the submitted sequence.
    pub index: usize,
    /// The locator that was retrieved.
    pub locator: Locator,
    /// Retrieved text content, or the failure.
    pub outcome: Result<String, FetchError>,
}

impl FetchResult {
    /// Returns `true` if the content was retrieved.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Returns the retrieved content, if any.
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        self.outcome.as_deref().ok()
    }

    /// Returns the failure, if any.
    #[must_use]
    pub fn error(&self) -> Option<&FetchError> {
        self.outcome.as_ref().err()
    }
}

/// Everything a batch fetch produced.
///
/// Results are ordered by input position. For a batch that ran to completion
/// there is exactly one result per submitted locator; a cancelled batch lists
/// the positions it never started in [`not_started`](Self::not_started).
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    results: Vec<FetchResult>,
    not_started: Vec<usize>,
    cancelled: bool,
    peak_in_flight: usize,
    elapsed: Duration,
}

impl FetchReport {
    pub(crate) fn new(
        mut results: Vec<FetchResult>,
        not_started: Vec<usize>,
        cancelled: bool,
        peak_in_flight: usize,
        elapsed: Duration,
    ) -> Self {
        results.sort_by_key(|result| result.index);
        Self {
            results,
            not_started,
            cancelled,
            peak_in_flight,
            elapsed,
        }
    }

    /// Results in input order.
    #[must_use]
    pub fn results(&self) -> &[FetchResult] {
        &self.results
    }

    /// Returns the result for an input position, if it was retrieved.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&FetchResult> {
        self.results
            .binary_search_by_key(&index, |result| result.index)
            .ok()
            .map(|position| &self.results[position])
    }

    /// Input positions that were never started because the batch was cancelled.
    #[must_use]
    pub fn not_started(&self) -> &[usize] {
        &self.not_started
    }

    /// Returns `true` if cancellation stopped the batch early.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Highest number of retrievals the fetcher had outstanding at once.
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight
    }

    /// Wall-clock time the batch took.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Number of results.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns `true` if there are no results.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Number of successful retrievals.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    /// Number of failed retrievals.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }
}
