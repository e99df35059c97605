//! Batch retrieval of text content.
//!
//! Two fetchers share the same contract: submit an ordered slice of
//! [`Locator`](crate::Locator)s, get back a [`FetchReport`] with one tagged
//! [`FetchResult`] per position.
//!
//! - [`SequentialFetcher`] - one retrieval at a time, in order (baseline)
//! - [`ThrottledFetcher`] - up to `K` concurrent retrievals, slots reused as they free up

mod cancel;
mod result;
mod sequential;
mod throttled;

pub use cancel::CancelHandle;
pub use result::{FetchReport, FetchResult};
pub use sequential::SequentialFetcher;
pub use throttled::{DEFAULT_CONCURRENCY, ThrottledFetcher};
