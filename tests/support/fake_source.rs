//! Scripted in-memory stream source with latency and failure injection.
//!
//! Every open is logged as `start <name>` and the matching stream drop as
//! `end <name>`, so tests can assert on the interleaving of retrievals. The
//! number of streams alive at once is tracked the same way.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use fetcher_core::{ByteStream, FetchError, Locator, StreamSource};
use futures_util::StreamExt;
use futures_util::stream;

/// Builds the locator a fake resource named `name` is registered under.
#[must_use]
pub fn fake_locator(name: &str) -> Locator {
    Locator::parse(&format!("https://fake.test/{name}")).expect("valid fake locator")
}

#[derive(Debug, Clone)]
enum Behavior {
    Content(Vec<u8>),
    Unreachable,
    BreaksMidStream(Vec<u8>),
    Panics,
}

#[derive(Debug, Clone)]
struct FakeResource {
    delay: Duration,
    behavior: Behavior,
}

#[derive(Debug, Default)]
struct Counters {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    opens: AtomicUsize,
    events: Mutex<Vec<String>>,
}

impl Counters {
    fn log(&self, event: String) {
        self.events.lock().expect("event log lock").push(event);
    }
}

/// Decrements the in-flight count once the stream (or failed open) is gone.
struct InFlightGuard {
    name: String,
    counters: Arc<Counters>,
}

impl InFlightGuard {
    fn enter(name: &str, counters: &Arc<Counters>) -> Self {
        counters.opens.fetch_add(1, Ordering::SeqCst);
        let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.peak.fetch_max(now, Ordering::SeqCst);
        counters.log(format!("start {name}"));
        Self {
            name: name.to_string(),
            counters: Arc::clone(counters),
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
        if let Ok(mut events) = self.counters.events.lock() {
            events.push(format!("end {}", self.name));
        }
    }
}

/// In-memory [`StreamSource`] keyed by resource name.
#[derive(Debug, Default)]
pub struct FakeSource {
    resources: HashMap<String, FakeResource>,
    counters: Arc<Counters>,
}

#[allow(dead_code)]
impl FakeSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resource that yields `body` after `delay`.
    #[must_use]
    pub fn with_content(self, name: &str, delay: Duration, body: impl Into<Vec<u8>>) -> Self {
        self.with(name, delay, Behavior::Content(body.into()))
    }

    /// Registers a resource that fails to open after `delay`.
    #[must_use]
    pub fn with_unreachable(self, name: &str, delay: Duration) -> Self {
        self.with(name, delay, Behavior::Unreachable)
    }

    /// Registers a resource whose stream yields `prefix` and then breaks.
    #[must_use]
    pub fn with_broken_stream(self, name: &str, delay: Duration, prefix: impl Into<Vec<u8>>) -> Self {
        self.with(name, delay, Behavior::BreaksMidStream(prefix.into()))
    }

    /// Registers a resource whose open panics after `delay`.
    #[must_use]
    pub fn with_panic(self, name: &str, delay: Duration) -> Self {
        self.with(name, delay, Behavior::Panics)
    }

    fn with(mut self, name: &str, delay: Duration, behavior: Behavior) -> Self {
        self.resources
            .insert(name.to_string(), FakeResource { delay, behavior });
        self
    }

    /// Most streams that were alive at the same time.
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }

    /// Streams alive right now.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.counters.in_flight.load(Ordering::SeqCst)
    }

    /// Total number of opens attempted against registered resources.
    #[must_use]
    pub fn opens(&self) -> usize {
        self.counters.opens.load(Ordering::SeqCst)
    }

    /// Snapshot of the `start`/`end` event log.
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        self.counters.events.lock().expect("event log lock").clone()
    }
}

fn resource_name(locator: &Locator) -> String {
    locator.url().path().trim_start_matches('/').to_string()
}

#[async_trait]
impl StreamSource for FakeSource {
    async fn open(&self, locator: &Locator) -> Result<ByteStream, FetchError> {
        let name = resource_name(locator);
        let Some(resource) = self.resources.get(&name).cloned() else {
            return Err(FetchError::unreachable(locator.as_str(), "no such fake resource"));
        };

        let guard = InFlightGuard::enter(&name, &self.counters);
        tokio::time::sleep(resource.delay).await;

        let items: Vec<Result<Bytes, FetchError>> = match resource.behavior {
            Behavior::Unreachable => {
                drop(guard);
                return Err(FetchError::unreachable(locator.as_str(), "HTTP 404"));
            }
            Behavior::Panics => panic!("fake resource {name} panicked"),
            Behavior::Content(body) => body
                .chunks(4)
                .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
                .collect(),
            Behavior::BreaksMidStream(prefix) => vec![
                Ok(Bytes::from(prefix)),
                Err(FetchError::stream_read(locator.as_str(), "connection reset")),
            ],
        };

        Ok(stream::iter(items)
            .map(move |item| {
                let _alive = &guard;
                item
            })
            .boxed())
    }
}
