//! Fetcher Core Library
//!
//! This library retrieves batches of resources behind a hard concurrency
//! ceiling and computes content-integrity digests, over web (`http`/`https`),
//! file-transfer (`ftp`) and local (`file`) locators.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`locator`] - Resource locators and scheme classification
//! - [`source`] - Byte-stream transports behind the [`StreamSource`] trait
//! - [`fetch`] - Sequential and throttled batch fetchers
//! - [`digest`] - Streaming integrity hashing
//! - [`error`] - The shared [`FetchError`] type

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod digest;
pub mod error;
pub mod fetch;
pub mod locator;
pub mod source;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use digest::{IntegrityHasher, to_upper_hex};
pub use error::FetchError;
pub use fetch::{
    CancelHandle, DEFAULT_CONCURRENCY, FetchReport, FetchResult, SequentialFetcher,
    ThrottledFetcher,
};
pub use locator::{Locator, Scheme};
pub use source::{
    ByteStream, FileSource, FtpSource, HttpSource, SchemeSource, StreamSource, TransportSettings,
    read_text,
};
