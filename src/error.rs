//! Error types shared by the stream sources, fetchers and the hasher.
//!
//! Protocol-specific failures collapse into [`FetchError::UnreachableResource`]
//! (could not open) and [`FetchError::StreamReadFailure`] (broke mid-stream).

use thiserror::Error;

/// Errors that can occur while retrieving or hashing a resource.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The transport could not be established or the resource does not exist
    /// (DNS, connection refused, non-success status, FTP negative reply,
    /// missing local file).
    #[error("unreachable resource {locator}: {reason}")]
    UnreachableResource {
        /// The locator that could not be opened.
        locator: String,
        /// Human-readable cause reported by the transport.
        reason: String,
    },

    /// The stream terminated abnormally before being fully consumed.
    #[error("stream read failure for {locator}: {reason}")]
    StreamReadFailure {
        /// The locator whose stream failed.
        locator: String,
        /// Human-readable cause reported by the transport.
        reason: String,
    },

    /// The fetcher was configured with an unusable value.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// What was wrong with the configuration.
        reason: String,
    },

    /// The input string is not a valid resource locator.
    #[error("invalid locator: {input}")]
    InvalidLocator {
        /// The rejected input.
        input: String,
    },

    /// The retrieval task ended without producing a result (panicked or was aborted).
    #[error("retrieval aborted for {locator}")]
    RetrievalAborted {
        /// The locator whose task was lost.
        locator: String,
    },
}

impl FetchError {
    /// Creates an unreachable-resource error.
    pub fn unreachable(locator: impl Into<String>, reason: impl ToString) -> Self {
        Self::UnreachableResource {
            locator: locator.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a stream-read error.
    pub fn stream_read(locator: impl Into<String>, reason: impl ToString) -> Self {
        Self::StreamReadFailure {
            locator: locator.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates an invalid-configuration error.
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    /// Creates an invalid-locator error.
    pub fn invalid_locator(input: impl Into<String>) -> Self {
        Self::InvalidLocator {
            input: input.into(),
        }
    }

    /// Creates a retrieval-aborted error.
    pub fn aborted(locator: impl Into<String>) -> Self {
        Self::RetrievalAborted {
            locator: locator.into(),
        }
    }

    /// Returns a stable short label for the error kind, used in CLI and JSON output.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnreachableResource { .. } => "unreachable_resource",
            Self::StreamReadFailure { .. } => "stream_read_failure",
            Self::InvalidConfiguration { .. } => "invalid_configuration",
            Self::InvalidLocator { .. } => "invalid_locator",
            Self::RetrievalAborted { .. } => "retrieval_aborted",
        }
    }
}

// No `From` conversions: every variant carries its locator.

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_display_includes_locator_and_reason() {
        let error = FetchError::unreachable("https://example.com/a", "HTTP 404");
        let msg = error.to_string();
        assert!(msg.contains("https://example.com/a"), "Expected locator in: {msg}");
        assert!(msg.contains("HTTP 404"), "Expected reason in: {msg}");
        assert_eq!(error.kind(), "unreachable_resource");
    }

    #[test]
    fn test_stream_read_display() {
        let error = FetchError::stream_read("ftp://host/file", "connection reset");
        let msg = error.to_string();
        assert!(msg.starts_with("stream read failure"), "got: {msg}");
        assert!(msg.contains("connection reset"));
        assert_eq!(error.kind(), "stream_read_failure");
    }

    #[test]
    fn test_invalid_configuration_display() {
        let error = FetchError::invalid_configuration("max_concurrent must be at least 1, got 0");
        assert!(error.to_string().contains("got 0"));
        assert_eq!(error.kind(), "invalid_configuration");
    }

    #[test]
    fn test_invalid_locator_and_aborted_kinds() {
        assert_eq!(FetchError::invalid_locator("nope").kind(), "invalid_locator");
        assert_eq!(
            FetchError::aborted("https://example.com").kind(),
            "retrieval_aborted"
        );
    }
}
