//! Constants for the stream sources (timeouts, buffering).

/// Default connect timeout for network transports (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default read timeout: whole request for HTTP, idle read for FTP.
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Read buffer size for file and FTP data streams.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Default FTP control port.
pub(crate) const FTP_DEFAULT_PORT: u16 = 21;
