//! Skips transport tests on hosts that forbid loopback listeners.
//!
//! The HTTP tests need a wiremock listener and the FTP tests bind a control
//! port plus one passive data port per transfer. Sandboxed CI runners may
//! refuse both; set `FETCHER_REQUIRE_SOCKET_TESTS=1` to turn the skip into a
//! hard failure.

use std::future::Future;
use std::net::TcpListener;
use std::panic::Location;

use wiremock::MockServer;

use super::ftp_server::FakeFtpServer;

const REQUIRE_VAR: &str = "FETCHER_REQUIRE_SOCKET_TESTS";

#[must_use]
pub fn socket_tests_required() -> bool {
    std::env::var(REQUIRE_VAR)
        .ok()
        .is_some_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

/// Returns `true` when no loopback port can be bound, after reporting which
/// test is being skipped.
#[track_caller]
#[must_use]
pub fn should_skip_socket_bound_test() -> bool {
    if TcpListener::bind("127.0.0.1:0").is_ok() {
        return false;
    }

    let location = Location::caller();
    let message = format!(
        "[transport-test] {}:{} needs a loopback listener for the wiremock or fake FTP server, but binding 127.0.0.1 was refused",
        location.file(),
        location.line()
    );
    if socket_tests_required() {
        panic!("{message}; {REQUIRE_VAR} is set, so this is fatal");
    }

    eprintln!("{message}; skipping (set {REQUIRE_VAR}=1 to fail instead)");
    true
}

pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    if should_skip_socket_bound_test() {
        None
    } else {
        Some(MockServer::start().await)
    }
}

/// Awaits `start` only when loopback sockets are available.
pub async fn start_ftp_server_or_skip<F>(start: F) -> Option<FakeFtpServer>
where
    F: Future<Output = FakeFtpServer>,
{
    if should_skip_socket_bound_test() {
        None
    } else {
        Some(start.await)
    }
}
