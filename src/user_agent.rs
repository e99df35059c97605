//! User-Agent string for HTTP retrievals.

/// Project URL included in the User-Agent.
const PROJECT_UA_URL: &str = "https://github.com/fierce/fetcher";

/// Default User-Agent for web retrievals (identifies the tool).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("fetcher/{version} (+{PROJECT_UA_URL})")
}
