//! Resource locators and scheme classification.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use url::Url;

use crate::error::FetchError;

/// Transport family selected by a locator's scheme.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// `http` or `https`.
    Web,
    /// `ftp`.
    FileTransfer,
    /// `file`.
    LocalFile,
    /// Any other scheme; retrieved the same way as [`Scheme::Web`].
    Other(String),
}

impl Scheme {
    /// Classifies a URL scheme string (case-insensitive).
    #[must_use]
    pub fn from_scheme(scheme: &str) -> Self {
        match scheme.to_ascii_lowercase().as_str() {
            "http" | "https" => Self::Web,
            "ftp" => Self::FileTransfer,
            "file" => Self::LocalFile,
            other => Self::Other(other.to_string()),
        }
    }
}

/// An immutable identifier of a resource (scheme + address).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    url: Url,
    scheme: Scheme,
}

impl Locator {
    /// Parses a locator from an absolute URL string.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidLocator`] when the input is not an absolute URL.
    pub fn parse(input: &str) -> Result<Self, FetchError> {
        let trimmed = input.trim();
        let url = Url::parse(trimmed).map_err(|_| FetchError::invalid_locator(trimmed))?;
        Ok(Self::from(url))
    }

    /// Builds a `file://` locator from an absolute filesystem path.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidLocator`] for relative paths.
    pub fn from_path(path: &Path) -> Result<Self, FetchError> {
        let url = Url::from_file_path(path)
            .map_err(|()| FetchError::invalid_locator(path.display().to_string()))?;
        Ok(Self::from(url))
    }

    /// Returns the transport family of this locator.
    #[must_use]
    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    /// Returns the parsed URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the locator as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

impl From<Url> for Locator {
    fn from(url: Url) -> Self {
        let scheme = Scheme::from_scheme(url.scheme());
        Self { url, scheme }
    }
}

impl FromStr for Locator {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

impl Serialize for Locator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
