//! Network location value object.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A concrete network location chosen for a logical service.
///
/// Immutable once constructed. The port is optional because some
/// locators (e.g. a static list entry without a port) only know a host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
}

impl Location {
    /// Creates a location with a host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port: Some(port),
        }
    }

    /// Creates a location that only knows its host.
    pub fn host_only(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
        }
    }

    /// Creates a location from a host and an optional port.
    pub fn from_parts(host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Host name or address. May carry an `http://` / `https://` prefix
    /// when produced by the static locator.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port, if known.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Returns the `host[:port]` form used in connect strings.
    #[must_use]
    pub fn authority(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.host, port),
            None => write!(f, "{}", self.host),
        }
    }
}
