//! Static locator over a fixed, semicolon-delimited host list.
//!
//! The resource is parsed once at construction:
//!
//! ```text
//! "10.0.0.1:9000;10.0.0.2:9000;https://edge.example.com"
//! ```
//!
//! Each `locate()` call hands out the next entry in round-robin order.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::debug;

use crate::{Location, Locator, LocatorError, LocatorResult};

const SCHEME_PREFIXES: [&str; 2] = ["https://", "http://"];

/// Construction parameters for a [`StaticLocator`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticLocatorParameters {
    /// Semicolon-delimited `host[:port]` entries.
    pub resource: String,

    /// Port applied to entries that do not carry one.
    pub default_port: Option<u16>,
}

impl From<&str> for StaticLocatorParameters {
    fn from(resource: &str) -> Self {
        Self {
            resource: resource.to_string(),
            default_port: None,
        }
    }
}

impl From<String> for StaticLocatorParameters {
    fn from(resource: String) -> Self {
        Self {
            resource,
            default_port: None,
        }
    }
}

/// Round-robin locator over a list parsed once at construction.
#[derive(Debug)]
pub struct StaticLocator {
    locations: Vec<Location>,
    next: AtomicUsize,
}

impl StaticLocator {
    /// Parses the resource and builds the locator.
    ///
    /// # Errors
    ///
    /// - `LocatorError::InvalidResource` if the resource is empty, an entry
    ///   has more than one `:` after its scheme, or a port is not numeric
    pub fn new(parameters: impl Into<StaticLocatorParameters>) -> LocatorResult<Self> {
        let parameters = parameters.into();
        if parameters.resource.trim().is_empty() {
            return Err(LocatorError::InvalidResource("must have resource".to_string()));
        }

        let locations = parameters
            .resource
            .split(';')
            .map(|entry| parse_entry(entry.trim(), parameters.default_port))
            .collect::<LocatorResult<Vec<_>>>()?;

        debug!(count = locations.len(), "Static locator parsed resource");

        Ok(Self {
            locations,
            next: AtomicUsize::new(0),
        })
    }

    /// Returns the parsed locations in resource order.
    pub fn locations(&self) -> &[Location] {
        &self.locations
    }
}

fn parse_entry(entry: &str, default_port: Option<u16>) -> LocatorResult<Location> {
    let (scheme, rest) = SCHEME_PREFIXES
        .iter()
        .find_map(|prefix| entry.strip_prefix(prefix).map(|rest| (*prefix, rest)))
        .unwrap_or(("", entry));

    let mut parts = rest.split(':');
    let host = parts.next().unwrap_or_default();
    let port = parts.next();
    if parts.next().is_some() {
        return Err(LocatorError::InvalidResource(format!(
            "invalid resource part '{rest}'"
        )));
    }
    if host.is_empty() {
        return Err(LocatorError::InvalidResource(format!(
            "missing host in resource part '{entry}'"
        )));
    }

    let port = match port {
        Some(raw) => {
            if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
                return Err(LocatorError::InvalidResource(format!(
                    "invalid port in resource '{raw}'"
                )));
            }
            let port = raw.parse::<u16>().map_err(|_| {
                LocatorError::InvalidResource(format!("invalid port in resource '{raw}'"))
            })?;
            Some(port)
        }
        None => default_port,
    };

    Ok(Location::from_parts(format!("{scheme}{host}"), port))
}

#[async_trait]
impl Locator for StaticLocator {
    async fn locate(&self) -> LocatorResult<Location> {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.locations.len().max(1);
        self.locations
            .get(index)
            .cloned()
            .ok_or_else(|| LocatorError::InvalidResource("must have resource".to_string()))
    }
}
